#![forbid(unsafe_code)]

//! Test harness and reference observers for `weakcast`.
//!
//! # Role
//! Exercises the broadcaster strictly through its public API. Provides the
//! [`Probe`] capability interface, a [`RecordingProbe`] observer that keeps
//! what it was sent, and fixtures for building populated broadcasters.
//! The scenario suites live under `tests/`.

pub mod fixtures;
pub mod probe;

pub use fixtures::{
    ProbeBus, ProbeRef, logged_probes, offered_count, probe_ref, probes, register_all,
};
pub use probe::{CallLog, Probe, ProbeError, RecordingProbe};
