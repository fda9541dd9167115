#![forbid(unsafe_code)]

//! Shared setup for broadcaster scenarios.

use std::sync::{Arc, Weak};

use weakcast::{Broadcaster, LockPolicy, MultiThreaded, Storage};

use crate::probe::{CallLog, Probe, RecordingProbe};

/// Weak reference to a probe, as stored in the registry.
pub type ProbeRef = Weak<dyn Probe>;

/// Broadcaster over probes, defaulting to the mutex policy.
pub type ProbeBus<L = MultiThreaded, S = Vec<ProbeRef>> = Broadcaster<ProbeRef, L, S>;

/// Non-owning reference to `probe`.
#[must_use]
pub fn probe_ref(probe: &Arc<RecordingProbe>) -> ProbeRef {
    Arc::downgrade(probe) as ProbeRef
}

/// `count` probes with ids `0..count`, all logging into `log`.
#[must_use]
pub fn logged_probes(count: usize, log: &Arc<CallLog>) -> Vec<Arc<RecordingProbe>> {
    (0..count)
        .map(|id| RecordingProbe::new(id).with_log(log).shared())
        .collect()
}

/// `count` probes with ids `0..count`.
#[must_use]
pub fn probes(count: usize) -> Vec<Arc<RecordingProbe>> {
    (0..count).map(|id| RecordingProbe::new(id).shared()).collect()
}

/// Register every probe in order.
pub fn register_all<L, S>(bus: &ProbeBus<L, S>, probes: &[Arc<RecordingProbe>])
where
    L: LockPolicy,
    S: Storage<ProbeRef>,
{
    for probe in probes {
        bus.register(probe_ref(probe));
    }
}

/// Number of probes whose last [`Probe::offer`] recorded `true`.
#[must_use]
pub fn offered_count(probes: &[Arc<RecordingProbe>]) -> usize {
    probes.iter().filter(|p| p.offered()).count()
}
