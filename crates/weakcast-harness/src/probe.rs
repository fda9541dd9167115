#![forbid(unsafe_code)]

//! Reference capability interface and a recording observer.
//!
//! [`Probe`] covers each call shape the broadcaster dispatches: no
//! arguments, one argument, several arguments, a boolean result and a
//! fallible result. [`RecordingProbe`] remembers what it received so tests
//! can assert on delivery.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Capability interface implemented by test observers.
pub trait Probe: Send + Sync {
    /// Stable identity, for assertions made through the interface.
    fn id(&self) -> usize;

    /// No-argument notification.
    fn ping(&self);

    /// Single-argument notification.
    fn set_value(&self, value: i32);

    /// Multi-argument notification.
    fn set_pair(&self, first: f64, second: f64);

    /// Boolean notification; records and returns `accept`.
    fn offer(&self, accept: bool) -> bool;

    /// Fallible notification.
    fn validate(&self, value: i32) -> Result<(), ProbeError>;
}

/// Failure raised by a probe from [`Probe::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The value exceeded the probe's configured limit.
    Rejected { probe: usize, value: i32, limit: i32 },
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected {
                probe,
                value,
                limit,
            } => write!(f, "probe {probe} rejected {value} (limit {limit})"),
        }
    }
}

impl std::error::Error for ProbeError {}

/// Ordered record of probe ids, shared between observers.
#[derive(Debug, Default)]
pub struct CallLog {
    entries: Mutex<Vec<usize>>,
}

impl CallLog {
    /// Create an empty, shareable log.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, id: usize) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id);
    }

    /// Ids recorded so far, in call order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<usize> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Observer that records every notification it receives.
#[derive(Debug, Default)]
pub struct RecordingProbe {
    id: usize,
    limit: Option<i32>,
    log: Option<Arc<CallLog>>,
    pings: AtomicU32,
    value: AtomicI32,
    pair: Mutex<(f64, f64)>,
    offered: AtomicBool,
}

impl RecordingProbe {
    /// Create a probe with the given id.
    #[must_use]
    pub fn new(id: usize) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Append this probe's id to `log` on every call.
    #[must_use]
    pub fn with_log(mut self, log: &Arc<CallLog>) -> Self {
        self.log = Some(Arc::clone(log));
        self
    }

    /// Make [`Probe::validate`] reject values above `limit`.
    #[must_use]
    pub fn with_limit(mut self, limit: i32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Wrap in an `Arc`, the owning handle the broadcaster expects.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// True once [`Probe::ping`] has been called.
    #[must_use]
    pub fn pinged(&self) -> bool {
        self.ping_count() > 0
    }

    #[must_use]
    pub fn ping_count(&self) -> u32 {
        self.pings.load(Ordering::SeqCst)
    }

    /// Last value received through [`Probe::set_value`] (0 if none).
    #[must_use]
    pub fn value(&self) -> i32 {
        self.value.load(Ordering::SeqCst)
    }

    /// Last pair received through [`Probe::set_pair`].
    #[must_use]
    pub fn pair(&self) -> (f64, f64) {
        *self.pair.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last value received and returned through [`Probe::offer`].
    #[must_use]
    pub fn offered(&self) -> bool {
        self.offered.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        if let Some(log) = &self.log {
            log.record(self.id);
        }
    }
}

impl Probe for RecordingProbe {
    fn id(&self) -> usize {
        self.id
    }

    fn ping(&self) {
        self.pings.fetch_add(1, Ordering::SeqCst);
        self.touch();
    }

    fn set_value(&self, value: i32) {
        self.value.store(value, Ordering::SeqCst);
        self.touch();
    }

    fn set_pair(&self, first: f64, second: f64) {
        *self.pair.lock().unwrap_or_else(PoisonError::into_inner) = (first, second);
        self.touch();
    }

    fn offer(&self, accept: bool) -> bool {
        self.offered.store(accept, Ordering::SeqCst);
        self.touch();
        accept
    }

    fn validate(&self, value: i32) -> Result<(), ProbeError> {
        self.touch();
        match self.limit {
            Some(limit) if value > limit => Err(ProbeError::Rejected {
                probe: self.id,
                value,
                limit,
            }),
            _ => {
                self.value.store(value, Ordering::SeqCst);
                Ok(())
            }
        }
    }
}
