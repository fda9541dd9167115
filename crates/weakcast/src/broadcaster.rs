#![forbid(unsafe_code)]

//! Synchronous broadcaster over weakly-held observers.
//!
//! # Design
//!
//! [`Broadcaster`] keeps an ordered registry of [`ObserverRef`]s guarded by
//! a [`LockPolicy`]. Every operation takes the lock once, for its whole
//! duration, and runs to completion on the calling thread.
//!
//! Notification walks the registry in insertion order with a single
//! `retain` pass: live entries are upgraded and invoked, dead entries are
//! dropped in the same pass. There is no separate garbage collector; dead
//! entries disappear at the next traversal that reaches them.
//!
//! ```text
//! notify(f)
//! ┌──────────────────────────────────────────────┐
//! │ Registry: [A, B(dead), C, A]                 │
//! │   A  upgrade ok  → f(A), keep                │
//! │   B  upgrade ✗   → drop                      │
//! │   C  upgrade ok  → f(C), keep                │
//! │   A  upgrade ok  → f(A), keep  (duplicate)   │
//! │ Registry: [A, C, A]                          │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Result shapes
//!
//! | Method                                   | Invokes          | Returns                  |
//! |------------------------------------------|------------------|--------------------------|
//! | [`notify`](Broadcaster::notify)          | every live entry | `()`                     |
//! | [`notify_any`](Broadcaster::notify_any)  | every live entry | OR of all results        |
//! | [`notify_until`](Broadcaster::notify_until) | until first `true` | whether any claimed |
//! | [`try_notify`](Broadcaster::try_notify)  | until first `Err`| first error              |
//!
//! # Failure Modes
//!
//! - **Observer failure**: an `Err` from [`try_notify`](Broadcaster::try_notify)
//!   or a panic from any form aborts the traversal. Entries dropped before
//!   the failure stay dropped; entries not yet visited stay registered.
//! - **Reentrant call**: calling back into the same broadcaster from an
//!   observer panics under [`SingleThreaded`](crate::SingleThreaded) and
//!   deadlocks under [`MultiThreaded`]. Use
//!   [`is_locked`](Broadcaster::is_locked) to detect it.

use std::fmt;
use std::marker::PhantomData;

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

use crate::lock::{LockPolicy, MultiThreaded};
use crate::observer_ref::ObserverRef;
use crate::storage::Storage;

/// Registry of weakly-held observers with synchronous fan-out.
///
/// `W` is the reference type (e.g. `Weak<dyn Capability>`), `L` the
/// locking policy and `S` the storage behind the registry.
///
/// # Invariants
///
/// 1. Entries are visited in registration order.
/// 2. Each entry present at the start of a traversal is visited at most once.
/// 3. No entry for an observer remains after [`unregister`](Self::unregister)
///    returns for that observer.
/// 4. The broadcaster never keeps an observer alive past a single invocation.
pub struct Broadcaster<W, L = MultiThreaded, S = Vec<W>>
where
    W: ObserverRef,
    L: LockPolicy,
    S: Storage<W>,
{
    registry: L::Lock<S>,
    _entries: PhantomData<W>,
}

impl<W, L, S> Broadcaster<W, L, S>
where
    W: ObserverRef,
    L: LockPolicy,
    S: Storage<W>,
{
    /// Create an empty broadcaster.
    #[must_use]
    pub fn new() -> Self {
        Self::from_storage(S::default())
    }

    /// Create an empty broadcaster with room for `capacity` observers.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_storage(S::with_capacity(capacity))
    }

    fn from_storage(storage: S) -> Self {
        Self {
            registry: L::new(storage),
            _entries: PhantomData,
        }
    }

    /// Append `observer` to the end of the registry.
    ///
    /// No uniqueness check: registering the same observer twice delivers
    /// every notification to it twice. A reference whose referent is already
    /// gone is accepted and dropped at the next traversal.
    pub fn register(&self, observer: W) {
        let _len = self.with_registry(|entries| {
            entries.push(observer);
            entries.len()
        });

        #[cfg(feature = "tracing")]
        trace!(len = _len, "broadcaster: register");
    }

    /// Remove every entry that refers to the same observer as `observer`,
    /// together with every dead entry.
    ///
    /// Identity is strong-handle equality, so any reference to the same
    /// object works, not only the one originally registered. If the
    /// referent of `observer` is itself gone, only dead entries are removed.
    pub fn unregister(&self, observer: &W) {
        let target = observer.upgrade();
        let (_removed, _len) = self.with_registry(|entries| {
            let before = entries.len();
            entries.retain(|entry| match entry.upgrade() {
                None => false,
                Some(strong) => !target
                    .as_ref()
                    .is_some_and(|target| W::same_observer(&strong, target)),
            });
            (before - entries.len(), entries.len())
        });

        #[cfg(feature = "tracing")]
        trace!(removed = _removed, len = _len, "broadcaster: unregister");
    }

    /// Invoke `f` on every live observer, in registration order.
    ///
    /// Dead entries are dropped during the same pass.
    pub fn notify<F>(&self, mut f: F)
    where
        F: FnMut(&W::Target),
    {
        self.traverse(|observer| {
            f(observer);
            Visit::Continue
        });
    }

    /// Invoke `f` on every live observer and report whether any returned
    /// `true`.
    ///
    /// Delivery never stops early: observers after the first `true` are
    /// still invoked, their results are just not needed.
    pub fn notify_any<F>(&self, mut f: F) -> bool
    where
        F: FnMut(&W::Target) -> bool,
    {
        let mut claimed = false;
        self.traverse(|observer| {
            let result = f(observer);
            claimed = claimed || result;
            Visit::Continue
        });
        claimed
    }

    /// Invoke `f` on live observers until one returns `true`.
    ///
    /// Later entries are still visited so dead ones get dropped, but `f` is
    /// not called for them. Returns whether any observer returned `true`.
    pub fn notify_until<F>(&self, mut f: F) -> bool
    where
        F: FnMut(&W::Target) -> bool,
    {
        let mut claimed = false;
        self.traverse(|observer| {
            if !claimed {
                claimed = f(observer);
            }
            Visit::Continue
        });
        claimed
    }

    /// Invoke a fallible `f` on every live observer, stopping at the first
    /// error.
    ///
    /// # Errors
    ///
    /// Returns the first `Err` produced by an observer. Entries after the
    /// failing one are left untouched, dead or alive.
    pub fn try_notify<E, F>(&self, mut f: F) -> Result<(), E>
    where
        F: FnMut(&W::Target) -> Result<(), E>,
    {
        let mut failure = None;
        self.traverse(|observer| match f(observer) {
            Ok(()) => Visit::Continue,
            Err(err) => {
                failure = Some(err);
                Visit::Stop
            }
        });

        match failure {
            None => Ok(()),
            Some(err) => {
                #[cfg(feature = "tracing")]
                debug!("broadcaster: notification aborted by observer error");
                Err(err)
            }
        }
    }

    /// Drop every dead entry and return how many were removed.
    pub fn prune(&self) -> usize {
        self.with_registry(|entries| {
            let before = entries.len();
            entries.retain(|entry| !entry.is_expired());
            before - entries.len()
        })
    }

    /// Drop every entry, live or dead.
    pub fn clear(&self) {
        self.with_registry(S::clear);
    }

    /// Number of registry entries, including dead ones not yet dropped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.with_registry(|entries| entries.len())
    }

    /// True when the registry holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.with_registry(|entries| entries.is_empty())
    }

    /// True while an operation on this broadcaster is in progress.
    ///
    /// An observer can check this before calling back into the broadcaster
    /// that is notifying it; such a call would panic or deadlock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        L::is_held::<S>(&self.registry)
    }

    fn with_registry<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        L::with::<S, R>(&self.registry, f)
    }

    /// Single pass over the registry under the lock.
    ///
    /// `visit` is called with each live observer until it returns
    /// [`Visit::Stop`]; after that, remaining entries are kept as-is.
    fn traverse<F>(&self, mut visit: F)
    where
        F: FnMut(&W::Target) -> Visit,
    {
        let (_pruned, _remaining) = self.with_registry(|entries| {
            let before = entries.len();
            let mut stopped = false;
            entries.retain(|entry| {
                if stopped {
                    return true;
                }
                match entry.upgrade() {
                    Some(observer) => {
                        stopped = visit(&*observer) == Visit::Stop;
                        true
                    }
                    None => false,
                }
            });
            (before - entries.len(), entries.len())
        });

        #[cfg(feature = "tracing")]
        log_pruned(_pruned, _remaining);
    }
}

#[cfg(feature = "tracing")]
fn log_pruned(pruned: usize, remaining: usize) {
    if pruned > 0 {
        debug!(pruned, remaining, "broadcaster: pruned dead observers");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Continue,
    Stop,
}

impl<W, L, S> Default for Broadcaster<W, L, S>
where
    W: ObserverRef,
    L: LockPolicy,
    S: Storage<W>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<W, L, S> fmt::Debug for Broadcaster<W, L, S>
where
    W: ObserverRef,
    L: LockPolicy,
    S: Storage<W>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("Broadcaster");
        // Taking the lock here would hang under MultiThreaded when a
        // notification is running on this thread.
        if self.is_locked() {
            dbg.field("observers", &"<locked>");
        } else {
            dbg.field("observers", &self.len());
        }
        dbg.finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SingleThreaded;
    use std::cell::{Cell, RefCell};
    use std::rc::{Rc, Weak};

    trait Listener {
        fn id(&self) -> u32;
        fn ping(&self);
        fn claim(&self, value: bool) -> bool;
        fn check(&self, limit: u32) -> Result<(), u32>;
    }

    #[derive(Default)]
    struct Counter {
        id: u32,
        pings: Cell<u32>,
        claimed: Cell<bool>,
        log: Option<Rc<RefCell<Vec<u32>>>>,
    }

    impl Counter {
        fn new(id: u32) -> Rc<Self> {
            Rc::new(Self {
                id,
                ..Self::default()
            })
        }

        fn logged(id: u32, log: &Rc<RefCell<Vec<u32>>>) -> Rc<Self> {
            Rc::new(Self {
                id,
                log: Some(Rc::clone(log)),
                ..Self::default()
            })
        }
    }

    impl Listener for Counter {
        fn id(&self) -> u32 {
            self.id
        }

        fn ping(&self) {
            self.pings.set(self.pings.get() + 1);
            if let Some(log) = &self.log {
                log.borrow_mut().push(self.id);
            }
        }

        fn claim(&self, value: bool) -> bool {
            self.claimed.set(value);
            value
        }

        fn check(&self, limit: u32) -> Result<(), u32> {
            self.ping();
            if self.id > limit { Err(self.id) } else { Ok(()) }
        }
    }

    type Local = Broadcaster<Weak<dyn Listener>, SingleThreaded>;

    fn weak(counter: &Rc<Counter>) -> Weak<dyn Listener> {
        Rc::downgrade(counter) as Weak<dyn Listener>
    }

    #[test]
    fn new_is_empty() {
        let bus = Local::new();
        assert!(bus.is_empty());
        assert_eq!(bus.len(), 0);
        assert!(!bus.is_locked());
    }

    #[test]
    fn register_appends() {
        let bus = Local::with_capacity(4);
        let a = Counter::new(1);
        bus.register(weak(&a));
        bus.register(weak(&a));
        assert_eq!(bus.len(), 2);
    }

    #[test]
    fn notify_visits_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let bus = Local::new();
        let observers: Vec<_> = (1..=3).map(|id| Counter::logged(id, &log)).collect();
        for o in &observers {
            bus.register(weak(o));
        }

        bus.notify(|o| o.ping());
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn duplicate_registration_delivers_twice() {
        let bus = Local::new();
        let a = Counter::new(1);
        bus.register(weak(&a));
        bus.register(weak(&a));

        bus.notify(|o| o.ping());
        assert_eq!(a.pings.get(), 2);
    }

    #[test]
    fn dead_observer_is_skipped_and_pruned() {
        let bus = Local::new();
        let a = Counter::new(1);
        let b = Counter::new(2);
        bus.register(weak(&a));
        bus.register(weak(&b));
        drop(b);

        assert_eq!(bus.len(), 2);
        bus.notify(|o| o.ping());
        assert_eq!(a.pings.get(), 1);
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn dead_reference_is_accepted_then_pruned() {
        let bus = Local::new();
        let gone = Counter::new(9);
        let w = weak(&gone);
        drop(gone);

        bus.register(w);
        assert_eq!(bus.len(), 1);
        bus.notify(|o| o.ping());
        assert!(bus.is_empty());
    }

    #[test]
    fn unregister_removes_all_duplicates() {
        let bus = Local::new();
        let a = Counter::new(1);
        let b = Counter::new(2);
        bus.register(weak(&a));
        bus.register(weak(&b));
        bus.register(weak(&a));

        bus.unregister(&weak(&a));
        assert_eq!(bus.len(), 1);

        bus.notify(|o| o.ping());
        assert_eq!(a.pings.get(), 0);
        assert_eq!(b.pings.get(), 1);
    }

    #[test]
    fn unregister_with_distinct_reference_value() {
        let bus = Local::new();
        let a = Counter::new(1);
        let registered = weak(&a);
        let other_handle = Rc::downgrade(&a) as Weak<dyn Listener>;
        bus.register(registered);

        bus.unregister(&other_handle);
        assert!(bus.is_empty());
    }

    #[test]
    fn unregister_collects_dead_entries() {
        let bus = Local::new();
        let a = Counter::new(1);
        let b = Counter::new(2);
        let c = Counter::new(3);
        bus.register(weak(&a));
        bus.register(weak(&b));
        bus.register(weak(&c));
        drop(b);

        bus.unregister(&weak(&c));
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn unregister_dead_target_only_prunes() {
        let bus = Local::new();
        let a = Counter::new(1);
        let gone = Counter::new(2);
        let gone_ref = weak(&gone);
        bus.register(weak(&a));
        bus.register(gone_ref.clone());
        drop(gone);

        bus.unregister(&gone_ref);
        assert_eq!(bus.len(), 1);
        bus.notify(|o| o.ping());
        assert_eq!(a.pings.get(), 1);
    }

    #[test]
    fn notify_any_invokes_everyone() {
        let bus = Local::new();
        let observers: Vec<_> = (1..=3).map(Counter::new).collect();
        for o in &observers {
            bus.register(weak(o));
        }

        assert!(bus.notify_any(|o| o.claim(true)));
        assert!(observers.iter().all(|o| o.claimed.get()));
    }

    #[test]
    fn notify_any_false_when_nobody_claims() {
        let bus = Local::new();
        let a = Counter::new(1);
        bus.register(weak(&a));
        assert!(!bus.notify_any(|o| o.claim(false)));
    }

    #[test]
    fn notify_any_true_from_last_position() {
        let bus = Local::new();
        let observers: Vec<_> = (1..=4).map(Counter::new).collect();
        for o in &observers {
            bus.register(weak(o));
        }
        assert!(bus.notify_any(|o| o.claim(o.id() == 4)));
        let claimed: Vec<bool> = observers.iter().map(|o| o.claimed.get()).collect();
        assert_eq!(claimed, vec![false, false, false, true]);
    }

    #[test]
    fn notify_until_stops_invoking_after_first_claim() {
        let bus = Local::new();
        let observers: Vec<_> = (1..=3).map(Counter::new).collect();
        for o in &observers {
            bus.register(weak(o));
        }

        assert!(bus.notify_until(|o| o.claim(true)));
        let claimed = observers.iter().filter(|o| o.claimed.get()).count();
        assert_eq!(claimed, 1);
        assert!(observers[0].claimed.get());
    }

    #[test]
    fn notify_until_still_prunes_after_claim() {
        let bus = Local::new();
        let a = Counter::new(1);
        let b = Counter::new(2);
        bus.register(weak(&a));
        bus.register(weak(&b));
        drop(b);

        assert!(bus.notify_until(|o| o.claim(true)));
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn try_notify_stops_at_first_error() {
        let bus = Local::new();
        let observers: Vec<_> = (1..=4).map(Counter::new).collect();
        for o in &observers {
            bus.register(weak(o));
        }

        assert_eq!(bus.try_notify(|o| o.check(2)), Err(3));
        let pings: Vec<u32> = observers.iter().map(|o| o.pings.get()).collect();
        assert_eq!(pings, vec![1, 1, 1, 0]);
    }

    #[test]
    fn try_notify_leaves_unvisited_dead_entries() {
        let bus = Local::new();
        let a = Counter::new(1);
        let b = Counter::new(5);
        let c = Counter::new(2);
        let d = Counter::new(3);
        bus.register(weak(&a));
        bus.register(weak(&b));
        bus.register(weak(&c));
        bus.register(weak(&d));
        drop(c);

        assert_eq!(bus.try_notify(|o| o.check(4)), Err(5));
        // The dead entry sits after the failure point and is kept.
        assert_eq!(bus.len(), 4);

        assert_eq!(bus.prune(), 1);
        assert_eq!(bus.len(), 3);
    }

    #[test]
    fn try_notify_ok_visits_everyone() {
        let bus = Local::new();
        let observers: Vec<_> = (1..=3).map(Counter::new).collect();
        for o in &observers {
            bus.register(weak(o));
        }
        assert_eq!(bus.try_notify(|o| o.check(10)), Ok(()));
        assert!(observers.iter().all(|o| o.pings.get() == 1));
    }

    #[test]
    fn panic_aborts_traversal_and_keeps_rest() {
        let bus = Local::new();
        let a = Counter::new(1);
        let b = Counter::new(2);
        let gone = Counter::new(3);
        let c = Counter::new(4);
        bus.register(weak(&gone));
        bus.register(weak(&a));
        bus.register(weak(&b));
        bus.register(weak(&c));
        drop(gone);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            bus.notify(|o| {
                o.ping();
                assert!(o.check(1).is_ok(), "observer failed");
            });
        }));
        assert!(result.is_err());
        assert_eq!(bus.len(), 3);
        assert_eq!(c.pings.get(), 0);

        bus.notify(|o| o.ping());
        assert_eq!(c.pings.get(), 1);
    }

    #[test]
    fn prune_counts_removed() {
        let bus = Local::new();
        let a = Counter::new(1);
        let b = Counter::new(2);
        bus.register(weak(&a));
        bus.register(weak(&b));
        assert_eq!(bus.prune(), 0);
        drop(a);
        drop(b);
        assert_eq!(bus.prune(), 2);
        assert!(bus.is_empty());
    }

    #[test]
    fn clear_drops_live_entries_without_touching_observers() {
        let bus = Local::new();
        let a = Counter::new(1);
        bus.register(weak(&a));
        bus.clear();
        assert!(bus.is_empty());
        assert_eq!(Rc::strong_count(&a), 1);
    }

    #[test]
    fn broadcaster_never_owns_observers() {
        let bus = Local::new();
        let a = Counter::new(1);
        bus.register(weak(&a));
        bus.notify(|o| o.ping());
        assert_eq!(Rc::strong_count(&a), 1);
    }

    #[test]
    fn is_locked_inside_notification() {
        let bus = Rc::new(Local::new());
        let a = Counter::new(1);
        bus.register(weak(&a));

        let seen = Cell::new(false);
        let probe = Rc::clone(&bus);
        bus.notify(|_| seen.set(probe.is_locked()));
        assert!(seen.get());
        assert!(!bus.is_locked());
    }

    #[test]
    #[should_panic]
    fn reentrant_register_panics_single_threaded() {
        let bus = Rc::new(Local::new());
        let a = Counter::new(1);
        bus.register(weak(&a));

        let inner = Rc::clone(&bus);
        bus.notify(|_| inner.register(weak(&a)));
    }

    #[test]
    fn debug_reports_len() {
        let bus = Local::new();
        let a = Counter::new(1);
        bus.register(weak(&a));
        let dbg = format!("{bus:?}");
        assert!(dbg.contains("Broadcaster"));
        assert!(dbg.contains("observers: 1"));
    }

    #[test]
    fn multi_threaded_default_policy() {
        use std::sync::{Arc, Weak as SyncWeak};

        trait Sink: Send + Sync {
            fn hit(&self) -> bool;
        }
        struct Always;
        impl Sink for Always {
            fn hit(&self) -> bool {
                true
            }
        }

        let bus: Broadcaster<SyncWeak<dyn Sink>> = Broadcaster::default();
        let a = Arc::new(Always);
        bus.register(Arc::downgrade(&a) as SyncWeak<dyn Sink>);
        assert!(bus.notify_any(|s| s.hit()));
        drop(a);
        assert!(!bus.notify_any(|s| s.hit()));
        assert!(bus.is_empty());
    }
}
