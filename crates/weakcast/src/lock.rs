#![forbid(unsafe_code)]

//! Locking policies for the broadcaster registry.
//!
//! A [`LockPolicy`] decides how the registry is wrapped and how exclusive
//! access is granted for the duration of a single broadcaster call. The
//! policy is a type parameter, so the single-threaded case compiles down to
//! a `RefCell` borrow flag with no synchronization at all.
//!
//! | Policy             | Wrapper        | Reentrant call from an observer |
//! |--------------------|----------------|---------------------------------|
//! | [`SingleThreaded`] | `RefCell<S>`   | panics (already borrowed)       |
//! | [`MultiThreaded`]  | `Mutex<S>`     | deadlocks (non-reentrant lock)  |
//!
//! # Poisoning
//!
//! An observer that panics mid-notification poisons the `Mutex`. The
//! registry traversal only ever uses panic-safe `retain`, so the contents
//! are consistent and the poison flag is ignored.

use std::cell::RefCell;
use std::sync::{Mutex, PoisonError, TryLockError};

/// Scoped exclusive access to a value of type `S`.
pub trait LockPolicy {
    /// The wrapper that owns the guarded value.
    type Lock<S>;

    /// Wrap `value` in this policy's lock.
    fn new<S>(value: S) -> Self::Lock<S>;

    /// Run `f` with exclusive access to the guarded value.
    ///
    /// The lock is held until `f` returns or unwinds.
    fn with<S, R>(lock: &Self::Lock<S>, f: impl FnOnce(&mut S) -> R) -> R;

    /// True while some caller is inside [`with`](Self::with).
    fn is_held<S>(lock: &Self::Lock<S>) -> bool;
}

/// No synchronization; for broadcasters confined to one thread.
///
/// Reentrant access panics instead of silently invalidating an in-progress
/// traversal.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleThreaded;

impl LockPolicy for SingleThreaded {
    type Lock<S> = RefCell<S>;

    #[inline]
    fn new<S>(value: S) -> RefCell<S> {
        RefCell::new(value)
    }

    #[inline]
    fn with<S, R>(lock: &RefCell<S>, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut lock.borrow_mut())
    }

    #[inline]
    fn is_held<S>(lock: &RefCell<S>) -> bool {
        lock.try_borrow_mut().is_err()
    }
}

/// Mutual exclusion through a single non-reentrant [`Mutex`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiThreaded;

impl LockPolicy for MultiThreaded {
    type Lock<S> = Mutex<S>;

    #[inline]
    fn new<S>(value: S) -> Mutex<S> {
        Mutex::new(value)
    }

    #[inline]
    fn with<S, R>(lock: &Mutex<S>, f: impl FnOnce(&mut S) -> R) -> R {
        let mut guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    #[inline]
    fn is_held<S>(lock: &Mutex<S>) -> bool {
        matches!(lock.try_lock(), Err(TryLockError::WouldBlock))
    }
}
