#![forbid(unsafe_code)]

//! Synchronous observer broadcasting over weak references.
//!
//! # Role
//! `weakcast` keeps a registry of observers it does not own and notifies
//! every observer that is still alive by calling one of its capability
//! methods. Observers destroyed elsewhere are dropped from the registry the
//! next time a traversal reaches them.
//!
//! # Primary pieces
//! - **[`Broadcaster`]**: registration, unregistration and notification.
//! - **[`LockPolicy`]**: [`SingleThreaded`] (no synchronization) or
//!   [`MultiThreaded`] (one non-reentrant mutex).
//! - **[`ObserverRef`]**: non-owning references, implemented for
//!   `std::rc::Weak` and `std::sync::Weak`.
//! - **[`Storage`]**: the container behind the registry (`Vec`, or
//!   `SmallVec` with the `smallvec` feature).
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Weak};
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use weakcast::SyncBroadcaster;
//!
//! trait Resize: Send + Sync {
//!     fn resized(&self, width: u32);
//! }
//!
//! #[derive(Default)]
//! struct Pane {
//!     width: AtomicU32,
//! }
//!
//! impl Resize for Pane {
//!     fn resized(&self, width: u32) {
//!         self.width.store(width, Ordering::Relaxed);
//!     }
//! }
//!
//! let bus: SyncBroadcaster<dyn Resize> = SyncBroadcaster::new();
//! let pane = Arc::new(Pane::default());
//! bus.register(Arc::downgrade(&pane) as Weak<dyn Resize>);
//!
//! bus.notify(|o| o.resized(120));
//! assert_eq!(pane.width.load(Ordering::Relaxed), 120);
//!
//! drop(pane);
//! bus.notify(|o| o.resized(80));
//! assert!(bus.is_empty());
//! ```
//!
//! # Feature flags
//! - `tracing`: structured logs for registration and pruning.
//! - `smallvec`: [`Storage`] for `smallvec::SmallVec`.

pub mod broadcaster;
pub mod lock;
pub mod observer_ref;
pub mod storage;

pub use broadcaster::Broadcaster;
pub use lock::{LockPolicy, MultiThreaded, SingleThreaded};
pub use observer_ref::ObserverRef;
pub use storage::Storage;

/// Broadcaster over `Arc`-owned observers, safe to share across threads.
pub type SyncBroadcaster<T> = Broadcaster<std::sync::Weak<T>, MultiThreaded>;

/// Broadcaster over `Rc`-owned observers, confined to one thread.
pub type LocalBroadcaster<T> = Broadcaster<std::rc::Weak<T>, SingleThreaded>;
