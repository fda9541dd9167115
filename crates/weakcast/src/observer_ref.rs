#![forbid(unsafe_code)]

//! Non-owning observer references.
//!
//! The broadcaster never owns its observers. It stores an [`ObserverRef`]
//! and promotes it to a strong handle only for the duration of a single
//! invocation.
//!
//! Both standard weak pointers implement the trait, including weak pointers
//! to trait objects (`Weak<dyn Capability>`), so the capability interface
//! is simply the pointee type.

use std::ops::Deref;
use std::{rc, sync};

/// A weakly-held reference to an observer owned elsewhere.
pub trait ObserverRef {
    /// The capability interface the observer implements.
    type Target: ?Sized;

    /// A temporary owning handle, valid while it is held.
    type Strong: Deref<Target = Self::Target>;

    /// Obtain a strong handle if the referent is still alive.
    fn upgrade(&self) -> Option<Self::Strong>;

    /// True once every strong handle to the referent has been dropped.
    fn is_expired(&self) -> bool;

    /// Identity comparison between two strong handles.
    ///
    /// Compares the referent's address only, so two handles to the same
    /// object obtained through different trait-object vtables are equal.
    fn same_observer(a: &Self::Strong, b: &Self::Strong) -> bool;
}

impl<T: ?Sized> ObserverRef for rc::Weak<T> {
    type Target = T;
    type Strong = rc::Rc<T>;

    #[inline]
    fn upgrade(&self) -> Option<rc::Rc<T>> {
        rc::Weak::upgrade(self)
    }

    #[inline]
    fn is_expired(&self) -> bool {
        self.strong_count() == 0
    }

    #[inline]
    fn same_observer(a: &rc::Rc<T>, b: &rc::Rc<T>) -> bool {
        rc::Rc::ptr_eq(a, b)
    }
}

impl<T: ?Sized> ObserverRef for sync::Weak<T> {
    type Target = T;
    type Strong = sync::Arc<T>;

    #[inline]
    fn upgrade(&self) -> Option<sync::Arc<T>> {
        sync::Weak::upgrade(self)
    }

    #[inline]
    fn is_expired(&self) -> bool {
        self.strong_count() == 0
    }

    #[inline]
    fn same_observer(a: &sync::Arc<T>, b: &sync::Arc<T>) -> bool {
        sync::Arc::ptr_eq(a, b)
    }
}
