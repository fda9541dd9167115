#![forbid(unsafe_code)]

//! Registry storage strategies.
//!
//! The registry is an ordered sequence of observer references. [`Storage`]
//! abstracts the container so callers can trade heap allocation for inline
//! capacity without touching the broadcaster.
//!
//! Implementations must keep insertion order and must make `retain`
//! panic-safe: if the predicate unwinds, every element is still owned by
//! the container exactly once. Both `Vec::retain` and `SmallVec::retain`
//! meet this.

/// Ordered container behind a broadcaster registry.
pub trait Storage<W>: Default {
    /// Create empty storage with room for at least `capacity` entries.
    fn with_capacity(capacity: usize) -> Self;

    /// Append an entry at the end.
    fn push(&mut self, entry: W);

    /// Keep only the entries for which `keep` returns true, visiting them
    /// in insertion order exactly once.
    fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&W) -> bool;

    /// Number of stored entries.
    fn len(&self) -> usize;

    /// True when there are no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    fn clear(&mut self);
}

impl<W> Storage<W> for Vec<W> {
    #[inline]
    fn with_capacity(capacity: usize) -> Self {
        Vec::with_capacity(capacity)
    }

    #[inline]
    fn push(&mut self, entry: W) {
        Vec::push(self, entry);
    }

    #[inline]
    fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&W) -> bool,
    {
        Vec::retain(self, keep);
    }

    #[inline]
    fn len(&self) -> usize {
        Vec::len(self)
    }

    #[inline]
    fn clear(&mut self) {
        Vec::clear(self);
    }
}

#[cfg(feature = "smallvec")]
impl<A> Storage<A::Item> for smallvec::SmallVec<A>
where
    A: smallvec::Array,
{
    #[inline]
    fn with_capacity(capacity: usize) -> Self {
        smallvec::SmallVec::with_capacity(capacity)
    }

    #[inline]
    fn push(&mut self, entry: A::Item) {
        smallvec::SmallVec::push(self, entry);
    }

    #[inline]
    fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&A::Item) -> bool,
    {
        smallvec::SmallVec::retain(self, |entry| keep(entry));
    }

    #[inline]
    fn len(&self) -> usize {
        smallvec::SmallVec::len(self)
    }

    #[inline]
    fn clear(&mut self) {
        smallvec::SmallVec::clear(self);
    }
}
