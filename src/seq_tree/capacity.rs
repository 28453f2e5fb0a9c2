use super::SeqTree;
use crate::raw::{Handle, RawSeqTree, Segment};

impl<T> SeqTree<T> {
    /// Creates an empty sequence with arena room for at least `capacity`
    /// elements' worth of segments.
    ///
    /// # Examples
    ///
    /// ```
    /// use seqtree::SeqTree;
    ///
    /// let seq: SeqTree<i32> = SeqTree::with_capacity(1024);
    /// assert!(seq.is_empty());
    /// assert!(seq.capacity() >= 1024);
    /// ```
    ///
    /// # Complexity
    ///
    /// O(capacity) for memory allocation.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        SeqTree {
            raw: RawSeqTree::with_capacity(capacity),
        }
    }

    /// Returns the number of elements the segment arena can hold before
    /// growing, assuming full segments.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    /// A conservative upper bound on the number of elements any `SeqTree`
    /// of this element type can hold: the handle space caps the segment
    /// count, and every non-root segment keeps at least its minimum fill.
    #[must_use]
    pub const fn max_len() -> usize {
        Handle::MAX.saturating_mul(Segment::<T>::MIN)
    }
}
