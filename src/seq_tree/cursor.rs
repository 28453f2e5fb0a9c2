use core::cmp::Ordering;
use core::fmt;

use crate::raw::{Locator, RawSeqTree};

/// A random-access cursor into a [`SeqTree`](super::SeqTree).
///
/// A cursor caches the segment that holds its position, so dereferencing
/// never walks the tree. Stepping to a neighbour is amortized O(1);
/// [`seek_forward`](Cursor::seek_forward) and
/// [`seek_backward`](Cursor::seek_backward) jump `k` positions in O(log k)
/// by skipping whole subtrees.
///
/// The cursor also exposes the segment itself: [`segment`](Cursor::segment)
/// returns the contiguous slice of elements around the current position,
/// and [`move_after_segment`](Cursor::move_after_segment) /
/// [`move_before_segment`](Cursor::move_before_segment) jump straight over
/// segment boundaries. Together they let a consumer run tight inner loops
/// over plain slices:
///
/// ```
/// use seqtree::SeqTree;
///
/// let seq: SeqTree<u64> = (0..10_000).collect();
///
/// let mut sum = 0;
/// let mut cursor = seq.cursor(0);
/// while !cursor.is_end() {
///     sum += cursor.segment().iter().sum::<u64>();
///     cursor.move_after_segment();
/// }
/// assert_eq!(sum, seq.iter().sum());
/// ```
///
/// A cursor borrows the tree, so it cannot outlive a mutation.
pub struct Cursor<'a, T> {
    tree: &'a RawSeqTree<T>,
    loc: Locator,
}

impl<T> Clone for Cursor<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Cursor<'_, T> {}

impl<'a, T> Cursor<'a, T> {
    pub(super) fn new(tree: &'a RawSeqTree<T>, loc: Locator) -> Self {
        Self { tree, loc }
    }

    /// The logical index of the current position.
    ///
    /// # Complexity
    ///
    /// O(1): the index is carried by the cursor, not recomputed.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.loc.pos
    }

    /// Returns `true` if the cursor is parked one past the last element.
    #[must_use]
    pub const fn is_end(&self) -> bool {
        self.loc.is_end()
    }

    /// Returns the element under the cursor, or `None` at the end position.
    #[must_use]
    pub fn get(&self) -> Option<&'a T> {
        if self.is_end() {
            return None;
        }
        Some(self.tree.element(&self.loc))
    }

    /// The contiguous slice of the segment the cursor sits in. Empty only
    /// for an empty tree.
    #[must_use]
    pub fn segment(&self) -> &'a [T] {
        self.tree.segment_slice(&self.loc)
    }

    /// The cursor's offset within [`segment`](Self::segment); equals the
    /// slice length at the end position.
    #[must_use]
    pub const fn segment_offset(&self) -> usize {
        self.loc.offset
    }

    /// Steps to the next position.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is at the end.
    ///
    /// # Complexity
    ///
    /// Amortized O(1).
    pub fn move_next(&mut self) {
        assert!(!self.is_end(), "`Cursor::move_next()` - cursor is at the end!");
        self.tree.move_next(&mut self.loc);
    }

    /// Steps to the previous position; the end cursor steps onto the last
    /// element.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is at index 0.
    ///
    /// # Complexity
    ///
    /// Amortized O(1).
    pub fn move_prev(&mut self) {
        assert!(self.index() != 0, "`Cursor::move_prev()` - cursor is at the front!");
        self.tree.move_prev(&mut self.loc);
    }

    /// Jumps `count` positions toward the back; landing one past the last
    /// element is allowed.
    ///
    /// # Panics
    ///
    /// Panics if the destination is past the end.
    ///
    /// # Complexity
    ///
    /// O(log count)
    pub fn seek_forward(&mut self, count: usize) {
        assert!(
            self.index() + count <= self.tree.len(),
            "`Cursor::seek_forward()` - destination (is {}) is greater than `len` (is {})!",
            self.index() + count,
            self.tree.len()
        );
        self.tree.seek_forward(&mut self.loc, count);
    }

    /// Jumps `count` positions toward the front.
    ///
    /// # Panics
    ///
    /// Panics if the destination is before index 0.
    ///
    /// # Complexity
    ///
    /// O(log count)
    pub fn seek_backward(&mut self, count: usize) {
        assert!(
            count <= self.index(),
            "`Cursor::seek_backward()` - destination is before the front (index {}, count {count})!",
            self.index()
        );
        self.tree.seek_backward(&mut self.loc, count);
    }

    /// Jumps to the first element of the next segment, or to the end
    /// position if this is the last segment.
    ///
    /// # Complexity
    ///
    /// Amortized O(1).
    pub fn move_after_segment(&mut self) {
        assert!(!self.is_end(), "`Cursor::move_after_segment()` - cursor is at the end!");
        self.tree.move_after_segment(&mut self.loc, 0);
    }

    /// Jumps `count` positions past the start of the next segment.
    ///
    /// # Panics
    ///
    /// Panics if the destination is past the end.
    pub fn move_after_segment_by(&mut self, count: usize) {
        assert!(!self.is_end(), "`Cursor::move_after_segment_by()` - cursor is at the end!");
        let destination = self.index() + (self.loc.seg_len - self.loc.offset) + count;
        assert!(
            destination <= self.tree.len(),
            "`Cursor::move_after_segment_by()` - destination (is {destination}) is greater than `len` (is {})!",
            self.tree.len()
        );
        self.tree.move_after_segment(&mut self.loc, count);
    }

    /// Jumps to the last element of the previous segment.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is in the first segment.
    pub fn move_before_segment(&mut self) {
        self.move_before_segment_by(1);
    }

    /// Jumps `count` positions before the end of the previous segment
    /// (`count == 1` is its last element).
    ///
    /// # Panics
    ///
    /// Panics if `count == 0` or the destination is before index 0.
    pub fn move_before_segment_by(&mut self, count: usize) {
        assert!(count != 0, "`Cursor::move_before_segment_by()` - `count` must be nonzero!");
        assert!(
            self.loc.offset + count <= self.index(),
            "`Cursor::move_before_segment_by()` - destination is before the front (index {}, count {count})!",
            self.index()
        );
        self.tree.move_before_segment(&mut self.loc, count);
    }
}

impl<T> PartialEq for Cursor<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.index() == other.index()
    }
}

impl<T> Eq for Cursor<'_, T> {}

impl<T> PartialOrd for Cursor<'_, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Cursor<'_, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index().cmp(&other.index())
    }
}

impl<T: fmt::Debug> fmt::Debug for Cursor<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor").field("index", &self.index()).field("value", &self.get()).finish()
    }
}
