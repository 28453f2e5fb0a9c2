use alloc::vec::Vec;

use smallvec::SmallVec;

use super::arena::{Arena, Handle};
use super::node::{BASE_MAX, BASE_MIN, Node};
use super::segment::Segment;

/// The root of the tree. Which variant is live is equivalent to the height:
/// 0 is `Empty`, 1 is `Segment`, 2 and up is `Node`.
#[derive(Clone, Copy)]
enum Root {
    Empty,
    Segment(Handle),
    Node(Handle),
}

/// A resolved position: the segment that holds it, the offset inside that
/// segment, the owning leaf slot, and the logical index itself.
///
/// `leaf == None` means the root is a segment (or the tree is empty). The
/// end position is encoded as `offset == seg_len`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Locator {
    pub(crate) segment: Option<Handle>,
    pub(crate) offset: usize,
    pub(crate) seg_len: usize,
    pub(crate) leaf: Option<Handle>,
    pub(crate) leaf_slot: usize,
    pub(crate) pos: usize,
}

impl Locator {
    pub(crate) const fn empty() -> Self {
        Self {
            segment: None,
            offset: 0,
            seg_len: 0,
            leaf: None,
            leaf_slot: 0,
            pos: 0,
        }
    }

    pub(crate) const fn is_end(&self) -> bool {
        self.offset == self.seg_len
    }
}

/// The segmented counted B+tree backing `SeqTree`.
pub(crate) struct RawSeqTree<T> {
    /// Arena storing all element buffers.
    segments: Arena<Segment<T>>,
    /// Arena storing all tree nodes.
    nodes: Arena<Node>,
    root: Root,
    /// Levels in the tree; segments sit `height - 1` edges below the root.
    height: usize,
    /// Total number of elements.
    len: usize,
}

impl<T> RawSeqTree<T> {
    pub(crate) const fn new() -> Self {
        Self {
            segments: Arena::new(),
            nodes: Arena::new(),
            root: Root::Empty,
            height: 0,
            len: 0,
        }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            segments: Arena::with_capacity(capacity.div_ceil(Segment::<T>::MAX)),
            nodes: Arena::new(),
            root: Root::Empty,
            height: 0,
            len: 0,
        }
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) const fn height(&self) -> usize {
        self.height
    }

    pub(crate) fn capacity(&self) -> usize {
        self.segments.capacity() * Segment::<T>::MAX
    }

    pub(crate) fn clear(&mut self) {
        self.segments.clear();
        self.nodes.clear();
        self.root = Root::Empty;
        self.height = 0;
        self.len = 0;
    }

    // ─── Element access ──────────────────────────────────────────────────

    pub(crate) fn element(&self, loc: &Locator) -> &T {
        debug_assert!(!loc.is_end(), "`RawSeqTree::element()` - dereference of an end locator!");
        let segment = loc.segment.expect("`RawSeqTree::element()` - dereference of an empty-tree locator!");
        &self.segments.get(segment).as_slice()[loc.offset]
    }

    pub(crate) fn element_mut(&mut self, loc: &Locator) -> &mut T {
        debug_assert!(!loc.is_end(), "`RawSeqTree::element_mut()` - dereference of an end locator!");
        let segment = loc.segment.expect("`RawSeqTree::element_mut()` - dereference of an empty-tree locator!");
        &mut self.segments.get_mut(segment).as_mut_slice()[loc.offset]
    }

    /// Returns a mutable reference to the element at `loc` from a raw pointer.
    ///
    /// # Safety
    /// - `ptr` must point to a valid, allocated `RawSeqTree<T>`.
    /// - The caller must have logical exclusive access to the element at `loc`.
    pub(crate) unsafe fn element_mut_ptr<'a>(ptr: *mut Self, loc: &Locator) -> &'a mut T {
        let segment = loc.segment.expect("`RawSeqTree::element_mut_ptr()` - dereference of an empty-tree locator!");
        // SAFETY: We only access the `segments` field, so references into the
        // node arena stay undisturbed. Element buffers sit behind their own
        // heap allocations, so distinct locators yield disjoint references.
        unsafe {
            let segments = &mut *core::ptr::addr_of_mut!((*ptr).segments);
            &mut segments.get_mut(segment).as_mut_slice()[loc.offset]
        }
    }

    /// The contiguous slice of the segment the locator sits in.
    pub(crate) fn segment_slice(&self, loc: &Locator) -> &[T] {
        match loc.segment {
            None => &[],
            Some(segment) => self.segments.get(segment).as_slice(),
        }
    }

    // ─── Positional lookup ───────────────────────────────────────────────

    /// Resolves position `pos`; `pos >= len` resolves to the end locator.
    pub(crate) fn locate(&self, pos: usize) -> Locator {
        if pos >= self.len {
            return self.locate_end();
        }
        match self.root {
            Root::Empty => Locator::empty(),
            Root::Segment(segment) => Locator {
                segment: Some(segment),
                offset: pos,
                seg_len: self.segments.get(segment).len(),
                leaf: None,
                leaf_slot: 0,
                pos,
            },
            Root::Node(node) => {
                let mut loc = Locator { pos, ..Locator::empty() };
                self.descend_index_into(node, self.height - 1, pos, &mut loc);
                loc
            }
        }
    }

    /// The first position, without scanning any size array.
    pub(crate) fn locate_first(&self) -> Locator {
        match self.root {
            Root::Empty => Locator::empty(),
            Root::Segment(segment) => Locator {
                segment: Some(segment),
                offset: 0,
                seg_len: self.segments.get(segment).len(),
                leaf: None,
                leaf_slot: 0,
                pos: 0,
            },
            Root::Node(node) => {
                let mut loc = Locator::empty();
                self.descend_first_into(node, self.height - 1, &mut loc);
                loc
            }
        }
    }

    /// The last position; the tree must not be empty.
    pub(crate) fn locate_last(&self) -> Locator {
        match self.root {
            Root::Empty => Locator::empty(),
            Root::Segment(segment) => {
                let seg_len = self.segments.get(segment).len();
                Locator {
                    segment: Some(segment),
                    offset: seg_len - 1,
                    seg_len,
                    leaf: None,
                    leaf_slot: 0,
                    pos: self.len - 1,
                }
            }
            Root::Node(node) => {
                let mut loc = Locator { pos: self.len - 1, ..Locator::empty() };
                self.descend_last_into(node, self.height - 1, &mut loc);
                loc
            }
        }
    }

    /// One past the last position.
    pub(crate) fn locate_end(&self) -> Locator {
        match self.root {
            Root::Empty => Locator::empty(),
            Root::Segment(segment) => {
                let seg_len = self.segments.get(segment).len();
                Locator {
                    segment: Some(segment),
                    offset: seg_len,
                    seg_len,
                    leaf: None,
                    leaf_slot: 0,
                    pos: self.len,
                }
            }
            Root::Node(node) => {
                let mut loc = Locator { pos: self.len, ..Locator::empty() };
                self.descend_end_into(node, self.height - 1, &mut loc);
                loc
            }
        }
    }

    /// Descends to position `pos` within the subtree at `node` (`level` is
    /// the node's distance from the segments; 1 means leaf).
    fn descend_index_into(&self, mut node: Handle, mut level: usize, mut pos: usize, loc: &mut Locator) {
        while level > 1 {
            let n = self.nodes.get(node);
            let (index, rest) = n.select(pos);
            node = n.child(index);
            pos = rest;
            level -= 1;
        }
        let leaf = self.nodes.get(node);
        let (slot, offset) = leaf.select(pos);
        loc.segment = Some(leaf.child(slot));
        loc.seg_len = leaf.size(slot);
        loc.offset = offset;
        loc.leaf = Some(node);
        loc.leaf_slot = slot;
    }

    fn descend_first_into(&self, mut node: Handle, mut level: usize, loc: &mut Locator) {
        while level > 1 {
            node = self.nodes.get(node).child(0);
            level -= 1;
        }
        let leaf = self.nodes.get(node);
        loc.segment = Some(leaf.child(0));
        loc.seg_len = leaf.size(0);
        loc.offset = 0;
        loc.leaf = Some(node);
        loc.leaf_slot = 0;
    }

    fn descend_last_into(&self, mut node: Handle, mut level: usize, loc: &mut Locator) {
        while level > 1 {
            let n = self.nodes.get(node);
            node = n.child(n.len() - 1);
            level -= 1;
        }
        let leaf = self.nodes.get(node);
        let slot = leaf.len() - 1;
        loc.segment = Some(leaf.child(slot));
        loc.seg_len = leaf.size(slot);
        loc.offset = loc.seg_len - 1;
        loc.leaf = Some(node);
        loc.leaf_slot = slot;
    }

    fn descend_end_into(&self, node: Handle, level: usize, loc: &mut Locator) {
        self.descend_last_into(node, level, loc);
        loc.offset = loc.seg_len;
    }

    // ─── Neighbour walks ─────────────────────────────────────────────────

    /// Steps to the next position. Amortized O(1): the tree is only
    /// consulted at segment boundaries.
    pub(crate) fn move_next(&self, loc: &mut Locator) {
        loc.pos += 1;
        let offset = loc.offset + 1;
        if offset < loc.seg_len {
            loc.offset = offset;
            return;
        }
        self.enter_next_segment(loc);
    }

    /// Installs the first element of the segment after the current one, or
    /// parks the locator in end form when there is none.
    fn enter_next_segment(&self, loc: &mut Locator) {
        let Some(leaf) = loc.leaf else {
            loc.offset = loc.seg_len;
            return;
        };
        let node = self.nodes.get(leaf);
        let slot = loc.leaf_slot + 1;
        if slot < node.len() {
            loc.leaf_slot = slot;
            loc.segment = Some(node.child(slot));
            loc.seg_len = node.size(slot);
            loc.offset = 0;
            return;
        }
        // Ascend the spine until an ancestor has a right neighbour.
        let mut cursor = node.parent();
        let mut level = 2;
        loop {
            let Some((branch, index)) = cursor else {
                loc.offset = loc.seg_len;
                return;
            };
            let b = self.nodes.get(branch);
            if index + 1 < b.len() {
                self.descend_first_into(b.child(index + 1), level - 1, loc);
                return;
            }
            cursor = b.parent();
            level += 1;
        }
    }

    /// Steps to the previous position; the end locator steps into the last
    /// element. Walking before the first position is a caller bug.
    pub(crate) fn move_prev(&self, loc: &mut Locator) {
        loc.pos = loc.pos.wrapping_sub(1);
        if loc.offset != 0 {
            loc.offset -= 1;
            return;
        }
        self.enter_prev_segment(loc);
    }

    fn enter_prev_segment(&self, loc: &mut Locator) {
        let Some(leaf) = loc.leaf else {
            panic!("`RawSeqTree` - walked before the first element!");
        };
        let node = self.nodes.get(leaf);
        if loc.leaf_slot != 0 {
            let slot = loc.leaf_slot - 1;
            loc.leaf_slot = slot;
            loc.segment = Some(node.child(slot));
            loc.seg_len = node.size(slot);
            loc.offset = loc.seg_len - 1;
            return;
        }
        let mut cursor = node.parent();
        let mut level = 2;
        loop {
            let Some((branch, index)) = cursor else {
                panic!("`RawSeqTree` - walked before the first element!");
            };
            let b = self.nodes.get(branch);
            if index != 0 {
                self.descend_last_into(b.child(index - 1), level - 1, loc);
                return;
            }
            cursor = b.parent();
            level += 1;
        }
    }

    /// Jumps `count` positions forward in O(log count), skipping whole
    /// subtrees via the child-size arrays. Landing on `len` yields the end
    /// locator; going past it is a caller bug.
    pub(crate) fn seek_forward(&self, loc: &mut Locator, count: usize) {
        loc.pos += count;
        let offset = loc.offset + count;
        if offset < loc.seg_len {
            loc.offset = offset;
            return;
        }
        let Some(leaf) = loc.leaf else {
            debug_assert!(offset == loc.seg_len, "`RawSeqTree::seek_forward()` - seek past the end!");
            loc.offset = loc.seg_len;
            return;
        };
        self.seek_forward_leaf(leaf, loc.leaf_slot, offset - loc.seg_len, loc);
    }

    fn seek_forward_leaf(&self, leaf: Handle, slot: usize, mut count: usize, loc: &mut Locator) {
        let node = self.nodes.get(leaf);
        let mut index = slot;
        loop {
            index += 1;
            if index == node.len() {
                break;
            }
            let size = node.size(index);
            if count < size {
                loc.leaf = Some(leaf);
                loc.leaf_slot = index;
                loc.segment = Some(node.child(index));
                loc.seg_len = size;
                loc.offset = count;
                return;
            }
            count -= size;
        }
        match node.parent() {
            None => {
                debug_assert!(count == 0, "`RawSeqTree::seek_forward()` - seek past the end!");
                let slot = node.len() - 1;
                loc.leaf = Some(leaf);
                loc.leaf_slot = slot;
                loc.segment = Some(node.child(slot));
                loc.seg_len = node.size(slot);
                loc.offset = loc.seg_len;
            }
            Some((branch, index)) => self.seek_forward_branch(branch, index, count, loc),
        }
    }

    fn seek_forward_branch(&self, mut branch: Handle, mut index: usize, mut count: usize, loc: &mut Locator) {
        let mut level = 2;
        loop {
            let node = self.nodes.get(branch);
            loop {
                index += 1;
                if index == node.len() {
                    break;
                }
                let size = node.size(index);
                if count < size {
                    self.descend_index_into(node.child(index), level - 1, count, loc);
                    return;
                }
                count -= size;
            }
            match node.parent() {
                None => {
                    debug_assert!(count == 0, "`RawSeqTree::seek_forward()` - seek past the end!");
                    self.descend_end_into(branch, level, loc);
                    return;
                }
                Some((parent, parent_index)) => {
                    branch = parent;
                    index = parent_index;
                    level += 1;
                }
            }
        }
    }

    /// Jumps `count` positions backward in O(log count). Walking before the
    /// first position is a caller bug.
    pub(crate) fn seek_backward(&self, loc: &mut Locator, count: usize) {
        loc.pos = loc.pos.wrapping_sub(count);
        if loc.offset >= count {
            loc.offset -= count;
            return;
        }
        let Some(leaf) = loc.leaf else {
            panic!("`RawSeqTree` - walked before the first element!");
        };
        self.seek_backward_leaf(leaf, loc.leaf_slot, count - loc.offset, loc);
    }

    fn seek_backward_leaf(&self, leaf: Handle, slot: usize, mut count: usize, loc: &mut Locator) {
        let node = self.nodes.get(leaf);
        let mut index = slot;
        while index != 0 {
            index -= 1;
            let size = node.size(index);
            if count <= size {
                loc.leaf = Some(leaf);
                loc.leaf_slot = index;
                loc.segment = Some(node.child(index));
                loc.seg_len = size;
                loc.offset = size - count;
                return;
            }
            count -= size;
        }
        match node.parent() {
            None => panic!("`RawSeqTree` - walked before the first element!"),
            Some((branch, index)) => self.seek_backward_branch(branch, index, count, loc),
        }
    }

    fn seek_backward_branch(&self, mut branch: Handle, mut index: usize, mut count: usize, loc: &mut Locator) {
        let mut level = 2;
        loop {
            let node = self.nodes.get(branch);
            while index != 0 {
                index -= 1;
                let size = node.size(index);
                if count <= size {
                    self.descend_index_into(node.child(index), level - 1, size - count, loc);
                    return;
                }
                count -= size;
            }
            match node.parent() {
                None => panic!("`RawSeqTree` - walked before the first element!"),
                Some((parent, parent_index)) => {
                    branch = parent;
                    index = parent_index;
                    level += 1;
                }
            }
        }
    }

    /// Jumps to `count` positions past the start of the next segment
    /// (`count == 0` is its first element) in amortized O(1).
    pub(crate) fn move_after_segment(&self, loc: &mut Locator, count: usize) {
        loc.pos += loc.seg_len - loc.offset + count;
        let Some(leaf) = loc.leaf else {
            debug_assert!(count == 0, "`RawSeqTree::move_after_segment()` - seek past the end!");
            loc.offset = loc.seg_len;
            return;
        };
        self.seek_forward_leaf(leaf, loc.leaf_slot, count, loc);
    }

    /// Jumps to `count` positions before the end of the previous segment
    /// (`count == 1` is its last element).
    pub(crate) fn move_before_segment(&self, loc: &mut Locator, count: usize) {
        debug_assert!(count != 0, "`RawSeqTree::move_before_segment()` - `count` must be nonzero!");
        loc.pos = loc.pos.wrapping_sub(loc.offset + count);
        let Some(leaf) = loc.leaf else {
            panic!("`RawSeqTree` - walked before the first element!");
        };
        self.seek_backward_leaf(leaf, loc.leaf_slot, count, loc);
    }

    // ─── Size propagation ────────────────────────────────────────────────

    /// Adds `delta` to the subtree size at `from` and every ancestor slot
    /// above it, then to the container length.
    fn apply_size_delta(&mut self, from: Option<(Handle, usize)>, delta: isize) {
        let mut cursor = from;
        while let Some((node, index)) = cursor {
            let n = self.nodes.get_mut(node);
            n.adjust_size(index, delta);
            cursor = n.parent();
        }
        self.len = self.len.wrapping_add_signed(delta);
    }

    /// Rewrites the back-links of every child of `branch` from slot `from`
    /// on. Only meaningful where children are nodes.
    fn refresh_backlinks(&mut self, branch: Handle, from: usize) {
        for index in from..self.nodes.get(branch).len() {
            let child = self.nodes.get(branch).child(index);
            self.nodes.get_mut(child).set_parent(Some(branch), index);
        }
    }
}

impl<T> RawSeqTree<T> {
    // ─── Insert engine ───────────────────────────────────────────────────

    /// Inserts `value` at `loc` and returns a locator for the new element.
    pub(crate) fn insert(&mut self, mut loc: Locator, value: T) -> Locator {
        debug_assert!(loc.pos <= self.len, "`RawSeqTree::insert()` - locator out of range!");
        let Some(segment) = loc.segment else {
            // First element: a fresh segment becomes the root.
            let mut seg = Segment::new();
            seg.push(value);
            let handle = self.segments.alloc(seg);
            self.root = Root::Segment(handle);
            self.height = 1;
            self.len = 1;
            return Locator {
                segment: Some(handle),
                offset: 0,
                seg_len: 1,
                leaf: None,
                leaf_slot: 0,
                pos: 0,
            };
        };

        if loc.seg_len < Segment::<T>::MAX {
            self.segments.get_mut(segment).insert(loc.offset, value);
            loc.seg_len += 1;
            let from = loc.leaf.map(|leaf| (leaf, loc.leaf_slot));
            self.apply_size_delta(from, 1);
            return loc;
        }

        self.split_insert(loc, segment, value)
    }

    /// The full-segment path: pre-allocate the whole chain, split, then
    /// cascade the new slot upward.
    fn split_insert(&mut self, mut loc: Locator, segment: Handle, value: T) -> Locator {
        // Acquire everything the cascade can consume before mutating, so the
        // structural changes below run without interruption.
        let mut chain = self.reserve_chain(loc.leaf);
        let right = self.segments.alloc(Segment::new());

        let slot = loc.leaf_slot;
        let right_len;
        {
            let (left_seg, right_seg) = self.segments.get2_mut(segment, right);
            left_seg.split_insert(loc.offset, value, right_seg);
            let left_len = left_seg.len();
            right_len = right_seg.len();

            if loc.offset < left_len {
                loc.seg_len = left_len;
            } else {
                loc.segment = Some(right);
                loc.offset -= left_len;
                loc.seg_len = right_len;
                loc.leaf_slot += 1;
            }
        }

        self.insert_slot_leaf(loc.leaf, slot + 1, right, right_len, &mut chain, &mut loc);
        debug_assert!(chain.is_empty(), "`RawSeqTree::split_insert()` - chain not fully consumed!");
        loc
    }

    /// Pre-allocates one node per full ancestor of `leaf` plus one for a
    /// possible new root: everything a split cascade can consume. Count
    /// aside, the nodes are interchangeable blanks.
    fn reserve_chain(&mut self, leaf: Option<Handle>) -> SmallVec<[Handle; 8]> {
        let mut chain = SmallVec::new();
        let Some(leaf) = leaf else {
            // Root segment split: one node to become the first leaf.
            chain.push(self.nodes.alloc(Node::new()));
            return chain;
        };
        if self.nodes.get(leaf).len() < BASE_MAX {
            return chain;
        }
        chain.push(self.nodes.alloc(Node::new()));
        let mut cursor = self.nodes.get(leaf).parent();
        loop {
            match cursor {
                None => {
                    chain.push(self.nodes.alloc(Node::new()));
                    return chain;
                }
                Some((branch, _)) => {
                    if self.nodes.get(branch).len() < BASE_MAX {
                        return chain;
                    }
                    chain.push(self.nodes.alloc(Node::new()));
                    cursor = self.nodes.get(branch).parent();
                }
            }
        }
    }

    /// Inserts the slot for a freshly split-off segment into its leaf,
    /// splitting the leaf itself if full.
    #[allow(clippy::cast_possible_wrap)]
    fn insert_slot_leaf(
        &mut self,
        leaf: Option<Handle>,
        index: usize,
        child: Handle,
        child_size: usize,
        chain: &mut SmallVec<[Handle; 8]>,
        loc: &mut Locator,
    ) {
        let Some(leaf) = leaf else {
            // The root segment split: a fresh leaf takes over as root.
            let handle = chain.pop().expect("`RawSeqTree` - split chain exhausted!");
            let Root::Segment(first) = self.root else {
                panic!("`RawSeqTree` - root segment split without a segment root!");
            };
            let first_size = self.len + 1 - child_size;
            let node = self.nodes.get_mut(handle);
            node.set_parent(None, 0);
            node.push_slot(first, first_size);
            node.push_slot(child, child_size);
            self.root = Root::Node(handle);
            self.height += 1;
            self.len += 1;
            loc.leaf = Some(handle);
            return;
        };

        // The slot left of the insertion just shrank to the split point.
        let left_child = self.nodes.get(leaf).child(index - 1);
        let left_len = self.segments.get(left_child).len();
        self.nodes.get_mut(leaf).set_size(index - 1, left_len);

        if self.nodes.get(leaf).len() < BASE_MAX {
            self.nodes.get_mut(leaf).insert_slot(index, child, child_size);
            let from = self.nodes.get(leaf).parent();
            self.apply_size_delta(from, 1);
            return;
        }

        // Overfill, then carve off the upper half into a chain node.
        self.nodes.get_mut(leaf).insert_slot(index, child, child_size);
        let right = chain.pop().expect("`RawSeqTree` - split chain exhausted!");
        let keep = (BASE_MAX + 1) / 2;
        let moved = {
            let (left, right_node) = self.nodes.get2_mut(leaf, right);
            left.split_to(keep, right_node)
        };
        if loc.leaf_slot >= keep {
            loc.leaf = Some(right);
            loc.leaf_slot -= keep;
        }
        let at = self.nodes.get(leaf).parent();
        self.insert_slot_branch(at, right, moved, chain);
    }

    /// Inserts a slot for a freshly split-off node into the branch level
    /// above it, cascading while ancestors are full.
    #[allow(clippy::cast_possible_wrap)]
    fn insert_slot_branch(
        &mut self,
        mut at: Option<(Handle, usize)>,
        mut child: Handle,
        mut child_size: usize,
        chain: &mut SmallVec<[Handle; 8]>,
    ) {
        loop {
            let Some((branch, below)) = at else {
                // The split reached the root: the last chain node caps the tree.
                let handle = chain.pop().expect("`RawSeqTree` - split chain exhausted!");
                let Root::Node(old) = self.root else {
                    panic!("`RawSeqTree` - branch split without a node root!");
                };
                let old_size = self.len + 1 - child_size;
                {
                    let node = self.nodes.get_mut(handle);
                    node.set_parent(None, 0);
                    node.push_slot(old, old_size);
                    node.push_slot(child, child_size);
                }
                self.nodes.get_mut(old).set_parent(Some(handle), 0);
                self.nodes.get_mut(child).set_parent(Some(handle), 1);
                self.root = Root::Node(handle);
                self.height += 1;
                self.len += 1;
                return;
            };

            let index = below + 1;
            // The child we ascended from kept only the lower half of its
            // size; the +1 for the new element is folded in here.
            self.nodes.get_mut(branch).adjust_size(below, 1 - child_size as isize);

            if self.nodes.get(branch).len() < BASE_MAX {
                self.nodes.get_mut(branch).insert_slot(index, child, child_size);
                self.refresh_backlinks(branch, index);
                let from = self.nodes.get(branch).parent();
                self.apply_size_delta(from, 1);
                return;
            }

            // Overfill, split, and carry the new right sibling upward.
            self.nodes.get_mut(branch).insert_slot(index, child, child_size);
            let right = chain.pop().expect("`RawSeqTree` - split chain exhausted!");
            let keep = (BASE_MAX + 1) / 2;
            let moved = {
                let (left, right_node) = self.nodes.get2_mut(branch, right);
                left.split_to(keep, right_node)
            };
            if index < keep {
                self.refresh_backlinks(branch, index);
            }
            self.refresh_backlinks(right, 0);

            at = self.nodes.get(branch).parent();
            child = right;
            child_size = moved;
        }
    }

    // ─── Erase engine ────────────────────────────────────────────────────

    /// Removes the element at `loc`, returning it together with a locator
    /// for what used to be the following position (end if none). Never
    /// allocates.
    pub(crate) fn erase(&mut self, mut loc: Locator) -> (T, Locator) {
        debug_assert!(loc.pos < self.len, "`RawSeqTree::erase()` - locator out of range!");
        debug_assert!(!loc.is_end(), "`RawSeqTree::erase()` - erase at the end locator!");
        let segment = loc.segment.expect("`RawSeqTree::erase()` - erase at an empty-tree locator!");

        let value = self.erase_element(&mut loc, segment);
        // The gap closed over the following element unless the erased one
        // was the last of its segment.
        if loc.is_end() {
            self.enter_next_segment(&mut loc);
        }
        (value, loc)
    }

    #[allow(clippy::cast_possible_wrap)]
    fn erase_element(&mut self, loc: &mut Locator, segment: Handle) -> T {
        // Last element of a height-1 tree: the root segment goes away too.
        // The segment is released before the root field is rewritten.
        if loc.seg_len == 1 && loc.leaf.is_none() {
            let mut seg = self.segments.take(segment);
            let value = seg.remove(0);
            self.root = Root::Empty;
            self.height = 0;
            self.len = 0;
            *loc = Locator::empty();
            return value;
        }

        let was = loc.seg_len;
        let value = self.segments.get_mut(segment).remove(loc.offset);
        loc.seg_len -= 1;

        let Some(leaf) = loc.leaf else {
            // Root segment with room to spare.
            self.len -= 1;
            return value;
        };

        if was != Segment::<T>::MIN {
            self.apply_size_delta(Some((leaf, loc.leaf_slot)), -1);
            return value;
        }

        // The segment dropped below minimum: rotate from a neighbour or
        // merge with one, preferring the left neighbour.
        let slot = loc.leaf_slot;
        if slot != 0 {
            let prev = self.nodes.get(leaf).child(slot - 1);
            let prev_len = self.segments.get(prev).len();
            if prev_len != Segment::<T>::MIN {
                // Rotate the left neighbour's last element across.
                let shifted = self.segments.get_mut(prev).pop();
                self.segments.get_mut(segment).insert(0, shifted);
                self.nodes.get_mut(leaf).set_size(slot - 1, prev_len - 1);
                loc.offset += 1;
                loc.seg_len += 1;
                self.apply_size_delta(self.nodes.get(leaf).parent(), -1);
                return value;
            }
            // Merge this segment into its left neighbour.
            {
                let (prev_seg, seg) = self.segments.get2_mut(prev, segment);
                prev_seg.append(seg);
            }
            let merged = self.segments.get(prev).len();
            self.nodes.get_mut(leaf).set_size(slot - 1, merged);
            loc.segment = Some(prev);
            loc.offset += prev_len;
            loc.seg_len = merged;
            loc.leaf_slot = slot - 1;
            self.remove_slot_leaf(loc, leaf, slot);
            return value;
        }

        // No left neighbour: lean on the right one.
        let next = self.nodes.get(leaf).child(slot + 1);
        let next_len = self.segments.get(next).len();
        if next_len != Segment::<T>::MIN {
            let shifted = self.segments.get_mut(next).remove(0);
            self.segments.get_mut(segment).push(shifted);
            self.nodes.get_mut(leaf).set_size(slot + 1, next_len - 1);
            loc.seg_len += 1;
            self.apply_size_delta(self.nodes.get(leaf).parent(), -1);
            return value;
        }
        // Merge the right neighbour into this segment.
        {
            let (seg, next_seg) = self.segments.get2_mut(segment, next);
            seg.append(next_seg);
        }
        let merged = self.segments.get(segment).len();
        self.nodes.get_mut(leaf).set_size(slot, merged);
        loc.seg_len = merged;
        self.remove_slot_leaf(loc, leaf, slot + 1);
        value
    }

    /// Removes slot `index` from `leaf`. The slot's segment has already been
    /// emptied into a sibling; every other size at this level is correct and
    /// the erased element's -1 is still pending above this level.
    fn remove_slot_leaf(&mut self, loc: &mut Locator, leaf: Handle, index: usize) {
        self.segments.free(self.nodes.get(leaf).child(index));
        let len = self.nodes.get(leaf).len();

        match self.nodes.get(leaf).parent() {
            None => {
                if len == 2 {
                    // The root leaf is down to one segment: drop a level.
                    let other = self.nodes.get(leaf).child(index ^ 1);
                    self.nodes.free(leaf);
                    self.root = Root::Segment(other);
                    self.height -= 1;
                    self.len -= 1;
                    loc.leaf = None;
                    loc.leaf_slot = 0;
                } else {
                    self.nodes.get_mut(leaf).remove_slot(index);
                    self.len -= 1;
                }
            }
            Some(parent) => {
                if len != BASE_MIN {
                    self.nodes.get_mut(leaf).remove_slot(index);
                    self.apply_size_delta(Some(parent), -1);
                } else {
                    self.rebalance_leaf(loc, leaf, index, parent.0, parent.1);
                }
            }
        }
    }

    /// Restores a leaf that would underflow once slot `index` is removed,
    /// by borrowing a slot from a sibling leaf or merging with one.
    #[allow(clippy::cast_possible_wrap)]
    fn rebalance_leaf(&mut self, loc: &mut Locator, leaf: Handle, index: usize, parent: Handle, pindex: usize) {
        if pindex != 0 {
            let prev = self.nodes.get(parent).child(pindex - 1);
            if self.nodes.get(prev).len() != BASE_MIN {
                // Borrow the left sibling's last slot.
                self.nodes.get_mut(leaf).remove_slot(index);
                let (child, size) = self.nodes.get_mut(prev).pop_slot();
                self.nodes.get_mut(leaf).push_front_slot(child, size);
                {
                    let p = self.nodes.get_mut(parent);
                    p.adjust_size(pindex - 1, -(size as isize));
                    p.adjust_size(pindex, size as isize - 1);
                }
                // Every surviving slot of this leaf moved one to the right.
                loc.leaf_slot += 1;
                self.apply_size_delta(self.nodes.get(parent).parent(), -1);
                return;
            }
            // Merge this leaf into the left sibling.
            self.nodes.get_mut(leaf).remove_slot(index);
            let start = self.nodes.get(prev).len();
            let moved = {
                let (prev_node, leaf_node) = self.nodes.get2_mut(prev, leaf);
                prev_node.append_from(leaf_node)
            };
            self.nodes.get_mut(parent).adjust_size(pindex - 1, moved as isize);
            loc.leaf = Some(prev);
            loc.leaf_slot += start;
            self.remove_slot_branch(parent, pindex);
            return;
        }

        let next = self.nodes.get(parent).child(pindex + 1);
        if self.nodes.get(next).len() != BASE_MIN {
            // Borrow the right sibling's first slot.
            self.nodes.get_mut(leaf).remove_slot(index);
            let (child, size) = self.nodes.get_mut(next).pop_front_slot();
            self.nodes.get_mut(leaf).push_slot(child, size);
            {
                let p = self.nodes.get_mut(parent);
                p.adjust_size(pindex + 1, -(size as isize));
                p.adjust_size(pindex, size as isize - 1);
            }
            self.apply_size_delta(self.nodes.get(parent).parent(), -1);
            return;
        }
        // Merge the right sibling into this leaf.
        self.nodes.get_mut(leaf).remove_slot(index);
        let moved = {
            let (leaf_node, next_node) = self.nodes.get2_mut(leaf, next);
            leaf_node.append_from(next_node)
        };
        self.nodes.get_mut(parent).adjust_size(pindex, moved as isize - 1);
        self.remove_slot_branch(parent, pindex + 1);
    }

    /// Removes slot `index` from the branch `branch` under the same contract
    /// as `remove_slot_leaf`, cascading rotate-or-merge up the spine.
    #[allow(clippy::cast_possible_wrap)]
    fn remove_slot_branch(&mut self, mut branch: Handle, mut index: usize) {
        loop {
            self.nodes.free(self.nodes.get(branch).child(index));
            let len = self.nodes.get(branch).len();

            match self.nodes.get(branch).parent() {
                None => {
                    if len == 2 {
                        // The root is down to one child: drop a level.
                        let other = self.nodes.get(branch).child(index ^ 1);
                        self.nodes.free(branch);
                        self.nodes.get_mut(other).set_parent(None, 0);
                        self.root = Root::Node(other);
                        self.height -= 1;
                        self.len -= 1;
                    } else {
                        self.nodes.get_mut(branch).remove_slot(index);
                        self.refresh_backlinks(branch, index);
                        self.len -= 1;
                    }
                    return;
                }
                Some((parent, pindex)) => {
                    if len != BASE_MIN {
                        self.nodes.get_mut(branch).remove_slot(index);
                        self.refresh_backlinks(branch, index);
                        self.apply_size_delta(Some((parent, pindex)), -1);
                        return;
                    }

                    if pindex != 0 {
                        let prev = self.nodes.get(parent).child(pindex - 1);
                        if self.nodes.get(prev).len() != BASE_MIN {
                            // Borrow the left sibling's last subtree.
                            self.nodes.get_mut(branch).remove_slot(index);
                            let (child, size) = self.nodes.get_mut(prev).pop_slot();
                            self.nodes.get_mut(branch).push_front_slot(child, size);
                            self.refresh_backlinks(branch, 0);
                            {
                                let p = self.nodes.get_mut(parent);
                                p.adjust_size(pindex - 1, -(size as isize));
                                p.adjust_size(pindex, size as isize - 1);
                            }
                            self.apply_size_delta(self.nodes.get(parent).parent(), -1);
                            return;
                        }
                        // Merge this branch into the left sibling.
                        self.nodes.get_mut(branch).remove_slot(index);
                        let start = self.nodes.get(prev).len();
                        let moved = {
                            let (prev_node, branch_node) = self.nodes.get2_mut(prev, branch);
                            prev_node.append_from(branch_node)
                        };
                        self.refresh_backlinks(prev, start);
                        self.nodes.get_mut(parent).adjust_size(pindex - 1, moved as isize);
                        branch = parent;
                        index = pindex;
                        continue;
                    }

                    let next = self.nodes.get(parent).child(pindex + 1);
                    if self.nodes.get(next).len() != BASE_MIN {
                        // Borrow the right sibling's first subtree.
                        self.nodes.get_mut(branch).remove_slot(index);
                        let (child, size) = self.nodes.get_mut(next).pop_front_slot();
                        self.nodes.get_mut(branch).push_slot(child, size);
                        self.refresh_backlinks(branch, index);
                        self.refresh_backlinks(next, 0);
                        {
                            let p = self.nodes.get_mut(parent);
                            p.adjust_size(pindex + 1, -(size as isize));
                            p.adjust_size(pindex, size as isize - 1);
                        }
                        self.apply_size_delta(self.nodes.get(parent).parent(), -1);
                        return;
                    }
                    // Merge the right sibling into this branch.
                    self.nodes.get_mut(branch).remove_slot(index);
                    let moved = {
                        let (branch_node, next_node) = self.nodes.get2_mut(branch, next);
                        branch_node.append_from(next_node)
                    };
                    self.refresh_backlinks(branch, index);
                    self.nodes.get_mut(parent).adjust_size(pindex, moved as isize - 1);
                    branch = parent;
                    index = pindex + 1;
                }
            }
        }
    }

    // ─── Bulk teardown ───────────────────────────────────────────────────

    /// Drains every element in order by walking the leaves left to right.
    /// O(n), with no rebalancing.
    pub(crate) fn drain_to_vec(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len);
        match self.root {
            Root::Empty => {}
            Root::Segment(segment) => self.segments.get_mut(segment).drain_into(&mut out),
            Root::Node(root) => {
                let mut stack: Vec<(Handle, usize)> = alloc::vec![(root, self.height - 1)];
                while let Some((node, level)) = stack.pop() {
                    if level == 1 {
                        for index in 0..self.nodes.get(node).len() {
                            let segment = self.nodes.get(node).child(index);
                            self.segments.get_mut(segment).drain_into(&mut out);
                        }
                    } else {
                        // Push right to left so leaves drain left to right.
                        for index in (0..self.nodes.get(node).len()).rev() {
                            let child = self.nodes.get(node).child(index);
                            stack.push((child, level - 1));
                        }
                    }
                }
            }
        }
        self.segments.clear();
        self.nodes.clear();
        self.root = Root::Empty;
        self.height = 0;
        self.len = 0;
        out
    }
}

impl<T: Clone> Clone for RawSeqTree<T> {
    fn clone(&self) -> Self {
        fn clone_node<T: Clone>(
            source: &RawSeqTree<T>,
            nodes: &mut Arena<Node>,
            segments: &mut Arena<Segment<T>>,
            node: Handle,
            level: usize,
        ) -> Handle {
            let mut copy = Node::new();
            if level == 1 {
                let n = source.nodes.get(node);
                for index in 0..n.len() {
                    let segment = segments.alloc(source.segments.get(n.child(index)).cloned());
                    copy.push_slot(segment, n.size(index));
                }
                nodes.alloc(copy)
            } else {
                for index in 0..source.nodes.get(node).len() {
                    let (child, size) = {
                        let n = source.nodes.get(node);
                        (n.child(index), n.size(index))
                    };
                    let cloned = clone_node(source, nodes, segments, child, level - 1);
                    copy.push_slot(cloned, size);
                }
                let handle = nodes.alloc(copy);
                for index in 0..nodes.get(handle).len() {
                    let child = nodes.get(handle).child(index);
                    nodes.get_mut(child).set_parent(Some(handle), index);
                }
                handle
            }
        }

        match self.root {
            Root::Empty => Self::new(),
            Root::Segment(segment) => {
                let mut segments = Arena::new();
                let handle = segments.alloc(self.segments.get(segment).cloned());
                Self {
                    segments,
                    nodes: Arena::new(),
                    root: Root::Segment(handle),
                    height: self.height,
                    len: self.len,
                }
            }
            Root::Node(root) => {
                let mut nodes = Arena::new();
                let mut segments = Arena::new();
                let handle = clone_node(self, &mut nodes, &mut segments, root, self.height - 1);
                Self {
                    segments,
                    nodes,
                    root: Root::Node(handle),
                    height: self.height,
                    len: self.len,
                }
            }
        }
    }
}


#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
impl<T> RawSeqTree<T> {
    /// Validates every structural invariant. Panics with a description of
    /// each violation. Test-only: used to catch corruption after mutations.
    pub(crate) fn validate_invariants(&self) {
        use alloc::format;
        use alloc::string::String;

        let mut errors: Vec<String> = Vec::new();
        match self.root {
            Root::Empty => {
                if self.height != 0 {
                    errors.push(format!("empty tree with height {}", self.height));
                }
                if self.len != 0 {
                    errors.push(format!("empty tree with len {}", self.len));
                }
            }
            Root::Segment(segment) => {
                if self.height != 1 {
                    errors.push(format!("segment root with height {}", self.height));
                }
                let seg_len = self.segments.get(segment).len();
                if seg_len != self.len {
                    errors.push(format!("len mismatch: len={}, root segment holds {seg_len}", self.len));
                }
                if seg_len == 0 || seg_len > Segment::<T>::MAX {
                    errors.push(format!("root segment occupancy {seg_len} outside 1..={}", Segment::<T>::MAX));
                }
            }
            Root::Node(root) => {
                if self.height < 2 {
                    errors.push(format!("node root with height {}", self.height));
                }
                if self.nodes.get(root).parent().is_some() {
                    errors.push("root node has a parent link".into());
                }
                let total = self.validate_node(root, self.height - 1, true, &mut errors);
                if total != self.len {
                    errors.push(format!("len mismatch: len={}, tree holds {total}", self.len));
                }
            }
        }

        // Every arena slot must be reachable from the root: anything else is
        // a leaked or double-freed handle.
        let (node_count, segment_count) = self.reachable_counts();
        if node_count != self.nodes.len() {
            errors.push(format!("node arena holds {} slots, {} reachable", self.nodes.len(), node_count));
        }
        if segment_count != self.segments.len() {
            errors.push(format!("segment arena holds {} slots, {} reachable", self.segments.len(), segment_count));
        }

        assert!(errors.is_empty(), "tree invariant violations:\n{}", errors.join("\n"));
    }

    fn reachable_counts(&self) -> (usize, usize) {
        let (mut nodes, mut segments) = (0, 0);
        match self.root {
            Root::Empty => {}
            Root::Segment(_) => segments = 1,
            Root::Node(root) => {
                let mut stack: Vec<(Handle, usize)> = alloc::vec![(root, self.height - 1)];
                while let Some((node, level)) = stack.pop() {
                    nodes += 1;
                    let n = self.nodes.get(node);
                    if level == 1 {
                        segments += n.len();
                    } else {
                        for index in 0..n.len() {
                            stack.push((n.child(index), level - 1));
                        }
                    }
                }
            }
        }
        (nodes, segments)
    }

    fn validate_node(
        &self,
        node: Handle,
        level: usize,
        is_root: bool,
        errors: &mut Vec<alloc::string::String>,
    ) -> usize {
        use alloc::format;

        let n = self.nodes.get(node);
        let min = if is_root { 2 } else { BASE_MIN };
        if n.len() < min || n.len() > BASE_MAX {
            errors.push(format!(
                "node {node:?} occupancy {} outside {min}..={BASE_MAX} (root: {is_root})",
                n.len()
            ));
        }

        let mut total = 0;
        for index in 0..n.len() {
            let recorded = n.size(index);
            let actual = if level == 1 {
                let segment = self.segments.get(n.child(index));
                if segment.len() < Segment::<T>::MIN || segment.len() > Segment::<T>::MAX {
                    errors.push(format!(
                        "segment {:?} occupancy {} outside {}..={}",
                        n.child(index),
                        segment.len(),
                        Segment::<T>::MIN,
                        Segment::<T>::MAX
                    ));
                }
                segment.len()
            } else {
                let child = n.child(index);
                if self.nodes.get(child).parent() != Some((node, index)) {
                    errors.push(format!(
                        "child {child:?} of {node:?} slot {index} has back-link {:?}",
                        self.nodes.get(child).parent()
                    ));
                }
                self.validate_node(child, level - 1, false, errors)
            };
            if recorded != actual {
                errors.push(format!(
                    "size mismatch at {node:?} slot {index}: recorded {recorded}, actual {actual}"
                ));
            }
            total += actual;
        }
        total
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(clippy::cast_possible_truncation)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn push_back(tree: &mut RawSeqTree<u64>, value: u64) {
        let end = tree.locate_end();
        tree.insert(end, value);
    }

    fn from_values(values: &[u64]) -> RawSeqTree<u64> {
        let mut tree = RawSeqTree::new();
        for &value in values {
            push_back(&mut tree, value);
        }
        tree
    }

    fn contents(tree: &RawSeqTree<u64>) -> Vec<u64> {
        let mut out = Vec::with_capacity(tree.len());
        let mut loc = tree.locate_first();
        for _ in 0..tree.len() {
            out.push(*tree.element(&loc));
            tree.move_next(&mut loc);
        }
        out
    }

    #[test]
    fn empty_tree() {
        let tree: RawSeqTree<u64> = RawSeqTree::new();
        tree.validate_invariants();
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.height(), 0);
        assert!(tree.locate_end().is_end());
        assert!(tree.locate(0).is_end());
    }

    #[test]
    fn prepends_read_back_reversed() {
        let mut tree: RawSeqTree<u64> = RawSeqTree::new();
        for value in 0..10 {
            let first = tree.locate_first();
            tree.insert(first, value);
            tree.validate_invariants();
        }
        assert_eq!(contents(&tree), [9, 8, 7, 6, 5, 4, 3, 2, 1, 0]);
    }

    #[test]
    fn erase_sequence() {
        let mut tree = from_values(&[0, 1, 2, 3, 4]);

        let steps: [(usize, &[u64]); 5] = [
            (2, &[0, 1, 3, 4]),
            (0, &[1, 3, 4]),
            (2, &[1, 3]),
            (1, &[1]),
            (0, &[]),
        ];
        for (index, expected) in steps {
            tree.erase(tree.locate(index));
            tree.validate_invariants();
            assert_eq!(contents(&tree), expected);
        }
        assert_eq!(tree.height(), 0);
    }

    #[test]
    fn insert_into_gap() {
        let mut tree = from_values(&[0, 1, 2, 4]);
        let loc = tree.insert(tree.locate(3), 3);
        assert_eq!(loc.pos, 3);
        assert_eq!(*tree.element(&loc), 3);
        tree.validate_invariants();
        assert_eq!(contents(&tree), [0, 1, 2, 3, 4]);
    }

    #[test]
    fn height_transitions_at_segment_boundary() {
        // Segments of u64 hold 4 under the test byte target, so the fifth
        // append forces the first split.
        assert_eq!(Segment::<u64>::MAX, 4);

        let mut tree: RawSeqTree<u64> = RawSeqTree::new();
        for value in 0..4 {
            push_back(&mut tree, value);
            assert_eq!(tree.height(), 1);
        }
        push_back(&mut tree, 4);
        assert_eq!(tree.height(), 2);
        assert_eq!(contents(&tree), [0, 1, 2, 3, 4]);

        while tree.len() > 0 {
            tree.erase(tree.locate_first());
            tree.validate_invariants();
            assert_eq!(tree.height() == 0, tree.len() == 0);
        }
    }

    #[test]
    fn deep_tree_grows_and_shrinks() {
        let mut tree: RawSeqTree<u64> = RawSeqTree::new();
        for value in 0..2000 {
            push_back(&mut tree, value);
        }
        tree.validate_invariants();
        assert!(tree.height() >= 4, "height {} too small to exercise branches", tree.height());
        assert_eq!(contents(&tree), (0..2000).collect::<Vec<_>>());

        // Positional spot checks across the whole range.
        for index in (0..2000).step_by(97) {
            assert_eq!(*tree.element(&tree.locate(index)), index as u64);
        }

        let mut expected: Vec<u64> = (0..2000).collect();
        let mut state = 0x2545_f491_4f6c_dd1du64;
        while !expected.is_empty() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            let index = (state >> 33) as usize % expected.len();
            let (value, _) = tree.erase(tree.locate(index));
            assert_eq!(value, expected.remove(index));
            tree.validate_invariants();
        }
        assert_eq!(tree.height(), 0);
    }

    #[test]
    fn erase_returns_following_position() {
        let mut tree = from_values(&[10, 20, 30, 40, 50]);
        let (value, loc) = tree.erase(tree.locate(1));
        assert_eq!(value, 20);
        assert_eq!(loc.pos, 1);
        assert_eq!(*tree.element(&loc), 30);

        let (value, loc) = tree.erase(tree.locate(3));
        assert_eq!(value, 50);
        assert!(loc.is_end());
        assert_eq!(loc.pos, 3);
    }

    #[test]
    fn neighbour_walks_cover_the_sequence() {
        let tree = from_values(&(0..300).collect::<Vec<_>>());

        // Forward.
        let mut loc = tree.locate_first();
        for expected in 0..300u64 {
            assert_eq!(*tree.element(&loc), expected);
            tree.move_next(&mut loc);
        }
        assert!(loc.is_end());

        // Backward from end.
        let mut loc = tree.locate_end();
        for expected in (0..300u64).rev() {
            tree.move_prev(&mut loc);
            assert_eq!(*tree.element(&loc), expected);
        }
        assert_eq!(loc.pos, 0);
    }

    #[test]
    fn segment_jumps_tile_the_sequence() {
        let tree = from_values(&(0..257).collect::<Vec<_>>());

        let mut covered = 0;
        let mut loc = tree.locate_first();
        while !loc.is_end() {
            let slice = tree.segment_slice(&loc);
            assert_eq!(slice.len(), loc.seg_len);
            covered += slice.len();
            tree.move_after_segment(&mut loc, 0);
        }
        assert_eq!(covered, tree.len());
        assert_eq!(loc.pos, tree.len());

        // Jump back to the last element of the previous segment.
        let last_len = loc.seg_len;
        tree.move_before_segment(&mut loc, 1);
        assert_eq!(loc.offset, loc.seg_len - 1);
        assert_eq!(*tree.element(&loc), 256 - last_len as u64);
    }

    #[test]
    fn clone_preserves_structure_and_contents() {
        let tree = from_values(&(0..500).collect::<Vec<_>>());
        let copy = tree.clone();
        copy.validate_invariants();
        assert_eq!(copy.len(), tree.len());
        assert_eq!(copy.height(), tree.height());
        assert_eq!(contents(&copy), contents(&tree));
    }

    #[test]
    fn drain_returns_in_order_and_empties() {
        let mut tree = from_values(&(0..777).collect::<Vec<_>>());
        let drained = tree.drain_to_vec();
        assert_eq!(drained, (0..777).collect::<Vec<_>>());
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.height(), 0);
        tree.validate_invariants();
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(40))]

        #[test]
        fn random_ops_match_vec(operations in prop::collection::vec((any::<u8>(), any::<usize>(), any::<u64>()), 0..400)) {
            let mut tree: RawSeqTree<u64> = RawSeqTree::new();
            let mut model: Vec<u64> = Vec::new();

            for (kind, position, value) in operations {
                if kind % 4 != 0 || model.is_empty() {
                    let index = position % (model.len() + 1);
                    let loc = tree.insert(tree.locate(index), value);
                    prop_assert_eq!(loc.pos, index);
                    prop_assert_eq!(*tree.element(&loc), value);
                    model.insert(index, value);
                } else {
                    let index = position % model.len();
                    let (removed, _) = tree.erase(tree.locate(index));
                    prop_assert_eq!(removed, model.remove(index));
                }
                tree.validate_invariants();
                prop_assert_eq!(tree.len(), model.len());
            }
            prop_assert_eq!(contents(&tree), model);
        }

        #[test]
        fn insert_then_erase_is_identity(
            values in prop::collection::vec(any::<u64>(), 1..200),
            position in any::<usize>(),
            probe in any::<u64>(),
        ) {
            let mut tree = from_values(&values);
            let before = contents(&tree);
            let index = position % (values.len() + 1);

            tree.insert(tree.locate(index), probe);
            tree.validate_invariants();
            let (removed, _) = tree.erase(tree.locate(index));
            tree.validate_invariants();

            prop_assert_eq!(removed, probe);
            prop_assert_eq!(contents(&tree), before);
        }

        #[test]
        fn seeks_agree_with_direct_lookup(
            len in 1usize..600,
            from in any::<usize>(),
            to in any::<usize>(),
        ) {
            let tree = from_values(&(0..len as u64).collect::<Vec<_>>());
            let from = from % len;
            let to = to % len;

            let mut loc = tree.locate(from);
            if to >= from {
                tree.seek_forward(&mut loc, to - from);
            } else {
                tree.seek_backward(&mut loc, from - to);
            }

            prop_assert_eq!(loc.pos, to);
            prop_assert_eq!(*tree.element(&loc), to as u64);

            // Seeking to the end is also in contract.
            let mut loc = tree.locate(from);
            tree.seek_forward(&mut loc, len - from);
            prop_assert!(loc.is_end());
        }
    }
}
