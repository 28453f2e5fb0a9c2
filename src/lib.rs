//! A segmented counted B+tree sequence for Rust.
//!
//! This crate provides [`SeqTree`], an indexable random-access sequence that
//! supports insertion and removal at *any* position in O(log n) while keeping
//! iteration cache-friendly:
//!
//! - [`insert`](SeqTree::insert) / [`remove`](SeqTree::remove) - O(log n) at any index
//! - [`get`](SeqTree::get) and indexing by `usize` - O(log n) positional lookup
//! - [`iter`](SeqTree::iter) - amortized O(1) per element, walking contiguous segments
//!
//! # Example
//!
//! ```
//! use seqtree::SeqTree;
//!
//! let mut log: SeqTree<&str> = SeqTree::new();
//! log.push_back("open");
//! log.push_back("close");
//!
//! // Splice an entry into the middle without shifting the whole tail.
//! log.insert(1, "write");
//!
//! assert_eq!(log.len(), 3);
//! assert_eq!(log[1], "write");
//!
//! let entries: Vec<_> = log.iter().copied().collect();
//! assert_eq!(entries, ["open", "write", "close"]);
//! ```
//!
//! # Features
//!
//! - **`no_std` compatible** - Only requires `alloc`, no standard library dependency
//! - **O(log n) positional mutation** - Unlike `Vec` (O(n) shifts) or a linked
//!   list (O(n) seeks), both lookup and mutation are logarithmic
//! - **Cache-efficient traversal** - Elements live in contiguous segments;
//!   iterators only consult the tree at segment boundaries
//! - **Segment-aware cursors** - [`Cursor`](seq_tree::Cursor) exposes the
//!   current segment as a plain slice for tight inner loops
//!
//! # Implementation
//!
//! The sequence is a counted B+tree: leaves point to contiguous element
//! buffers ("segments") and every interior node stores the element count of
//! each child subtree, so a position maps to a segment in one root-to-leaf
//! descent. Nodes and segments live in handle-indexed arenas; parent links
//! are plain handles, which keeps the ownership graph acyclic.

#![no_std]
// These forbid rules and lint groups are meant to be very restrictive.
// NOTE: We have to allow unsafe code for the raw segment buffers and the mutable iterator.
// #![forbid(unsafe_code)]
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]
// Enable coverage attributes for nightly builds.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

mod raw;

pub mod seq_tree;

pub use seq_tree::{Cursor, Iter, IterMut, SeqTree};
