mod arena;
mod node;
mod raw_seq_tree;
mod segment;

pub(crate) use arena::Handle;
pub(crate) use raw_seq_tree::{Locator, RawSeqTree};
pub(crate) use segment::Segment;
