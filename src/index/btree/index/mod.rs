mod base;
mod deletion;
mod insertion;
mod iterator;

pub use base::BPlusTree;
pub use iterator::BPlusTreeIterator;
