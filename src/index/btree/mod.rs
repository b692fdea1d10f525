pub mod error;
pub mod header_directory;
pub mod index;
pub mod node;
pub mod serialization;

pub use error::BTreeError;
pub use header_directory::HeaderDirectory;
pub use index::{BPlusTree, BPlusTreeIterator};
pub use node::{BTreeNode, InternalNode, LeafNode};
pub use serialization::{deserialize_node, serialize_node};
