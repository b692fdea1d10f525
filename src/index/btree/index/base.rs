use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::Arc;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::common::types::{PageId, Rid, HEADER_PAGE_ID, INVALID_PAGE_ID};
use crate::index::btree::error::BTreeError;
use crate::index::btree::header_directory::{HeaderDirectory, MAX_NAME_LEN};
use crate::index::btree::node::BTreeNode;
use crate::index::btree::serialization::{deserialize_node, serialize_node};
use crate::storage::buffer::BufferPoolManager;

/// B+Tree index over the buffer pool. Keys are unique; the key's `Ord`
/// instance is the comparator. Named indexes persist their root page id in
/// the header directory on page 0, so an index can be reopened by name.
pub struct BPlusTree<K> {
    pub(crate) index_name: String,
    pub(crate) buffer_pool: Arc<BufferPoolManager>,
    pub(crate) root_page_id: Cell<PageId>,
    pub(crate) leaf_max_size: usize,
    pub(crate) internal_max_size: usize,
    pub(crate) _phantom: PhantomData<K>,
}

impl<K> BPlusTree<K>
where
    K: Clone + Ord + Serialize + DeserializeOwned + 'static,
{
    /// Open the index named `index_name`, adopting its recorded root if the
    /// header directory already knows it and registering it otherwise.
    pub fn new(
        index_name: impl Into<String>,
        buffer_pool: Arc<BufferPoolManager>,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self, BTreeError> {
        assert!(leaf_max_size >= 2, "a leaf must hold at least two entries");
        assert!(internal_max_size >= 2, "an internal node must hold at least two separators");

        let index_name = index_name.into();
        if index_name.len() > MAX_NAME_LEN {
            return Err(BTreeError::NameTooLong(index_name));
        }

        let header_page = buffer_pool.fetch_page(HEADER_PAGE_ID)?;
        let existing = {
            let page_guard = header_page.read();
            HeaderDirectory::get_root_page_id(&page_guard, &index_name)
        };

        let root_page_id = match existing {
            Some(root_page_id) => {
                buffer_pool.unpin_page(HEADER_PAGE_ID, false)?;
                root_page_id
            }
            None => {
                let inserted = {
                    let mut page_guard = header_page.write();
                    HeaderDirectory::insert_record(&mut page_guard, &index_name, INVALID_PAGE_ID)
                };
                buffer_pool.unpin_page(HEADER_PAGE_ID, true)?;
                if !inserted {
                    return Err(BTreeError::HeaderDirectoryFull);
                }
                INVALID_PAGE_ID
            }
        };

        Ok(Self {
            index_name,
            buffer_pool,
            root_page_id: Cell::new(root_page_id),
            leaf_max_size,
            internal_max_size,
            _phantom: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.index_name
    }

    pub fn is_empty(&self) -> bool {
        self.root_page_id.get() == INVALID_PAGE_ID
    }

    /// Get the current root page ID
    pub fn root_page_id(&self) -> PageId {
        self.root_page_id.get()
    }

    pub(crate) fn set_root_page_id(&self, page_id: PageId) {
        self.root_page_id.set(page_id);
    }

    /// Point query: the record id stored under `key`, if present
    pub fn get_value(&self, key: &K) -> Result<Option<Rid>, BTreeError> {
        if self.is_empty() {
            return Ok(None);
        }

        let leaf_page_id = self.find_leaf_page(Some(key))?;
        match self.read_node(leaf_page_id)? {
            BTreeNode::Leaf(leaf) => Ok(leaf.lookup(key)),
            BTreeNode::Internal(_) => Err(BTreeError::InvalidPageFormat),
        }
    }

    /// Descend from the root to the leaf that contains `key`, or to the
    /// leftmost leaf when no key is given. Each parent's pin is released
    /// before its child is fetched.
    pub(crate) fn find_leaf_page(&self, key: Option<&K>) -> Result<PageId, BTreeError> {
        debug_assert!(!self.is_empty(), "descending into an empty tree");
        let mut current_page_id = self.root_page_id.get();

        loop {
            match self.read_node(current_page_id)? {
                BTreeNode::Leaf(_) => return Ok(current_page_id),
                BTreeNode::Internal(node) => {
                    current_page_id = match key {
                        Some(key) => node.child_at(node.child_index(key)),
                        None => node.child_at(0),
                    };
                }
            }
        }
    }

    /// Fetch a page and decode it into its typed node view. Pin-neutral.
    pub(crate) fn read_node(&self, page_id: PageId) -> Result<BTreeNode<K>, BTreeError> {
        let page = self.buffer_pool.fetch_page(page_id)?;
        let node = {
            let page_guard = page.read();
            deserialize_node::<K>(&page_guard)
        };
        self.buffer_pool.unpin_page(page_id, false)?;
        node
    }

    /// Encode a node back into its page and mark it dirty. Pin-neutral.
    pub(crate) fn write_node(&self, node: &BTreeNode<K>) -> Result<(), BTreeError> {
        let page_id = node.page_id();
        let page = self.buffer_pool.fetch_page(page_id)?;
        let result = {
            let mut page_guard = page.write();
            serialize_node(node, &mut page_guard)
        };
        self.buffer_pool.unpin_page(page_id, true)?;
        result
    }

    /// Rewrite a node's parent back-pointer through the buffer pool
    pub(crate) fn set_parent(&self, page_id: PageId, parent_page_id: PageId) -> Result<(), BTreeError> {
        let mut node = self.read_node(page_id)?;
        node.set_parent_page_id(parent_page_id);
        self.write_node(&node)
    }

    /// Push the current root page id into the persistent header directory.
    /// Called whenever the root changes.
    pub(crate) fn update_root_page_id(&self) -> Result<(), BTreeError> {
        let header_page = self.buffer_pool.fetch_page(HEADER_PAGE_ID)?;
        {
            let mut page_guard = header_page.write();
            HeaderDirectory::update_record(&mut page_guard, &self.index_name, self.root_page_id.get());
        }
        self.buffer_pool.unpin_page(HEADER_PAGE_ID, true)?;
        debug!(
            "index {} root is now page {}",
            self.index_name,
            self.root_page_id.get()
        );
        Ok(())
    }
}
