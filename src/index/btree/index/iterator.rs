use std::sync::Arc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::common::types::{PageId, Rid, INVALID_PAGE_ID};
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::{BTreeNode, LeafNode};
use crate::index::btree::serialization::deserialize_node;
use crate::storage::buffer::BufferPoolManager;
use super::base::BPlusTree;

impl<K> BPlusTree<K>
where
    K: Clone + Ord + Serialize + DeserializeOwned + 'static,
{
    /// Iterate over all entries in ascending key order, starting at the
    /// leftmost leaf
    pub fn iter(&self) -> Result<BPlusTreeIterator<K>, BTreeError> {
        if self.is_empty() {
            return Ok(BPlusTreeIterator::exhausted(self.buffer_pool.clone()));
        }

        let leaf_page_id = self.find_leaf_page(None)?;
        let leaf = BPlusTreeIterator::fetch_leaf(&self.buffer_pool, leaf_page_id)?;

        Ok(BPlusTreeIterator {
            buffer_pool: self.buffer_pool.clone(),
            leaf: Some(leaf),
            index: 0,
        })
    }

    /// Iterate in ascending key order starting at the first entry whose key
    /// is >= `key`
    pub fn iter_from(&self, key: &K) -> Result<BPlusTreeIterator<K>, BTreeError> {
        if self.is_empty() {
            return Ok(BPlusTreeIterator::exhausted(self.buffer_pool.clone()));
        }

        let leaf_page_id = self.find_leaf_page(Some(key))?;
        let leaf = BPlusTreeIterator::fetch_leaf(&self.buffer_pool, leaf_page_id)?;
        let index = leaf.lower_bound(key);

        Ok(BPlusTreeIterator {
            buffer_pool: self.buffer_pool.clone(),
            leaf: Some(leaf),
            index,
        })
    }

    /// All record ids in the inclusive key range `[start, end]`
    pub fn range_scan(&self, start: &K, end: &K) -> Result<Vec<Rid>, BTreeError> {
        if start > end {
            return Ok(Vec::new());
        }

        let mut result = Vec::new();
        for (key, rid) in self.iter_from(start)? {
            if &key > end {
                break;
            }
            result.push(rid);
        }
        Ok(result)
    }

    /// Number of entries in the tree
    pub fn count(&self) -> Result<usize, BTreeError> {
        Ok(self.iter()?.count())
    }
}

/// Forward iterator over the leaf chain. Holds exactly one leaf pinned at a
/// time and releases it when advancing past it or on drop. Not safe against
/// concurrent mutators and provides no snapshot semantics.
pub struct BPlusTreeIterator<K> {
    buffer_pool: Arc<BufferPoolManager>,
    leaf: Option<LeafNode<K>>,
    index: usize,
}

impl<K> BPlusTreeIterator<K>
where
    K: Clone + Ord + Serialize + DeserializeOwned + 'static,
{
    fn exhausted(buffer_pool: Arc<BufferPoolManager>) -> Self {
        Self {
            buffer_pool,
            leaf: None,
            index: 0,
        }
    }

    /// Fetch and decode a leaf, keeping its pin for the iterator
    fn fetch_leaf(
        buffer_pool: &Arc<BufferPoolManager>,
        page_id: PageId,
    ) -> Result<LeafNode<K>, BTreeError> {
        let page = buffer_pool.fetch_page(page_id)?;
        let node = {
            let page_guard = page.read();
            deserialize_node::<K>(&page_guard)
        };

        match node {
            Ok(BTreeNode::Leaf(leaf)) => Ok(leaf),
            Ok(BTreeNode::Internal(_)) => {
                let _ = buffer_pool.unpin_page(page_id, false);
                Err(BTreeError::InvalidPageFormat)
            }
            Err(e) => {
                let _ = buffer_pool.unpin_page(page_id, false);
                Err(e)
            }
        }
    }
}

impl<K> Iterator for BPlusTreeIterator<K>
where
    K: Clone + Ord + Serialize + DeserializeOwned + 'static,
{
    type Item = (K, Rid);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let leaf = self.leaf.as_ref()?;

            if self.index < leaf.entries.len() {
                let entry = leaf.entries[self.index].clone();
                self.index += 1;
                return Some(entry);
            }

            // Past the last entry: hand the pin back and move along the chain
            let current_page_id = leaf.page_id;
            let next_page_id = leaf.next_page_id;
            self.leaf = None;
            let _ = self.buffer_pool.unpin_page(current_page_id, false);

            if next_page_id == INVALID_PAGE_ID {
                return None;
            }

            match Self::fetch_leaf(&self.buffer_pool, next_page_id) {
                Ok(leaf) => {
                    self.leaf = Some(leaf);
                    self.index = 0;
                }
                Err(_) => return None,
            }
        }
    }
}

impl<K> Drop for BPlusTreeIterator<K> {
    fn drop(&mut self) {
        if let Some(leaf) = self.leaf.take() {
            let _ = self.buffer_pool.unpin_page(leaf.page_id, false);
        }
    }
}
