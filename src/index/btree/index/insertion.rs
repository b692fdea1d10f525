use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::common::types::{PageId, Rid, INVALID_PAGE_ID};
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::{BTreeNode, InternalNode, LeafNode};
use crate::index::btree::serialization::serialize_node;
use super::base::BPlusTree;

impl<K> BPlusTree<K>
where
    K: Clone + Ord + Serialize + DeserializeOwned + 'static,
{
    /// Insert a key-value pair, splitting along the path as needed.
    /// Returns false without side effects when the key already exists.
    pub fn insert(&self, key: K, rid: Rid) -> Result<bool, BTreeError> {
        if self.is_empty() {
            self.start_new_tree(key, rid)?;
            return Ok(true);
        }

        let leaf_page_id = self.find_leaf_page(Some(&key))?;
        let mut leaf = match self.read_node(leaf_page_id)? {
            BTreeNode::Leaf(leaf) => leaf,
            BTreeNode::Internal(_) => return Err(BTreeError::InvalidPageFormat),
        };

        if !leaf.insert(key, rid) {
            return Ok(false);
        }

        if leaf.size() == self.leaf_max_size {
            let (new_page, new_page_id) = self.buffer_pool.new_page()?;
            let new_leaf = leaf.split(new_page_id);
            let separator = new_leaf.first_key().clone();

            {
                let mut page_guard = new_page.write();
                serialize_node(&BTreeNode::Leaf(new_leaf), &mut page_guard)?;
            }
            self.buffer_pool.unpin_page(new_page_id, true)?;

            let old_page_id = leaf.page_id;
            let parent_page_id = leaf.parent_page_id;
            self.write_node(&BTreeNode::Leaf(leaf))?;

            self.insert_into_parent(old_page_id, parent_page_id, separator, new_page_id)?;
        } else {
            self.write_node(&BTreeNode::Leaf(leaf))?;
        }

        Ok(true)
    }

    /// First insert into an empty tree: a fresh leaf becomes the root
    fn start_new_tree(&self, key: K, rid: Rid) -> Result<(), BTreeError> {
        let (root_page, root_page_id) = self.buffer_pool.new_page()?;

        let mut root = LeafNode::new(root_page_id, self.leaf_max_size);
        root.insert(key, rid);

        {
            let mut page_guard = root_page.write();
            serialize_node(&BTreeNode::Leaf(root), &mut page_guard)?;
        }
        self.buffer_pool.unpin_page(root_page_id, true)?;

        self.set_root_page_id(root_page_id);
        self.update_root_page_id()
    }

    /// Hook `new_page_id` into the tree after `old_page_id` split, promoting
    /// `key` as their separator. Splits propagate upward recursively; a root
    /// split grows the tree by one level.
    fn insert_into_parent(
        &self,
        old_page_id: PageId,
        parent_page_id: PageId,
        key: K,
        new_page_id: PageId,
    ) -> Result<(), BTreeError> {
        if parent_page_id == INVALID_PAGE_ID {
            // The old node was the root: grow a new one above it
            let (root_page, root_page_id) = self.buffer_pool.new_page()?;

            let mut new_root = InternalNode::new(root_page_id, self.internal_max_size);
            new_root.populate_new_root(old_page_id, key, new_page_id);

            {
                let mut page_guard = root_page.write();
                serialize_node(&BTreeNode::Internal(new_root), &mut page_guard)?;
            }
            self.buffer_pool.unpin_page(root_page_id, true)?;

            self.set_parent(old_page_id, root_page_id)?;
            self.set_parent(new_page_id, root_page_id)?;

            self.set_root_page_id(root_page_id);
            return self.update_root_page_id();
        }

        let mut parent = match self.read_node(parent_page_id)? {
            BTreeNode::Internal(node) => node,
            BTreeNode::Leaf(_) => return Err(BTreeError::InvalidPageFormat),
        };

        parent.insert_after(old_page_id, key, new_page_id);

        if parent.keys.len() > self.internal_max_size {
            let (sibling_page, sibling_page_id) = self.buffer_pool.new_page()?;
            let (new_internal, promoted) = parent.split(sibling_page_id);

            // Moved children hang under the new sibling now
            for &child in &new_internal.children {
                self.set_parent(child, sibling_page_id)?;
            }

            {
                let mut page_guard = sibling_page.write();
                serialize_node(&BTreeNode::Internal(new_internal), &mut page_guard)?;
            }
            self.buffer_pool.unpin_page(sibling_page_id, true)?;

            let grandparent_page_id = parent.parent_page_id;
            self.write_node(&BTreeNode::Internal(parent))?;

            self.insert_into_parent(parent_page_id, grandparent_page_id, promoted, sibling_page_id)
        } else {
            self.write_node(&BTreeNode::Internal(parent))
        }
    }
}
