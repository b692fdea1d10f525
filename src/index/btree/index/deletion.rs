use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::common::types::INVALID_PAGE_ID;
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::{BTreeNode, InternalNode, LeafNode};
use super::base::BPlusTree;

impl<K> BPlusTree<K>
where
    K: Clone + Ord + Serialize + DeserializeOwned + 'static,
{
    /// Remove `key` from the tree. Removing an absent key is a silent
    /// no-op. Underfull nodes borrow from a sibling when the two together
    /// still overflow one node, and merge otherwise.
    pub fn remove(&self, key: &K) -> Result<(), BTreeError> {
        if self.is_empty() {
            return Ok(());
        }

        let leaf_page_id = self.find_leaf_page(Some(key))?;
        let mut leaf = match self.read_node(leaf_page_id)? {
            BTreeNode::Leaf(leaf) => leaf,
            BTreeNode::Internal(_) => return Err(BTreeError::InvalidPageFormat),
        };

        if !leaf.remove(key) {
            return Ok(());
        }

        if leaf.page_id == self.root_page_id() {
            // The root has no minimum; an emptied leaf root ends the tree
            if leaf.entries.is_empty() {
                self.set_root_page_id(INVALID_PAGE_ID);
                self.update_root_page_id()?;
                self.buffer_pool.delete_page(leaf.page_id)?;
                return Ok(());
            }
            return self.write_node(&BTreeNode::Leaf(leaf));
        }

        if leaf.size() >= leaf.min_size() {
            return self.write_node(&BTreeNode::Leaf(leaf));
        }

        self.coalesce_or_redistribute_leaf(leaf)
    }

    fn coalesce_or_redistribute_leaf(&self, mut node: LeafNode<K>) -> Result<(), BTreeError> {
        let mut parent = match self.read_node(node.parent_page_id)? {
            BTreeNode::Internal(parent) => parent,
            BTreeNode::Leaf(_) => return Err(BTreeError::InvalidPageFormat),
        };

        let node_index = parent
            .index_of_child(node.page_id)
            .ok_or(BTreeError::InvalidPageFormat)?;

        // The left sibling is preferred
        let sibling_index = if node_index > 0 { node_index - 1 } else { 1 };
        let sibling_page_id = parent.child_at(sibling_index);
        let mut sibling = match self.read_node(sibling_page_id)? {
            BTreeNode::Leaf(sibling) => sibling,
            BTreeNode::Internal(_) => return Err(BTreeError::InvalidPageFormat),
        };

        if node.size() + sibling.size() >= node.max_size {
            // Borrow one entry across the boundary and refresh the separator
            if node_index > 0 {
                let last = sibling.entries.len() - 1;
                node.entries.insert(0, sibling.entries.remove(last));
                parent.set_separator(node_index, node.first_key().clone());
            } else {
                node.entries.push(sibling.entries.remove(0));
                parent.set_separator(1, sibling.first_key().clone());
            }

            self.write_node(&BTreeNode::Leaf(node))?;
            self.write_node(&BTreeNode::Leaf(sibling))?;
            return self.write_node(&BTreeNode::Internal(parent));
        }

        // Merge right into left and unlink the right leaf from the chain
        let (mut left, mut right, right_index) = if node_index > 0 {
            (sibling, node, node_index)
        } else {
            (node, sibling, 1)
        };

        left.entries.append(&mut right.entries);
        left.next_page_id = right.next_page_id;
        parent.remove_slot(right_index);

        self.write_node(&BTreeNode::Leaf(left))?;
        self.buffer_pool.delete_page(right.page_id)?;

        self.finish_merge(parent)
    }

    /// After a merge removed a slot from `parent`, restore its invariants:
    /// the root collapses when down to one child, other nodes rebalance
    /// below their minimum.
    fn finish_merge(&self, parent: InternalNode<K>) -> Result<(), BTreeError> {
        if parent.page_id == self.root_page_id() {
            return self.adjust_root(parent);
        }
        if parent.size() < parent.min_size() {
            return self.coalesce_or_redistribute_internal(parent);
        }
        self.write_node(&BTreeNode::Internal(parent))
    }

    /// An internal root left with a single child promotes that child
    fn adjust_root(&self, root: InternalNode<K>) -> Result<(), BTreeError> {
        if root.size() == 1 {
            let child_page_id = root.child_at(0);
            self.set_parent(child_page_id, INVALID_PAGE_ID)?;
            self.set_root_page_id(child_page_id);
            self.update_root_page_id()?;
            self.buffer_pool.delete_page(root.page_id)?;
            return Ok(());
        }
        self.write_node(&BTreeNode::Internal(root))
    }

    fn coalesce_or_redistribute_internal(&self, mut node: InternalNode<K>) -> Result<(), BTreeError> {
        let mut parent = match self.read_node(node.parent_page_id)? {
            BTreeNode::Internal(parent) => parent,
            BTreeNode::Leaf(_) => return Err(BTreeError::InvalidPageFormat),
        };

        let node_index = parent
            .index_of_child(node.page_id)
            .ok_or(BTreeError::InvalidPageFormat)?;

        let sibling_index = if node_index > 0 { node_index - 1 } else { 1 };
        let sibling_page_id = parent.child_at(sibling_index);
        let mut sibling = match self.read_node(sibling_page_id)? {
            BTreeNode::Internal(sibling) => sibling,
            BTreeNode::Leaf(_) => return Err(BTreeError::InvalidPageFormat),
        };

        if node.keys.len() + sibling.keys.len() + 1 <= self.internal_max_size {
            // Merge right into left; the separator between them comes down
            // as the first key of the merged half
            let (mut left, mut right, right_index) = if node_index > 0 {
                (sibling, node, node_index)
            } else {
                (node, sibling, 1)
            };

            let separator = parent.keys[right_index - 1].clone();
            left.keys.push(separator);
            left.keys.append(&mut right.keys);

            for &child in &right.children {
                self.set_parent(child, left.page_id)?;
            }
            left.children.append(&mut right.children);

            parent.remove_slot(right_index);

            self.write_node(&BTreeNode::Internal(left))?;
            self.buffer_pool.delete_page(right.page_id)?;

            return self.finish_merge(parent);
        }

        // Rotate one slot through the parent separator
        if node_index > 0 {
            let separator = parent.keys[node_index - 1].clone();
            node.keys.insert(0, separator);

            let last = sibling.children.len() - 1;
            let moved_child = sibling.children.remove(last);
            node.children.insert(0, moved_child);
            self.set_parent(moved_child, node.page_id)?;

            let last_key = sibling.keys.len() - 1;
            parent.set_separator(node_index, sibling.keys.remove(last_key));
        } else {
            let separator = parent.keys[0].clone();
            node.keys.push(separator);

            let moved_child = sibling.children.remove(0);
            node.children.push(moved_child);
            self.set_parent(moved_child, node.page_id)?;

            parent.set_separator(1, sibling.keys.remove(0));
        }

        self.write_node(&BTreeNode::Internal(node))?;
        self.write_node(&BTreeNode::Internal(sibling))?;
        self.write_node(&BTreeNode::Internal(parent))
    }
}
