use std::any::TypeId;
use byteorder::{ByteOrder, LittleEndian};
use serde::de::DeserializeOwned;

use crate::common::types::{Page, Rid};
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::{BTreeNode, InternalNode, LeafNode};
use super::{phantom_key_len, COMMON_HEADER_SIZE, LEAF_HEADER_SIZE, PAGE_TYPE_INTERNAL, PAGE_TYPE_LEAF};

/// Deserialize a B+Tree node from a page. The page-type tag selects the
/// variant view; anything else is a format error, so raw bytes are never
/// aliased as the wrong node kind.
pub fn deserialize_node<K>(page: &Page) -> Result<BTreeNode<K>, BTreeError>
where
    K: DeserializeOwned + Clone + Ord + 'static,
{
    let page_type = LittleEndian::read_i32(&page.data[0..4]);
    let size = LittleEndian::read_i32(&page.data[4..8]) as usize;
    let max_size = LittleEndian::read_i32(&page.data[8..12]) as usize;
    let parent_page_id = LittleEndian::read_i32(&page.data[12..16]);
    let page_id = LittleEndian::read_i32(&page.data[16..20]);

    match page_type {
        PAGE_TYPE_LEAF => {
            let next_page_id = LittleEndian::read_i32(&page.data[20..24]);

            let mut node = LeafNode::new(page_id, max_size);
            node.parent_page_id = parent_page_id;
            node.next_page_id = next_page_id;
            node.entries.reserve(size);

            let mut offset = LEAF_HEADER_SIZE;
            for _ in 0..size {
                let (key, new_offset) = read_key::<K>(page, offset)?;
                offset = new_offset;
                let rid_page_id = LittleEndian::read_i32(&page.data[offset..offset + 4]);
                offset += 4;
                let rid_slot_num = LittleEndian::read_u32(&page.data[offset..offset + 4]);
                offset += 4;
                node.entries.push((key, Rid::new(rid_page_id, rid_slot_num)));
            }

            Ok(BTreeNode::Leaf(node))
        }
        PAGE_TYPE_INTERNAL => {
            let mut node = InternalNode::new(page_id, max_size);
            node.parent_page_id = parent_page_id;
            node.keys.reserve(size.saturating_sub(1));
            node.children.reserve(size);

            let mut offset = COMMON_HEADER_SIZE;
            for slot in 0..size {
                offset = if slot == 0 {
                    offset + phantom_key_len::<K>()
                } else {
                    let (key, new_offset) = read_key::<K>(page, offset)?;
                    node.keys.push(key);
                    new_offset
                };
                let child = LittleEndian::read_i32(&page.data[offset..offset + 4]);
                offset += 4;
                node.children.push(child);
            }

            Ok(BTreeNode::Internal(node))
        }
        _ => Err(BTreeError::InvalidPageFormat),
    }
}

/// Read one key at `offset`, returning it with the offset past it
fn read_key<K>(page: &Page, offset: usize) -> Result<(K, usize), BTreeError>
where
    K: DeserializeOwned + 'static,
{
    if TypeId::of::<K>() == TypeId::of::<i32>() {
        let value = LittleEndian::read_i32(&page.data[offset..offset + 4]);
        // Safety: the TypeId check guarantees K is i32
        let key = unsafe { std::mem::transmute_copy::<i32, K>(&value) };
        return Ok((key, offset + 4));
    }

    let key_len = LittleEndian::read_u16(&page.data[offset..offset + 2]) as usize;
    let key_bytes = &page.data[offset + 2..offset + 2 + key_len];
    let key = bincode::deserialize(key_bytes)
        .map_err(|_| BTreeError::DeserializationError("Failed to deserialize key".to_string()))?;

    Ok((key, offset + 2 + key_len))
}
