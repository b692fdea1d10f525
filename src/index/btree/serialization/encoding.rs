use std::any::TypeId;
use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use crate::common::types::{Page, PAGE_SIZE};
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::BTreeNode;
use super::{phantom_key_len, COMMON_HEADER_SIZE, LEAF_HEADER_SIZE, PAGE_TYPE_INTERNAL, PAGE_TYPE_LEAF};

/// Serialize a B+Tree node into a page
pub fn serialize_node<K>(node: &BTreeNode<K>, page: &mut Page) -> Result<(), BTreeError>
where
    K: Serialize + Clone + Ord + 'static,
{
    page.data.fill(0);

    match node {
        BTreeNode::Leaf(leaf) => {
            LittleEndian::write_i32(&mut page.data[0..4], PAGE_TYPE_LEAF);
            LittleEndian::write_i32(&mut page.data[4..8], leaf.entries.len() as i32);
            LittleEndian::write_i32(&mut page.data[8..12], leaf.max_size as i32);
            LittleEndian::write_i32(&mut page.data[12..16], leaf.parent_page_id);
            LittleEndian::write_i32(&mut page.data[16..20], leaf.page_id);
            LittleEndian::write_i32(&mut page.data[20..24], leaf.next_page_id);

            let mut offset = LEAF_HEADER_SIZE;
            for (key, rid) in &leaf.entries {
                offset = write_key(key, page, offset)?;
                if offset + 8 > PAGE_SIZE {
                    return Err(BTreeError::NodeTooLarge);
                }
                LittleEndian::write_i32(&mut page.data[offset..offset + 4], rid.page_id);
                offset += 4;
                LittleEndian::write_u32(&mut page.data[offset..offset + 4], rid.slot_num);
                offset += 4;
            }
        }
        BTreeNode::Internal(internal) => {
            LittleEndian::write_i32(&mut page.data[0..4], PAGE_TYPE_INTERNAL);
            LittleEndian::write_i32(&mut page.data[4..8], internal.children.len() as i32);
            LittleEndian::write_i32(&mut page.data[8..12], internal.max_size as i32);
            LittleEndian::write_i32(&mut page.data[12..16], internal.parent_page_id);
            LittleEndian::write_i32(&mut page.data[16..20], internal.page_id);

            // Slot 0 carries no key; the page is already zeroed, so the
            // phantom slot is skipped rather than written
            let mut offset = COMMON_HEADER_SIZE;
            for (slot, child) in internal.children.iter().enumerate() {
                offset = if slot == 0 {
                    offset + phantom_key_len::<K>()
                } else {
                    write_key(&internal.keys[slot - 1], page, offset)?
                };
                if offset + 4 > PAGE_SIZE {
                    return Err(BTreeError::NodeTooLarge);
                }
                LittleEndian::write_i32(&mut page.data[offset..offset + 4], *child);
                offset += 4;
            }
        }
    }

    Ok(())
}

/// Write one key at `offset`, returning the offset past it.
/// `i32` keys are written raw to avoid bincode overhead; other types get a
/// two-byte length prefix.
fn write_key<K>(key: &K, page: &mut Page, offset: usize) -> Result<usize, BTreeError>
where
    K: Serialize + 'static,
{
    if TypeId::of::<K>() == TypeId::of::<i32>() {
        if offset + 4 > PAGE_SIZE {
            return Err(BTreeError::NodeTooLarge);
        }
        // Safety: the TypeId check guarantees K is i32
        let value = unsafe { std::mem::transmute_copy::<K, i32>(key) };
        LittleEndian::write_i32(&mut page.data[offset..offset + 4], value);
        return Ok(offset + 4);
    }

    let key_bytes = bincode::serialize(key)
        .map_err(|_| BTreeError::SerializationError("Failed to serialize key".to_string()))?;

    if offset + 2 + key_bytes.len() > PAGE_SIZE {
        return Err(BTreeError::NodeTooLarge);
    }

    LittleEndian::write_u16(&mut page.data[offset..offset + 2], key_bytes.len() as u16);
    page.data[offset + 2..offset + 2 + key_bytes.len()].copy_from_slice(&key_bytes);

    Ok(offset + 2 + key_bytes.len())
}
