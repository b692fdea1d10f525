use crate::common::types::{Page, Rid, INVALID_PAGE_ID};
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::{BTreeNode, InternalNode, LeafNode};
use super::{deserialize_node, serialize_node};

#[test]
fn test_leaf_round_trip_i32_fast_path() {
    let mut leaf = LeafNode::new(3, 4);
    leaf.parent_page_id = 1;
    leaf.next_page_id = 7;
    leaf.insert(10, Rid::new(2, 1));
    leaf.insert(20, Rid::new(2, 2));

    let mut page = Page::new(3);
    serialize_node(&BTreeNode::Leaf(leaf), &mut page).unwrap();

    match deserialize_node::<i32>(&page).unwrap() {
        BTreeNode::Leaf(decoded) => {
            assert_eq!(decoded.page_id, 3);
            assert_eq!(decoded.parent_page_id, 1);
            assert_eq!(decoded.max_size, 4);
            assert_eq!(decoded.next_page_id, 7);
            assert_eq!(decoded.entries, vec![(10, Rid::new(2, 1)), (20, Rid::new(2, 2))]);
        }
        BTreeNode::Internal(_) => panic!("expected a leaf view"),
    }
}

#[test]
fn test_internal_round_trip_preserves_phantom_slot() {
    let mut internal = InternalNode::new(5, 3);
    internal.keys = vec![100, 200];
    internal.children = vec![10, 11, 12];

    let mut page = Page::new(5);
    serialize_node(&BTreeNode::Internal(internal), &mut page).unwrap();

    match deserialize_node::<i32>(&page).unwrap() {
        BTreeNode::Internal(decoded) => {
            assert_eq!(decoded.page_id, 5);
            assert_eq!(decoded.parent_page_id, INVALID_PAGE_ID);
            assert_eq!(decoded.keys, vec![100, 200]);
            assert_eq!(decoded.children, vec![10, 11, 12]);
        }
        BTreeNode::Leaf(_) => panic!("expected an internal view"),
    }
}

#[test]
fn test_generic_keys_use_length_prefixed_encoding() {
    let mut leaf: LeafNode<String> = LeafNode::new(2, 8);
    leaf.insert("apple".to_string(), Rid::new(1, 1));
    leaf.insert("banana".to_string(), Rid::new(1, 2));

    let mut page = Page::new(2);
    serialize_node(&BTreeNode::Leaf(leaf), &mut page).unwrap();

    match deserialize_node::<String>(&page).unwrap() {
        BTreeNode::Leaf(decoded) => {
            let keys: Vec<&str> = decoded.entries.iter().map(|(k, _)| k.as_str()).collect();
            assert_eq!(keys, vec!["apple", "banana"]);
        }
        BTreeNode::Internal(_) => panic!("expected a leaf view"),
    }
}

#[test]
fn test_untagged_page_is_rejected() {
    let page = Page::new(1);
    match deserialize_node::<i32>(&page) {
        Err(BTreeError::InvalidPageFormat) => {}
        _ => panic!("a zeroed page must not decode into a node view"),
    }
}
