mod decoding;
mod encoding;
#[cfg(test)]
mod tests;

pub use decoding::deserialize_node;
pub use encoding::serialize_node;

/// Page-type tags stored in the first header field
pub(crate) const PAGE_TYPE_LEAF: i32 = 1;
pub(crate) const PAGE_TYPE_INTERNAL: i32 = 2;

// Common header: page_type, size, max_size, parent_page_id, page_id
// (5 x i32, little-endian). Leaves append next_page_id.
pub(crate) const COMMON_HEADER_SIZE: usize = 20;
pub(crate) const LEAF_HEADER_SIZE: usize = 24;

/// Bytes occupied by the unused key of an internal node's slot 0: a raw
/// `i32` in the fast path, an empty length prefix otherwise
pub(crate) fn phantom_key_len<K: 'static>() -> usize {
    if std::any::TypeId::of::<K>() == std::any::TypeId::of::<i32>() {
        4
    } else {
        2
    }
}
