use byteorder::{ByteOrder, LittleEndian};

use crate::common::types::{Page, PageId, PAGE_SIZE};

// Record layout: 32-byte zero-padded name followed by the root page id
const NAME_SIZE: usize = 32;
const RECORD_SIZE: usize = NAME_SIZE + 4;
const COUNT_SIZE: usize = 4;

/// Maximum index name length the directory accepts
pub const MAX_NAME_LEN: usize = NAME_SIZE;

/// Directory on the persistent header page (page 0) mapping index names to
/// their current root page ids. A freshly zeroed page reads as an empty
/// directory.
pub struct HeaderDirectory;

impl HeaderDirectory {
    pub fn max_records() -> usize {
        (PAGE_SIZE - COUNT_SIZE) / RECORD_SIZE
    }

    pub fn record_count(page: &Page) -> usize {
        LittleEndian::read_i32(&page.data[0..COUNT_SIZE]) as usize
    }

    /// Root page id recorded for `name`, if any
    pub fn get_root_page_id(page: &Page, name: &str) -> Option<PageId> {
        let slot = Self::find_record(page, name)?;
        let offset = Self::record_offset(slot);
        Some(LittleEndian::read_i32(
            &page.data[offset + NAME_SIZE..offset + RECORD_SIZE],
        ))
    }

    /// Append a record for `name`. Fails when the name is already present,
    /// too long, or the directory is full.
    pub fn insert_record(page: &mut Page, name: &str, root_page_id: PageId) -> bool {
        if name.len() > MAX_NAME_LEN || name.is_empty() {
            return false;
        }
        if Self::find_record(page, name).is_some() {
            return false;
        }

        let count = Self::record_count(page);
        if count >= Self::max_records() {
            return false;
        }

        Self::write_record(page, count, name, root_page_id);
        LittleEndian::write_i32(&mut page.data[0..COUNT_SIZE], (count + 1) as i32);
        true
    }

    /// Overwrite the root page id recorded for `name`
    pub fn update_record(page: &mut Page, name: &str, root_page_id: PageId) -> bool {
        match Self::find_record(page, name) {
            Some(slot) => {
                let offset = Self::record_offset(slot);
                LittleEndian::write_i32(
                    &mut page.data[offset + NAME_SIZE..offset + RECORD_SIZE],
                    root_page_id,
                );
                true
            }
            None => false,
        }
    }

    /// Drop the record for `name`, compacting the tail over it
    pub fn delete_record(page: &mut Page, name: &str) -> bool {
        let slot = match Self::find_record(page, name) {
            Some(slot) => slot,
            None => return false,
        };

        let count = Self::record_count(page);
        let start = Self::record_offset(slot);
        let tail_start = Self::record_offset(slot + 1);
        let tail_end = Self::record_offset(count);
        page.data.copy_within(tail_start..tail_end, start);
        page.data[Self::record_offset(count - 1)..tail_end].fill(0);

        LittleEndian::write_i32(&mut page.data[0..COUNT_SIZE], (count - 1) as i32);
        true
    }

    fn find_record(page: &Page, name: &str) -> Option<usize> {
        if name.len() > MAX_NAME_LEN {
            return None;
        }
        let count = Self::record_count(page);
        (0..count).find(|&slot| Self::name_at(page, slot) == name.as_bytes())
    }

    fn name_at(page: &Page, slot: usize) -> &[u8] {
        let offset = Self::record_offset(slot);
        let name = &page.data[offset..offset + NAME_SIZE];
        let end = name.iter().position(|&b| b == 0).unwrap_or(NAME_SIZE);
        &name[..end]
    }

    fn write_record(page: &mut Page, slot: usize, name: &str, root_page_id: PageId) {
        let offset = Self::record_offset(slot);
        page.data[offset..offset + NAME_SIZE].fill(0);
        page.data[offset..offset + name.len()].copy_from_slice(name.as_bytes());
        LittleEndian::write_i32(
            &mut page.data[offset + NAME_SIZE..offset + RECORD_SIZE],
            root_page_id,
        );
    }

    fn record_offset(slot: usize) -> usize {
        COUNT_SIZE + slot * RECORD_SIZE
    }
}
