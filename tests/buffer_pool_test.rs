use anyhow::Result;
use karstdb::BufferPoolError;

mod common;
use common::{create_test_buffer_pool, create_test_buffer_pool_instance};

#[test]
fn test_new_page_skips_reserved_header_page() -> Result<()> {
    let (buffer_pool, _dir) = create_test_buffer_pool(10)?;

    let (page, page_id) = buffer_pool.new_page()?;
    assert_eq!(page_id, 1);

    {
        let page_guard = page.read();
        assert_eq!(page_guard.page_id, page_id);
        assert!(page_guard.data.iter().all(|&b| b == 0));
    }

    buffer_pool.unpin_page(page_id, false)?;
    Ok(())
}

#[test]
fn test_pin_blocks_eviction() -> Result<()> {
    // One frame only
    let (buffer_pool, _dir) = create_test_buffer_pool(1)?;

    let (_page, page_id) = buffer_pool.new_page()?;

    // The sole frame is pinned, so nothing else fits
    match buffer_pool.new_page() {
        Err(BufferPoolError::BufferPoolFull) => {}
        other => panic!("expected BufferPoolFull, got {:?}", other.map(|(_, id)| id)),
    }
    match buffer_pool.fetch_page(page_id + 1) {
        Err(BufferPoolError::BufferPoolFull) => {}
        other => panic!("expected BufferPoolFull, got {:?}", other.map(|_| ())),
    }

    // Releasing the pin makes the frame evictable again
    buffer_pool.unpin_page(page_id, false)?;
    let (_page, second_id) = buffer_pool.new_page()?;
    assert_ne!(second_id, page_id);
    buffer_pool.unpin_page(second_id, false)?;

    Ok(())
}

#[test]
fn test_dirty_page_survives_eviction() -> Result<()> {
    let (buffer_pool, _dir) = create_test_buffer_pool(3)?;

    let (page, page_id) = buffer_pool.new_page()?;
    {
        let mut page_guard = page.write();
        page_guard.data[100..109].copy_from_slice(b"Test Data");
    }
    buffer_pool.unpin_page(page_id, true)?;

    // Cycle enough pages through the pool to evict the dirty one
    for _ in 0..4 {
        let (_page, id) = buffer_pool.new_page()?;
        buffer_pool.unpin_page(id, false)?;
    }

    let fetched = buffer_pool.fetch_page(page_id)?;
    {
        let page_guard = fetched.read();
        assert_eq!(&page_guard.data[100..109], b"Test Data");
    }
    buffer_pool.unpin_page(page_id, false)?;

    Ok(())
}

#[test]
fn test_fetch_then_unpin_is_pin_count_neutral() -> Result<()> {
    let (buffer_pool, _dir) = create_test_buffer_pool(5)?;

    let (_page, page_id) = buffer_pool.new_page()?;
    assert_eq!(buffer_pool.pin_count(page_id), Some(1));

    let _fetched = buffer_pool.fetch_page(page_id)?;
    assert_eq!(buffer_pool.pin_count(page_id), Some(2));

    buffer_pool.unpin_page(page_id, false)?;
    assert_eq!(buffer_pool.pin_count(page_id), Some(1));

    buffer_pool.unpin_page(page_id, false)?;
    assert_eq!(buffer_pool.pin_count(page_id), Some(0));

    Ok(())
}

#[test]
fn test_unpin_error_cases() -> Result<()> {
    let (buffer_pool, _dir) = create_test_buffer_pool(5)?;

    // Not resident
    assert!(matches!(
        buffer_pool.unpin_page(42, false),
        Err(BufferPoolError::PageNotFound(42))
    ));

    let (_page, page_id) = buffer_pool.new_page()?;
    buffer_pool.unpin_page(page_id, false)?;

    // Already at pin count zero
    assert!(matches!(
        buffer_pool.unpin_page(page_id, false),
        Err(BufferPoolError::PageNotPinned(_))
    ));

    Ok(())
}

#[test]
fn test_delete_page_rules() -> Result<()> {
    let (buffer_pool, _dir) = create_test_buffer_pool(5)?;

    // Deleting a page that is not resident succeeds trivially
    buffer_pool.delete_page(99)?;

    let (_page, page_id) = buffer_pool.new_page()?;

    // Pinned pages cannot be deleted
    assert!(matches!(
        buffer_pool.delete_page(page_id),
        Err(BufferPoolError::PagePinned(_))
    ));

    buffer_pool.unpin_page(page_id, false)?;
    buffer_pool.delete_page(page_id)?;
    assert_eq!(buffer_pool.pin_count(page_id), None);

    Ok(())
}

#[test]
fn test_flush_page_persists_data() -> Result<()> {
    let (buffer_pool, _dir) = create_test_buffer_pool(3)?;

    let (page, page_id) = buffer_pool.new_page()?;
    {
        let mut page_guard = page.write();
        page_guard.data[0..5].copy_from_slice(b"hello");
    }
    buffer_pool.unpin_page(page_id, true)?;
    buffer_pool.flush_page(page_id)?;

    // Push the page out and read it back from disk
    for _ in 0..3 {
        let (_page, id) = buffer_pool.new_page()?;
        buffer_pool.unpin_page(id, false)?;
    }

    let fetched = buffer_pool.fetch_page(page_id)?;
    {
        let page_guard = fetched.read();
        assert_eq!(&page_guard.data[0..5], b"hello");
    }
    buffer_pool.unpin_page(page_id, false)?;

    Ok(())
}

#[test]
fn test_flush_all_pages() -> Result<()> {
    let (buffer_pool, _dir) = create_test_buffer_pool(10)?;

    let mut page_ids = Vec::new();
    for i in 0..5u8 {
        let (page, page_id) = buffer_pool.new_page()?;
        {
            let mut page_guard = page.write();
            page_guard.data[0] = i + 1;
        }
        buffer_pool.unpin_page(page_id, true)?;
        page_ids.push(page_id);
    }

    buffer_pool.flush_all_pages()?;

    for (i, &page_id) in page_ids.iter().enumerate() {
        let fetched = buffer_pool.fetch_page(page_id)?;
        {
            let page_guard = fetched.read();
            assert_eq!(page_guard.data[0], i as u8 + 1);
        }
        buffer_pool.unpin_page(page_id, false)?;
    }

    Ok(())
}

#[test]
fn test_federated_instances_allocate_by_stride() -> Result<()> {
    let (instance_one, _dir1) = create_test_buffer_pool_instance(5, 3, 1)?;
    for expected in [1, 4, 7] {
        let (_page, page_id) = instance_one.new_page()?;
        assert_eq!(page_id, expected);
        instance_one.unpin_page(page_id, false)?;
    }

    // Instance 0 owns page 0's residue class but leaves page 0 itself to
    // the header directory
    let (instance_zero, _dir0) = create_test_buffer_pool_instance(5, 3, 0)?;
    for expected in [3, 6, 9] {
        let (_page, page_id) = instance_zero.new_page()?;
        assert_eq!(page_id, expected);
        instance_zero.unpin_page(page_id, false)?;
    }

    Ok(())
}
