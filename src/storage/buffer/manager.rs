use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use log::debug;
use parking_lot::{Mutex, RwLock};

use crate::common::types::{
    Frame, FramePtr, FrameId, Page, PageId, PagePtr, INVALID_PAGE_ID,
};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::replacer::LRUReplacer;
use crate::storage::disk::DiskManager;
use crate::transaction::wal::LogManager;

// Page table, free list and page-id allocator share one mutex; per-page
// latches are independent and may be held across buffer pool calls.
struct PoolState {
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    next_page_id: PageId,
}

/// A buffer pool instance: a fixed array of frames caching disk pages, with
/// pin/unpin reference counting and LRU victim selection.
///
/// Several instances may be federated over one disk file, each owning the
/// residue class `page_id % num_instances == instance_index` and allocating
/// ids by stride. Page 0 is reserved for the header directory and is never
/// handed out by the allocator.
pub struct BufferPoolManager {
    pool_size: usize,
    num_instances: u32,
    instance_index: u32,
    frames: Vec<FramePtr>,
    state: Mutex<PoolState>,
    replacer: LRUReplacer,
    disk_manager: Arc<DiskManager>,
    #[allow(dead_code)]
    log_manager: Arc<LogManager>,
}

impl BufferPoolManager {
    /// Create a standalone instance owning every page id
    pub fn new(
        pool_size: usize,
        disk_manager: Arc<DiskManager>,
        log_manager: Arc<LogManager>,
    ) -> Self {
        Self::new_instance(pool_size, 1, 0, disk_manager, log_manager)
    }

    /// Create one instance of a federated pool
    pub fn new_instance(
        pool_size: usize,
        num_instances: u32,
        instance_index: u32,
        disk_manager: Arc<DiskManager>,
        log_manager: Arc<LogManager>,
    ) -> Self {
        assert!(num_instances > 0, "a pool needs at least one instance");
        assert!(
            instance_index < num_instances,
            "instance index must fall within the pool"
        );

        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        for frame_id in 0..pool_size {
            let page = Arc::new(RwLock::new(Page::new(INVALID_PAGE_ID)));
            frames.push(Arc::new(RwLock::new(Frame::new(frame_id, page))));
            free_list.push_back(frame_id);
        }

        // Page 0 belongs to instance 0's residue class but is reserved for
        // the header directory, so that instance starts one stride in.
        let first_page_id = if instance_index == 0 {
            num_instances as PageId
        } else {
            instance_index as PageId
        };

        Self {
            pool_size,
            num_instances,
            instance_index,
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list,
                next_page_id: first_page_id,
            }),
            replacer: LRUReplacer::new(pool_size),
            disk_manager,
            log_manager,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Allocate a fresh page id and bind it to a pinned, zeroed frame.
    /// Fails with `BufferPoolFull` iff every frame is pinned.
    pub fn new_page(&self) -> Result<(PagePtr, PageId), BufferPoolError> {
        let mut state = self.state.lock();

        let frame_id = self.allocate_frame(&mut state)?;
        let page_id = self.allocate_page_id(&mut state);

        let frame = &self.frames[frame_id];
        let page_ptr = {
            let mut frame_guard = frame.write();
            {
                let mut page_guard = frame_guard.page.write();
                page_guard.reset();
                page_guard.page_id = page_id;
            }
            frame_guard.pin_count = 1;
            frame_guard.is_dirty = false;
            frame_guard.page.clone()
        };

        state.page_table.insert(page_id, frame_id);

        Ok((page_ptr, page_id))
    }

    /// Fetch a page, pinning it. A resident page just gains a pin; otherwise
    /// a victim frame is rebound and the page is read from disk with
    /// pin count 1. Fails with `BufferPoolFull` iff every frame is pinned.
    pub fn fetch_page(&self, page_id: PageId) -> Result<PagePtr, BufferPoolError> {
        if page_id == INVALID_PAGE_ID {
            return Err(BufferPoolError::InvalidOperation(
                "cannot fetch the invalid page id".to_string(),
            ));
        }

        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.frames[frame_id];
            let mut frame_guard = frame.write();
            frame_guard.pin_count += 1;
            // A frame that was sitting in the replacer is in use again
            self.replacer.pin(frame_id);
            return Ok(frame_guard.page.clone());
        }

        let frame_id = self.allocate_frame(&mut state)?;
        let frame = &self.frames[frame_id];
        let page_ptr = {
            let mut frame_guard = frame.write();
            {
                let mut page_guard = frame_guard.page.write();
                page_guard.reset();
                self.disk_manager.read_page(page_id, &mut page_guard)?;
            }
            frame_guard.pin_count = 1;
            frame_guard.is_dirty = false;
            frame_guard.page.clone()
        };

        state.page_table.insert(page_id, frame_id);

        Ok(page_ptr)
    }

    /// Drop one pin. `is_dirty` is OR-ed into the frame's dirty flag and
    /// never cleared here. A frame whose pin count reaches zero becomes a
    /// victim candidate.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<(), BufferPoolError> {
        let state = self.state.lock();

        let frame_id = *state
            .page_table
            .get(&page_id)
            .ok_or(BufferPoolError::PageNotFound(page_id))?;

        let frame = &self.frames[frame_id];
        let mut frame_guard = frame.write();

        if frame_guard.pin_count == 0 {
            return Err(BufferPoolError::PageNotPinned(page_id));
        }

        frame_guard.pin_count -= 1;
        frame_guard.is_dirty |= is_dirty;

        if frame_guard.pin_count == 0 {
            self.replacer.unpin(frame_id);
        }

        Ok(())
    }

    /// Write the page through the disk manager and clear its dirty flag.
    /// The pin count is untouched.
    pub fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let state = self.state.lock();

        let frame_id = *state
            .page_table
            .get(&page_id)
            .ok_or(BufferPoolError::PageNotFound(page_id))?;

        let frame = &self.frames[frame_id];
        let mut frame_guard = frame.write();
        {
            let page_guard = frame_guard.page.read();
            self.disk_manager.write_page(&page_guard)?;
        }
        frame_guard.is_dirty = false;

        Ok(())
    }

    /// Flush every resident page to disk
    pub fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        let page_ids: Vec<PageId> = {
            let state = self.state.lock();
            state.page_table.keys().copied().collect()
        };

        for page_id in page_ids {
            match self.flush_page(page_id) {
                Ok(()) | Err(BufferPoolError::PageNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// Drop a page from the pool. Succeeds trivially when the page is not
    /// resident; fails while anyone holds a pin.
    pub fn delete_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let mut state = self.state.lock();

        let frame_id = match state.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Ok(()),
        };

        let frame = &self.frames[frame_id];
        let mut frame_guard = frame.write();

        if frame_guard.pin_count > 0 {
            return Err(BufferPoolError::PagePinned(page_id));
        }

        state.page_table.remove(&page_id);
        self.replacer.pin(frame_id);

        frame_guard.page.write().reset();
        frame_guard.is_dirty = false;
        frame_guard.pin_count = 0;

        state.free_list.push_back(frame_id);

        Ok(())
    }

    /// Current pin count of a resident page, if any
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        let frame_id = *state.page_table.get(&page_id)?;
        Some(self.frames[frame_id].read().pin_count)
    }

    /// Pick a frame to rebind: the free list first, then the replacer. A
    /// dirty victim is written through before its mapping is dropped.
    fn allocate_frame(&self, state: &mut PoolState) -> Result<FrameId, BufferPoolError> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = self.replacer.victim().ok_or(BufferPoolError::BufferPoolFull)?;

        let frame = &self.frames[frame_id];
        let old_page_id = {
            let mut frame_guard = frame.write();
            let old_page_id = frame_guard.page.read().page_id;
            if frame_guard.is_dirty {
                debug!("flushing dirty page {} before eviction", old_page_id);
                let page_guard = frame_guard.page.read();
                self.disk_manager.write_page(&page_guard)?;
            }
            frame_guard.is_dirty = false;
            old_page_id
        };

        if old_page_id != INVALID_PAGE_ID {
            state.page_table.remove(&old_page_id);
        }

        Ok(frame_id)
    }

    /// Hand out the next page id in this instance's residue class
    fn allocate_page_id(&self, state: &mut PoolState) -> PageId {
        let page_id = state.next_page_id;
        state.next_page_id += self.num_instances as PageId;
        debug_assert_eq!(
            page_id.rem_euclid(self.num_instances as PageId),
            self.instance_index as PageId
        );
        page_id
    }
}
