use crate::buffer::lock_table::LockTable;
use crate::buffer::page_cache::{PageCache, PageRef, Permissions};
use crate::catalog::{Catalog, TableId};
use crate::error::{DbError, Result};
use crate::storage::page::PageId;
use crate::storage::tuple::Tuple;
use crate::transaction::TransactionId;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Caches pages in memory and grants them to transactions.
///
/// Dirty pages stay in the pool until their transaction completes: a commit
/// writes them out, an abort rolls them back to their before image. Only clean
/// pages nobody holds are evicted to make room.
pub struct BufferPool {
    capacity: usize,
    catalog: Arc<Catalog>,
    pages: Mutex<HashMap<PageId, PageRef>>,
    // Never locked while `pages` is held, except from `evict_page`.
    locks: Mutex<LockTable>,
}

impl BufferPool {
    pub fn new(capacity: usize, catalog: Arc<Catalog>) -> BufferPool {
        BufferPool {
            capacity,
            catalog,
            pages: Mutex::new(HashMap::with_capacity(capacity)),
            locks: Mutex::new(LockTable::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of pages currently cached.
    pub fn num_cached(&self) -> usize {
        self.pages.lock().len()
    }

    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.locks.lock().holds_lock(tid, page_id)
    }

    /// Gives up the transaction's permission on the page before it completes.
    pub fn release_page(&self, tid: TransactionId, page_id: PageId) {
        self.locks.lock().release(tid, page_id);
    }

    /// Writes the page to its heap file if it is dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let page = match self.pages.lock().get(&page_id) {
            Some(page) => page.clone(),
            None => return Ok(()),
        };

        let mut page = page.write();
        if let Some(tid) = page.dirtier() {
            let file = self.catalog.table_id_to_file(page_id.table_id)?;
            file.write_page(&page)?;
            page.mark_dirty(false, tid);
        }
        Ok(())
    }

    /// Writes out every dirty page, whichever transaction dirtied it.
    pub fn flush_all_pages(&self) -> Result<()> {
        let page_ids: Vec<PageId> = self.pages.lock().keys().copied().collect();
        let mut num_pages_written = 0;

        for page_id in page_ids {
            let dirty = self
                .pages
                .lock()
                .get(&page_id)
                .map_or(false, |page| page.read().dirtier().is_some());
            if dirty {
                self.flush_page(page_id)?;
                num_pages_written += 1;
            }
        }

        if num_pages_written > 0 {
            log::info!("Flushed {} pages", num_pages_written);
        } else {
            log::info!("There were no pages to flush");
        }
        Ok(())
    }

    /// Drops the page from the pool without writing it out.
    pub fn discard_page(&self, page_id: PageId) {
        self.pages.lock().remove(&page_id);
    }

    /// Commits or aborts the transaction's changes, then releases all of its pages.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<()> {
        let locked = self.locks.lock().pages_locked_by(tid);
        let pages: Vec<PageRef> = {
            let cached = self.pages.lock();
            locked
                .iter()
                .filter_map(|page_id| cached.get(page_id).cloned())
                .collect()
        };

        for page in pages {
            let mut page = page.write();
            if page.dirtier() != Some(tid) {
                continue;
            }

            if commit {
                let file = self.catalog.table_id_to_file(page.id().table_id)?;
                file.write_page(&page)?;
                page.mark_dirty(false, tid);
                page.set_before_image()?;
            } else {
                log::debug!("rolling back page {:?} for {:?}", page.id(), tid);
                let before = page.before_image()?;
                *page = before;
            }
        }

        let mut locks = self.locks.lock();
        let still_locked = locks.pages_locked_by(tid).len();
        locks.release_all(tid);
        log::debug!(
            "{:?} {} and released {} pages",
            tid,
            if commit { "committed" } else { "aborted" },
            still_locked
        );
        Ok(())
    }

    /// Removes one clean page that no transaction holds.
    fn evict_page(&self, pages: &mut HashMap<PageId, PageRef>) -> Result<()> {
        let locks = self.locks.lock();
        let victim = pages
            .iter()
            .find(|(page_id, page)| {
                Arc::strong_count(page) == 1
                    && !locks.is_locked(**page_id)
                    && page.read().dirtier().is_none()
            })
            .map(|(page_id, _)| *page_id);

        match victim {
            Some(page_id) => {
                log::trace!("evicting page {:?}", page_id);
                pages.remove(&page_id);
                Ok(())
            }
            None => Err(DbError::NoSpaceInPool),
        }
    }

    fn mark_dirty(&self, tid: TransactionId, dirtied: Vec<PageRef>) {
        let mut pages = self.pages.lock();
        for page in dirtied {
            let page_id = {
                let mut guard = page.write();
                guard.mark_dirty(true, tid);
                guard.id()
            };
            pages.entry(page_id).or_insert(page);
        }
    }
}

impl PageCache for BufferPool {
    fn fetch_page(
        &self,
        tid: TransactionId,
        page_id: PageId,
        perm: Permissions,
    ) -> Result<PageRef> {
        let first_write = {
            let mut locks = self.locks.lock();
            let first_write =
                perm == Permissions::ReadWrite && !locks.holds_write_lock(tid, page_id);
            locks.acquire(tid, page_id, perm)?;
            first_write
        };

        let page = {
            let mut pages = self.pages.lock();
            match pages.get(&page_id) {
                // The page is in the buffer pool.
                Some(page) => page.clone(),
                None => {
                    // The page is not in the buffer pool. Fetch it from its file
                    // and insert it into the pool.
                    if pages.len() >= self.capacity {
                        self.evict_page(&mut pages)?;
                    }
                    let file = self.catalog.table_id_to_file(page_id.table_id)?;
                    let page = Arc::new(RwLock::new(file.read_page(page_id)?));
                    pages.insert(page_id, page.clone());
                    page
                }
            }
        };

        // Snapshot the page as the transaction first gets to change it.
        if first_write {
            let mut guard = page.write();
            if guard.dirtier().is_none() {
                guard.set_before_image()?;
            }
        }

        Ok(page)
    }

    fn insert_tuple(&self, tid: TransactionId, table_id: TableId, tuple: Tuple) -> Result<()> {
        let file = self.catalog.table_id_to_file(table_id)?;
        let dirtied = file.insert_tuple(self, tid, tuple)?;
        self.mark_dirty(tid, dirtied);
        Ok(())
    }

    fn delete_tuple(&self, tid: TransactionId, tuple: &mut Tuple) -> Result<()> {
        let rid = tuple.record_id().ok_or(DbError::MissingRecordId)?;
        let file = self.catalog.table_id_to_file(rid.page_id.table_id)?;
        let dirtied = file.delete_tuple(self, tid, tuple)?;
        self.mark_dirty(tid, dirtied);
        Ok(())
    }
}
