use crate::buffer::page_cache::Permissions;
use crate::error::{DbError, Result};
use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct PageLock {
    readers: HashSet<TransactionId>,
    writer: Option<TransactionId>,
}

impl PageLock {
    fn is_free(&self) -> bool {
        self.readers.is_empty() && self.writer.is_none()
    }
}

/// Tracks which transactions hold which pages, and under what permission.
///
/// Any number of transactions may read a page, a writer needs it to itself.
/// Requests never wait: a conflicting request fails immediately.
#[derive(Default)]
pub struct LockTable {
    locks: HashMap<PageId, PageLock>,
    held: HashMap<TransactionId, HashSet<PageId>>,
}

impl LockTable {
    pub fn new() -> Self {
        LockTable::default()
    }

    pub fn acquire(&mut self, tid: TransactionId, page_id: PageId, perm: Permissions) -> Result<()> {
        let lock = self.locks.entry(page_id).or_default();
        let conflict = DbError::LockConflict { page_id, tid };

        match perm {
            Permissions::ReadOnly => {
                match lock.writer {
                    Some(writer) if writer != tid => return Err(conflict),
                    // A writer can read its own page.
                    Some(_) => {}
                    None => {
                        lock.readers.insert(tid);
                    }
                }
            }
            Permissions::ReadWrite => {
                if matches!(lock.writer, Some(writer) if writer != tid) {
                    return Err(conflict);
                }
                if lock.readers.iter().any(|&reader| reader != tid) {
                    return Err(conflict);
                }
                // Upgrade a shared lock if we held one.
                lock.readers.remove(&tid);
                lock.writer = Some(tid);
            }
        }

        self.held.entry(tid).or_default().insert(page_id);
        Ok(())
    }

    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.held
            .get(&tid)
            .map_or(false, |pages| pages.contains(&page_id))
    }

    pub fn holds_write_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.locks
            .get(&page_id)
            .map_or(false, |lock| lock.writer == Some(tid))
    }

    /// Returns whether any transaction holds the page.
    pub fn is_locked(&self, page_id: PageId) -> bool {
        self.locks.get(&page_id).map_or(false, |lock| !lock.is_free())
    }

    pub fn pages_locked_by(&self, tid: TransactionId) -> Vec<PageId> {
        self.held
            .get(&tid)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn release(&mut self, tid: TransactionId, page_id: PageId) {
        if let Some(lock) = self.locks.get_mut(&page_id) {
            lock.readers.remove(&tid);
            if lock.writer == Some(tid) {
                lock.writer = None;
            }
            if lock.is_free() {
                self.locks.remove(&page_id);
            }
        }
        if let Some(pages) = self.held.get_mut(&tid) {
            pages.remove(&page_id);
            if pages.is_empty() {
                self.held.remove(&tid);
            }
        }
    }

    /// Releases every page held by the transaction.
    pub fn release_all(&mut self, tid: TransactionId) {
        for page_id in self.pages_locked_by(tid) {
            self.release(tid, page_id);
        }
    }
}
