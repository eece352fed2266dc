use crate::catalog::TableId;
use crate::error::Result;
use crate::storage::page::{HeapPage, PageId};
use crate::storage::tuple::Tuple;
use crate::transaction::TransactionId;
use parking_lot::RwLock;
use std::sync::Arc;

/// A handle to a cached page. Handles to the same page id share one in-memory page.
pub type PageRef = Arc<RwLock<HeapPage>>;

/// The access a transaction requests on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}

/// Mediates every page access made on behalf of a transaction.
pub trait PageCache: Send + Sync {
    /// Returns the page, reading it from its heap file if it is not cached yet.
    /// Fails if the permission cannot be granted to the transaction.
    fn fetch_page(
        &self,
        tid: TransactionId,
        page_id: PageId,
        perm: Permissions,
    ) -> Result<PageRef>;

    /// Adds the tuple to the table, marking every page it touched as dirtied by `tid`.
    fn insert_tuple(&self, tid: TransactionId, table_id: TableId, tuple: Tuple) -> Result<()>;

    /// Removes the tuple from the table its record id points into.
    fn delete_tuple(&self, tid: TransactionId, tuple: &mut Tuple) -> Result<()>;
}
