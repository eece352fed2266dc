use crate::buffer::buffer_pool::BufferPool;
use crate::buffer::page_cache::PageCache;
use crate::catalog::{Catalog, TableId};
use crate::config::DbConfig;
use crate::error::Result;
use crate::storage::heap_file::HeapFile;
use crate::storage::tuple::TupleDesc;
use crate::transaction::TransactionId;
use std::path::Path;
use std::sync::Arc;

/// A database instance: its settings, its tables and the buffer pool through
/// which every page is read and written.
pub struct Database {
    config: DbConfig,
    catalog: Arc<Catalog>,
    buffer_pool: Arc<BufferPool>,
}

impl Database {
    pub fn new(config: DbConfig) -> Result<Database> {
        config.validate()?;
        let catalog = Arc::new(Catalog::new());
        let buffer_pool = Arc::new(BufferPool::new(config.buffer_pool_pages, catalog.clone()));
        log::debug!("created database with {:?}", config);

        Ok(Database {
            config,
            catalog,
            buffer_pool,
        })
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.buffer_pool
    }

    /// The buffer pool as the page cache handed to operators.
    pub fn page_cache(&self) -> Arc<dyn PageCache> {
        self.buffer_pool.clone()
    }

    /// Opens (or creates) the heap file at `path` and registers it as table `name`.
    pub fn open_table<P: AsRef<Path>>(
        &self,
        path: P,
        schema: Arc<TupleDesc>,
        name: &str,
    ) -> Result<TableId> {
        let file = HeapFile::open(path, schema, self.config.page_size)?;
        Ok(self.catalog.add_table(file, name))
    }

    pub fn new_transaction(&self) -> TransactionId {
        TransactionId::new()
    }

    pub fn commit(&self, tid: TransactionId) -> Result<()> {
        self.buffer_pool.transaction_complete(tid, true)
    }

    pub fn abort(&self, tid: TransactionId) -> Result<()> {
        self.buffer_pool.transaction_complete(tid, false)
    }

    /// Writes every dirty page out, committed or not.
    pub fn close(self) -> Result<()> {
        self.buffer_pool.flush_all_pages()
    }
}
