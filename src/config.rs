use crate::error::{DbError, Result};

/// The size of a page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// The number of pages the buffer pool caches unless configured otherwise.
pub const DEFAULT_POOL_PAGES: usize = 50;

/// Settings fixed for the lifetime of a database instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub page_size: usize,
    pub buffer_pool_pages: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig {
            page_size: DEFAULT_PAGE_SIZE,
            buffer_pool_pages: DEFAULT_POOL_PAGES,
        }
    }
}

impl DbConfig {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_buffer_pool_pages(mut self, pages: usize) -> Self {
        self.buffer_pool_pages = pages;
        self
    }

    pub fn validate(&self) -> Result<()> {
        // A page must hold at least one header byte and one slot bit.
        if self.page_size < 2 {
            return Err(DbError::InvalidArgument(format!(
                "page size {} is too small",
                self.page_size
            )));
        }
        if self.buffer_pool_pages == 0 {
            return Err(DbError::InvalidArgument(
                "buffer pool must hold at least one page".to_string(),
            ));
        }
        Ok(())
    }
}
