pub mod buffer_pool;
pub mod lock_table;
pub mod page_cache;
