pub mod disk_manager;
pub mod heap_file;
pub mod page;
pub mod tuple;
pub mod types;
