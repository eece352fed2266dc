pub mod buffer;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod execution;
pub mod storage;
pub mod transaction;
