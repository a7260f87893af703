//! # Storage and Persistence
//!
//! Backing media for config stores: SQLite tables for the database driver
//! and disks for the filesystem driver.

pub mod disk;
pub mod pool;
pub mod record;
pub mod table;

pub use disk::{encode_segment, validate_blob_path, Disk, LocalDisk, MemoryDisk};
pub use pool::{create_pool, DbPool};
pub use record::RecordKey;
pub use table::{validate_table_name, ConfigTable, MemoryConfigTable, SqlConfigTable};
