//! Metadata index for Vaultio
//!
//! Durable mapping from file identifier to descriptive record.

pub mod file_index;

pub use file_index::{FileIndex, FileRecord, SqliteFileIndex};
