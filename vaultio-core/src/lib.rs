//! Vaultio Core - Core library for the Vaultio file storage gateway
//!
//! A file storage gateway that:
//! - Persists uploads to one of two interchangeable blob backends
//!   (remote object storage or local filesystem)
//! - Records per-file metadata in a SQLite index
//! - Serves retrieval by identifier with backend-appropriate streaming
//! - Notifies file owners on upload, best-effort

pub mod directory;
pub mod error;
pub mod metadata;
pub mod notify;
pub mod operations;
pub mod storage;

pub use directory::{OwnerContact, SqliteUserDirectory, UserDirectory};
pub use error::{Result, VaultError};
pub use metadata::{FileIndex, FileRecord, SqliteFileIndex};
pub use notify::{LogNotifier, Notifier, SmtpNotifier};
pub use operations::{
    DownloadFileOperation, DownloadedFile, StoredFile, UploadFileOperation, UploadFileRequest,
    UploadOutcome, UploadWarning,
};
pub use storage::{
    BlobBackend, ByteStream, LocalFsBackend, RemoteObjectBackend, RemoteObjectConfig, storage_key,
};
