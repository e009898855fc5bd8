//! Storage modules for Vaultio
//!
//! Provides the blob backend abstraction and its two implementations:
//! local filesystem and remote object storage.

pub mod blob_backend;
pub mod local_fs;
pub mod remote_object;

pub use blob_backend::{BlobBackend, ByteStream, storage_key};
pub use local_fs::LocalFsBackend;
pub use remote_object::{RemoteObjectBackend, RemoteObjectConfig};
