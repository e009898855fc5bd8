use crate::error::Result;
use bytes::Bytes;
use futures_util::Stream;
use std::pin::Pin;

/// Boxed asynchronous byte stream returned by `BlobBackend::get`.
///
/// The stream is lazy, finite and non-restartable. Dropping it releases the
/// underlying file handle or network connection, so a consumer that aborts
/// mid-transfer only has to drop it.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Storage backend abstraction over raw byte blobs keyed by a storage key.
///
/// Selected once at startup; the file service holds an `Arc<dyn BlobBackend>`
/// and never branches on the concrete backend type.
#[async_trait::async_trait]
pub trait BlobBackend: Send + Sync {
    /// Store `data` under `key` and return the backend location (URL or path).
    ///
    /// Atomic from the caller's perspective: either the full payload is stored
    /// and a location is returned, or the call fails and no partial object is
    /// visible under `key`.
    async fn put(&self, key: &str, content_type: &str, data: Bytes) -> Result<String>;

    /// Open a byte stream for the object under `key`.
    ///
    /// Returns `VaultError::BlobNotFound` when the object is absent, so
    /// callers can distinguish "absent" from "present but unreadable".
    async fn get(&self, key: &str) -> Result<ByteStream>;

    /// Delete the object under `key`. Idempotent on missing objects.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Derive the storage key for a file: `"{id}-{name}"`.
///
/// Both the upload and download paths call this with fields from the metadata
/// record, never with client-supplied raw key input. The name component is
/// reduced to its final path segment so a hostile original name cannot
/// traverse out of the backend root.
pub fn storage_key(id: &str, original_name: &str) -> String {
    format!("{}-{}", id, sanitize_file_name(original_name))
}

fn sanitize_file_name(name: &str) -> String {
    let candidate = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if candidate.is_empty() || candidate == "." || candidate == ".." {
        "unnamed".to_string()
    } else {
        candidate.to_string()
    }
}
