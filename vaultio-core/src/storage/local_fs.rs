use crate::error::{Result, VaultError};
use crate::storage::blob_backend::{BlobBackend, ByteStream};
use bytes::Bytes;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

/// Local filesystem blob backend.
///
/// Objects live directly under the configured root, one file per storage key.
/// Writes go to a temporary file first and are renamed into place, so a
/// failed put never leaves a partial object visible under the key.
pub struct LocalFsBackend {
    root: PathBuf,
}

impl LocalFsBackend {
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root).map_err(|e| {
            VaultError::StorageUnavailable(format!(
                "cannot create storage root {:?}: {}",
                root, e
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait::async_trait]
impl BlobBackend for LocalFsBackend {
    async fn put(&self, key: &str, _content_type: &str, data: Bytes) -> Result<String> {
        let blob_path = self.blob_path(key);
        let temp_path = self.root.join(format!("{}.tmp", key));

        // Write to temporary file first, then rename for atomicity
        let result: std::io::Result<()> = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&temp_path, &blob_path).await
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path).await;
            return Err(storage_error(key, e));
        }

        tracing::debug!("stored blob {} ({} bytes)", key, data.len());
        Ok(blob_path.display().to_string())
    }

    async fn get(&self, key: &str) -> Result<ByteStream> {
        let blob_path = self.blob_path(key);

        let file = fs::File::open(&blob_path)
            .await
            .map_err(|e| storage_error(key, e))?;

        Ok(Box::pin(ReaderStream::new(file)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let blob_path = self.blob_path(key);

        match fs::remove_file(&blob_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(key, e)),
        }
    }
}

/// Disk-space and permission errors map to "storage unavailable" (5xx-class),
/// a missing file to the distinct not-found condition.
fn storage_error(key: &str, e: std::io::Error) -> VaultError {
    if e.kind() == std::io::ErrorKind::NotFound {
        VaultError::BlobNotFound(key.to_string())
    } else {
        VaultError::StorageUnavailable(format!("local blob {}: {}", key, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    async fn collect(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(temp_dir.path().to_path_buf()).unwrap();

        let data = Bytes::from("hello vaultio");
        let location = backend
            .put("01ABC-report.pdf", "application/pdf", data.clone())
            .await
            .unwrap();
        assert!(location.ends_with("01ABC-report.pdf"));

        let body = backend.get("01ABC-report.pdf").await.unwrap();
        assert_eq!(collect(body).await, data.to_vec());
    }

    #[tokio::test]
    async fn test_put_leaves_no_temp_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(temp_dir.path().to_path_buf()).unwrap();

        backend
            .put("01ABC-a.bin", "application/octet-stream", Bytes::from("x"))
            .await
            .unwrap();

        assert!(temp_dir.path().join("01ABC-a.bin").exists());
        assert!(!temp_dir.path().join("01ABC-a.bin.tmp").exists());
    }

    #[tokio::test]
    async fn test_failed_put_leaves_nothing_under_key() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(temp_dir.path().to_path_buf()).unwrap();

        // Occupy the key with a directory so the final rename cannot succeed
        std::fs::create_dir(temp_dir.path().join("01ABC-c.txt")).unwrap();

        let err = backend
            .put("01ABC-c.txt", "text/plain", Bytes::from("partial"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, VaultError::StorageUnavailable(_)));

        // The temp file was cleaned up and no blob content appeared under
        // the key: a reader still finds no object there.
        assert!(!temp_dir.path().join("01ABC-c.txt.tmp").exists());
        assert!(temp_dir.path().join("01ABC-c.txt").is_dir());
        assert!(backend.get("01ABC-c.txt").await.is_err());
    }

    #[tokio::test]
    async fn test_get_missing_is_blob_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(temp_dir.path().to_path_buf()).unwrap();

        let err = backend.get("01ABC-nope.txt").await.err().unwrap();
        assert!(matches!(err, VaultError::BlobNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(temp_dir.path().to_path_buf()).unwrap();

        backend
            .put("01ABC-b.txt", "text/plain", Bytes::from("b"))
            .await
            .unwrap();
        backend.delete("01ABC-b.txt").await.unwrap();
        assert!(!temp_dir.path().join("01ABC-b.txt").exists());

        // Second delete of a missing object succeeds
        backend.delete("01ABC-b.txt").await.unwrap();
    }
}
