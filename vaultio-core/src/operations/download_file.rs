use crate::error::{Result, VaultError};
use crate::metadata::{FileIndex, FileRecord};
use crate::storage::{BlobBackend, ByteStream, storage_key};
use std::sync::Arc;

/// Download orchestration: resolve the record, recompute the storage key from
/// its fields, open the backend stream. The key is never taken from the
/// client, only the identifier is.
#[derive(Clone)]
pub struct DownloadFileOperation {
    backend: Arc<dyn BlobBackend>,
    index: Arc<dyn FileIndex>,
}

/// A resolved file ready to stream. Response headers come from the record,
/// bytes from the backend stream; dropping `body` aborts the transfer and
/// releases the underlying handle.
pub struct DownloadedFile {
    pub record: FileRecord,
    pub body: ByteStream,
}

impl DownloadFileOperation {
    pub fn new(backend: Arc<dyn BlobBackend>, index: Arc<dyn FileIndex>) -> Self {
        Self { backend, index }
    }

    pub async fn run(&self, file_id: &str) -> Result<DownloadedFile> {
        let record = self
            .index
            .find_by_id(file_id)?
            .ok_or_else(|| VaultError::FileNotFound(file_id.to_string()))?;

        let key = storage_key(&record.id, &record.original_name);

        let body = match self.backend.get(&key).await {
            Ok(stream) => stream,
            // A record without a blob is index/blob drift, not a plain 404
            Err(VaultError::BlobNotFound(_)) => {
                tracing::error!(
                    "file {} has a metadata record but no blob under key {}",
                    file_id,
                    key
                );
                return Err(VaultError::Integrity(format!(
                    "blob missing for file {} (key {})",
                    file_id, key
                )));
            }
            Err(e) => return Err(e),
        };

        tracing::debug!("streaming file {} as {}", file_id, record.original_name);
        Ok(DownloadedFile { record, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::UserDirectory;
    use crate::metadata::SqliteFileIndex;
    use crate::notify::Notifier;
    use crate::operations::upload_file::tests::{
        MemoryBackend, MemoryIndex, RecordingNotifier, StaticDirectory,
    };
    use crate::operations::{UploadFileOperation, UploadFileRequest};
    use crate::storage::LocalFsBackend;
    use bytes::Bytes;
    use futures_util::StreamExt;
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;

    async fn collect(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found_without_backend_call() {
        let backend = Arc::new(MemoryBackend::default());
        let index = Arc::new(MemoryIndex::default());
        let op = DownloadFileOperation::new(backend.clone(), index);

        let err = op.run("01UNKNOWN").await.err().unwrap();
        assert!(matches!(err, VaultError::FileNotFound(_)));
        assert_eq!(backend.get_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_record_without_blob_is_integrity_violation() {
        let backend = Arc::new(MemoryBackend::default());
        let index = Arc::new(MemoryIndex::default());
        index
            .insert(&FileRecord::new(
                "01ORPHAN".to_string(),
                "ghost.txt".to_string(),
                "text/plain".to_string(),
                3,
                "u1".to_string(),
            ))
            .unwrap();

        let op = DownloadFileOperation::new(backend, index);
        let err = op.run("01ORPHAN").await.err().unwrap();
        assert!(matches!(err, VaultError::Integrity(_)));
    }

    #[tokio::test]
    async fn test_upload_then_download_roundtrip_on_local_fs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend: Arc<dyn BlobBackend> =
            Arc::new(LocalFsBackend::new(temp_dir.path().join("blobs")).unwrap());
        let index: Arc<dyn FileIndex> =
            Arc::new(SqliteFileIndex::new(temp_dir.path().join("meta.db")).unwrap());
        let directory: Arc<dyn UserDirectory> = Arc::new(StaticDirectory {
            contacts: HashMap::from([("u1".to_string(), "u1@example.com".to_string())]),
        });
        let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::default());

        let upload = UploadFileOperation::new(
            backend.clone(),
            index.clone(),
            directory,
            notifier,
        );
        let download = DownloadFileOperation::new(backend, index);

        let payload: Vec<u8> = (0..4096).map(|i| (i % 251) as u8).collect();
        let outcome = upload
            .run(UploadFileRequest {
                data: Bytes::from(payload.clone()),
                original_name: "report.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
                owner_id: "u1".to_string(),
            })
            .await
            .unwrap();

        let downloaded = download.run(&outcome.file().id).await.unwrap();
        assert_eq!(downloaded.record.original_name, "report.pdf");
        assert_eq!(downloaded.record.mime_type, "application/pdf");
        assert_eq!(downloaded.record.size, payload.len() as u64);
        assert_eq!(collect(downloaded.body).await, payload);
    }
}
