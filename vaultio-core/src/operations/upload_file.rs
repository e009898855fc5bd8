use crate::directory::UserDirectory;
use crate::error::{Result, VaultError};
use crate::metadata::{FileIndex, FileRecord};
use crate::notify::Notifier;
use crate::storage::BlobBackend;
use bytes::Bytes;
use std::sync::Arc;
use ulid::Ulid;

const NOTIFY_SUBJECT: &str = "File Upload Notification";

/// Upload orchestration.
///
/// Linear state machine with a compensating-action policy: the blob write is
/// the first durable step, the index insert the committing one. An index
/// failure after a successful blob write triggers a best-effort delete of the
/// just-written blob; the delete outcome is logged and never changes the
/// error reported to the caller. Owner resolution and notification run after
/// the commit point and can only degrade the outcome to a warning.
#[derive(Clone)]
pub struct UploadFileOperation {
    backend: Arc<dyn BlobBackend>,
    index: Arc<dyn FileIndex>,
    directory: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
}

#[derive(Debug, Clone)]
pub struct UploadFileRequest {
    pub data: Bytes,
    pub original_name: String,
    pub mime_type: String,
    pub owner_id: String,
}

/// Handle returned to the caller on any committed upload.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub id: String,
    pub location: String,
}

#[derive(Debug, Clone)]
pub enum UploadWarning {
    /// The owner id did not resolve to a contact. The file is stored and
    /// retrievable regardless.
    OwnerNotFound,
    NotificationFailed(String),
}

#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Stored(StoredFile),
    StoredWithWarning {
        file: StoredFile,
        warning: UploadWarning,
    },
}

impl UploadOutcome {
    pub fn file(&self) -> &StoredFile {
        match self {
            Self::Stored(file) => file,
            Self::StoredWithWarning { file, .. } => file,
        }
    }
}

impl UploadFileOperation {
    pub fn new(
        backend: Arc<dyn BlobBackend>,
        index: Arc<dyn FileIndex>,
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            backend,
            index,
            directory,
            notifier,
        }
    }

    pub async fn run(&self, request: UploadFileRequest) -> Result<UploadOutcome> {
        if request.data.is_empty() {
            return Err(VaultError::InvalidRequest("no file payload".to_string()));
        }
        if request.owner_id.trim().is_empty() {
            return Err(VaultError::InvalidRequest("no owner id".to_string()));
        }

        let id = Ulid::new().to_string();
        let record = FileRecord::new(
            id.clone(),
            request.original_name.clone(),
            request.mime_type.clone(),
            request.data.len() as u64,
            request.owner_id.clone(),
        );

        // First durable step. On failure nothing exists yet, so the whole
        // upload is safe to retry.
        let location = self
            .backend
            .put(&record.storage_key, &request.mime_type, request.data)
            .await?;

        // Commit point. The blob is orphaned if this fails, so compensate.
        if let Err(index_err) = self.index.insert(&record) {
            tracing::error!(
                "index insert failed for file {} after blob write: {}",
                id,
                index_err
            );
            if let Err(delete_err) = self.backend.delete(&record.storage_key).await {
                tracing::warn!(
                    "failed to delete orphaned blob {}: {}",
                    record.storage_key,
                    delete_err
                );
            }
            return Err(index_err);
        }

        tracing::info!(
            "stored file {} ({}, {} bytes) for owner {}",
            id,
            record.original_name,
            record.size,
            record.owner_id
        );

        let file = StoredFile {
            id,
            location: location.clone(),
        };

        // Past the commit point: owner lookup and notification can only
        // degrade the outcome to a warning.
        let contact = match self.directory.resolve_owner(&request.owner_id).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                tracing::warn!(
                    "owner {} not found; skipping notification for file {}",
                    request.owner_id,
                    file.id
                );
                return Ok(UploadOutcome::StoredWithWarning {
                    file,
                    warning: UploadWarning::OwnerNotFound,
                });
            }
            Err(e) => {
                tracing::warn!(
                    "owner lookup for {} failed ({}); skipping notification for file {}",
                    request.owner_id,
                    e,
                    file.id
                );
                return Ok(UploadOutcome::StoredWithWarning {
                    file,
                    warning: UploadWarning::OwnerNotFound,
                });
            }
        };

        let body = format!(
            "Hello, your file \"{}\" has been successfully uploaded. View it here: {}",
            request.original_name, location
        );

        if let Err(e) = self
            .notifier
            .notify(&contact.email_address, NOTIFY_SUBJECT, &body)
            .await
        {
            tracing::warn!("notification for file {} failed: {}", file.id, e);
            return Ok(UploadOutcome::StoredWithWarning {
                file,
                warning: UploadWarning::NotificationFailed(e.to_string()),
            });
        }

        Ok(UploadOutcome::Stored(file))
    }
}
