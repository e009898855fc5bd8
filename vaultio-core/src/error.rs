use thiserror::Error;

pub type Result<T> = std::result::Result<T, VaultError>;

/// Closed error taxonomy for the gateway.
///
/// Hard failures abort the operation that raised them; `OwnerNotFound` and
/// `Notification` never surface as upload failures, they degrade the outcome
/// to a warning at the operation layer.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No metadata record exists for the identifier.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// The backend has no object under the given storage key.
    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    /// A metadata record exists but its blob is missing. Index/blob drift.
    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Backend rejected the credentials. Fatal, never retried.
    #[error("Storage unauthorized: {0}")]
    StorageUnauthorized(String),

    #[error("Duplicate file id: {0}")]
    DuplicateFileId(String),

    #[error("Owner not found: {0}")]
    OwnerNotFound(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Index error: {0}")]
    Index(#[from] rusqlite::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
