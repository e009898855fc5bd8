//! File service operations for Vaultio
//!
//! Each operation owns its collaborators behind trait objects and exposes a
//! single `run` entrypoint with an explicit outcome type.

pub mod download_file;
pub mod upload_file;

pub use download_file::{DownloadFileOperation, DownloadedFile};
pub use upload_file::{
    StoredFile, UploadFileOperation, UploadFileRequest, UploadOutcome, UploadWarning,
};
