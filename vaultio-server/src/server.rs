use crate::config::{Config, StorageBackendKind};
use axum::{
    Router,
    body::Body,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use vaultio_core::{
    BlobBackend, DownloadFileOperation, FileIndex, LocalFsBackend, LogNotifier, Notifier,
    RemoteObjectBackend, RemoteObjectConfig, Result, SmtpNotifier, SqliteFileIndex,
    SqliteUserDirectory, UploadFileOperation, UploadFileRequest, UploadOutcome, UploadWarning,
    UserDirectory, VaultError,
};

const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

pub struct ServerState {
    pub upload: UploadFileOperation,
    pub download: DownloadFileOperation,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    succeed: bool,
    data: Option<T>,
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    file_id: String,
    location: String,
}

pub async fn run_server(config: Config) -> Result<()> {
    let index = Arc::new(SqliteFileIndex::new(config.database.path.clone())?);
    let directory: Arc<dyn UserDirectory> =
        Arc::new(SqliteUserDirectory::new(config.database.path.clone()));

    // Backend choice is fixed at startup; handlers only see the trait object.
    let backend: Arc<dyn BlobBackend> = match config.storage.backend {
        StorageBackendKind::Local => {
            let local = config.storage.local.as_ref().ok_or_else(|| {
                VaultError::Config("storage.local is required for the local backend".to_string())
            })?;
            tracing::info!("using local filesystem backend at {:?}", local.root);
            Arc::new(LocalFsBackend::new(local.root.clone())?)
        }
        StorageBackendKind::Remote => {
            let remote = config.storage.remote.as_ref().ok_or_else(|| {
                VaultError::Config("storage.remote is required for the remote backend".to_string())
            })?;
            tracing::info!("using remote object backend, bucket {}", remote.bucket);
            Arc::new(RemoteObjectBackend::new(RemoteObjectConfig {
                bucket: remote.bucket.clone(),
                region: remote.region.clone(),
                endpoint: remote.endpoint.clone(),
                access_key_id: remote.access_key_id.clone(),
                secret_access_key: remote.secret_access_key.clone(),
                op_timeout: remote.op_timeout(),
            })?)
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpNotifier::new(
            &smtp.relay,
            &smtp.username,
            &smtp.password,
            &smtp.sender,
        )?),
        None => {
            tracing::info!("no smtp relay configured, notifications will be logged only");
            Arc::new(LogNotifier)
        }
    };

    let index: Arc<dyn FileIndex> = index;
    let state = Arc::new(ServerState {
        upload: UploadFileOperation::new(
            backend.clone(),
            index.clone(),
            directory,
            notifier,
        ),
        download: DownloadFileOperation::new(backend, index),
    });

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/files", post(upload_file))
        .route("/files/:file_id", get(download_file))
        .layer(axum::extract::DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    tracing::info!("Server listening on {}", config.server.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "time": chrono::Utc::now().to_rfc3339(),
    });
    (StatusCode::OK, axum::Json(response))
}

async fn upload_file(
    State(state): State<Arc<ServerState>>,
    multipart: Multipart,
) -> Response {
    let request = match read_upload_form(multipart).await {
        Ok(r) => r,
        Err(e) => return error_response(&e),
    };

    match state.upload.run(request).await {
        Ok(outcome) => {
            let (file, warning) = match outcome {
                UploadOutcome::Stored(file) => (file, None),
                UploadOutcome::StoredWithWarning { file, warning } => {
                    (file, Some(warning_text(&warning)))
                }
            };
            let resp = ApiResponse {
                succeed: true,
                data: Some(UploadResponse {
                    file_id: file.id,
                    location: file.location,
                }),
                error: None,
                warning,
            };
            (StatusCode::OK, axum::Json(resp)).into_response()
        }
        Err(e) => error_response(&e),
    }
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadFileRequest> {
    let mut data: Option<Bytes> = None;
    let mut original_name = String::new();
    let mut mime_type = "application/octet-stream".to_string();
    let mut owner_id = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| VaultError::InvalidRequest(format!("malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if let Some(name) = field.file_name() {
                    original_name = name.to_string();
                }
                if let Some(content_type) = field.content_type() {
                    mime_type = content_type.to_string();
                }
                data = Some(field.bytes().await.map_err(|e| {
                    VaultError::InvalidRequest(format!("failed to read file part: {}", e))
                })?);
            }
            "user_id" => {
                owner_id = field.text().await.map_err(|e| {
                    VaultError::InvalidRequest(format!("failed to read user_id: {}", e))
                })?;
            }
            _ => {}
        }
    }

    let data = data.ok_or_else(|| VaultError::InvalidRequest("no file uploaded".to_string()))?;

    Ok(UploadFileRequest {
        data,
        original_name,
        mime_type,
        owner_id,
    })
}

async fn download_file(
    State(state): State<Arc<ServerState>>,
    Path(file_id): Path<String>,
) -> Response {
    let downloaded = match state.download.run(&file_id).await {
        Ok(d) => d,
        Err(e) => return error_response(&e),
    };

    let record = downloaded.record;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        disposition_filename(&record.original_name)
    );

    // Stream the body; once headers are committed a mid-stream backend error
    // aborts the connection and the client sees a truncated transfer.
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, record.mime_type)
        .header(header::CONTENT_LENGTH, record.size)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(downloaded.body));

    match response {
        Ok(r) => r,
        Err(e) => error_response(&VaultError::Internal(e.to_string())),
    }
}

/// Header-safe filename: keep the record's display name but drop characters
/// that would break the quoted-string.
fn disposition_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '"' | '\\' | '\r' | '\n'))
        .collect();
    if cleaned.is_empty() {
        "download".to_string()
    } else {
        cleaned
    }
}

fn warning_text(warning: &UploadWarning) -> String {
    match warning {
        UploadWarning::OwnerNotFound => {
            "uploaded, but owner notification skipped: owner not found".to_string()
        }
        UploadWarning::NotificationFailed(reason) => {
            format!("uploaded; notification failed: {}", reason)
        }
    }
}

fn error_response(e: &VaultError) -> Response {
    let status = match e {
        VaultError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        VaultError::FileNotFound(_) | VaultError::BlobNotFound(_) => StatusCode::NOT_FOUND,
        VaultError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        VaultError::StorageUnauthorized(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let resp = ApiResponse::<()> {
        succeed: false,
        data: None,
        error: Some(e.to_string()),
        warning: None,
    };
    (status, axum::Json(resp)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposition_filename_quoting() {
        assert_eq!(disposition_filename("report.pdf"), "report.pdf");
        assert_eq!(disposition_filename("we\"ird.txt"), "weird.txt");
        assert_eq!(disposition_filename(""), "download");
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (
                VaultError::InvalidRequest("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (VaultError::FileNotFound("x".into()), StatusCode::NOT_FOUND),
            (
                VaultError::StorageUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                VaultError::Integrity("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                VaultError::StorageUnauthorized("x".into()),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(error_response(&err).status(), expected);
        }
    }
}
