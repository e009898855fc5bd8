use crate::error::{Result, VaultError};
use crate::storage::blob_backend::{BlobBackend, ByteStream};
use bytes::Bytes;
use futures_util::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RemoteObjectConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub op_timeout: Duration,
}

/// Remote object storage backend.
///
/// A single PUT per object, so atomicity comes from the store itself. Every
/// call carries a bounded timeout; a timeout surfaces as `StorageUnavailable`
/// and is therefore retryable at the service layer, while credential
/// rejections surface as the fatal `StorageUnauthorized`.
pub struct RemoteObjectBackend {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    op_timeout: Duration,
}

impl RemoteObjectBackend {
    pub fn new(config: RemoteObjectConfig) -> Result<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint).with_allow_http(true);
        }

        let store = builder
            .build()
            .map_err(|e| VaultError::Config(format!("remote object store: {}", e)))?;

        Ok(Self {
            store: Arc::new(store),
            bucket: config.bucket,
            op_timeout: config.op_timeout,
        })
    }

    async fn bounded<T>(
        &self,
        op: &str,
        key: &str,
        fut: impl std::future::Future<Output = object_store::Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(|e| remote_error(key, e)),
            Err(_) => Err(VaultError::StorageUnavailable(format!(
                "remote {} of {} timed out after {:?}",
                op, key, self.op_timeout
            ))),
        }
    }
}

#[async_trait::async_trait]
impl BlobBackend for RemoteObjectBackend {
    async fn put(&self, key: &str, content_type: &str, data: Bytes) -> Result<String> {
        let path = ObjectPath::from(key);

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };

        let size = data.len();
        self.bounded("put", key, self.store.put_opts(&path, PutPayload::from(data), opts))
            .await?;

        tracing::debug!("stored blob {} in bucket {} ({} bytes)", key, self.bucket, size);
        Ok(format!("s3://{}/{}", self.bucket, key))
    }

    async fn get(&self, key: &str) -> Result<ByteStream> {
        let path = ObjectPath::from(key);
        let result = self.bounded("get", key, self.store.get(&path)).await?;

        let stream = result
            .into_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));
        Ok(Box::pin(stream))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = ObjectPath::from(key);
        match self.bounded("delete", key, self.store.delete(&path)).await {
            Ok(()) => Ok(()),
            Err(VaultError::BlobNotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn remote_error(key: &str, e: object_store::Error) -> VaultError {
    match e {
        object_store::Error::NotFound { .. } => VaultError::BlobNotFound(key.to_string()),
        object_store::Error::Unauthenticated { .. } | object_store::Error::PermissionDenied { .. } => {
            VaultError::StorageUnauthorized(e.to_string())
        }
        other => VaultError::StorageUnavailable(format!("remote blob {}: {}", key, other)),
    }
}
