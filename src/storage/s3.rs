//! AWS S3 storage implementation.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;

use crate::error::{AppError, Result};
use crate::storage::BlobStore;

/// S3-backed blob store for the feed documents.
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    /// Create a new S3 storage instance.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Create S3 storage from a loaded SDK configuration.
    pub fn from_sdk_config(config: &aws_config::SdkConfig, bucket: &str) -> Result<Self> {
        if bucket.trim().is_empty() {
            return Err(AppError::config(
                "storage.bucket is empty (set BUCKET_NAME)",
            ));
        }
        Ok(Self::new(Client::new(config), bucket))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output.body.collect().await.map_err(AppError::storage)?;
                Ok(Some(bytes.into_bytes().to_vec()))
            }
            Err(err) => {
                // Check if it's a "not found" error
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    log::info!("No existing data at s3://{}/{}", self.bucket, key);
                    Ok(None)
                } else {
                    Err(AppError::storage(format!(
                        "get s3://{}/{}: {}",
                        self.bucket, key, service_err
                    )))
                }
            }
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                AppError::storage(format!(
                    "put s3://{}/{}: {}",
                    self.bucket,
                    key,
                    e.into_service_error()
                ))
            })?;
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}
