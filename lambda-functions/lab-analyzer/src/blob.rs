use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use tracing::info;

use crate::error::MedicalAgentError;

/// Read access to uploaded lab result documents.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get_text(&self, bucket: &str, key: &str) -> Result<String, MedicalAgentError>;
}

pub struct S3BlobStore {
    client: S3Client,
}

impl S3BlobStore {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn get_text(&self, bucket: &str, key: &str) -> Result<String, MedicalAgentError> {
        info!("Retrieving S3 object: {}/{}", bucket, key);

        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                MedicalAgentError::upstream(format!(
                    "get_object s3://{}/{} failed: {}",
                    bucket,
                    key,
                    aws_sdk_s3::error::DisplayErrorContext(&e)
                ))
            })?;

        let bytes = output.body.collect().await.map_err(|e| {
            MedicalAgentError::upstream(format!("reading s3://{}/{} failed: {}", bucket, key, e))
        })?;

        String::from_utf8(bytes.into_bytes().to_vec()).map_err(|e| {
            MedicalAgentError::data_missing(format!("s3://{}/{} is not UTF-8: {}", bucket, key, e))
        })
    }
}
