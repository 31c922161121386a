//! S3 / MinIO reader and writer.

use super::{join_key, DataWriter};
use crate::config::S3BucketConfig;
use crate::error::MarkifyError;
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};

/// Build a client from per-bucket credentials.
pub fn client_for(config: &S3BucketConfig) -> Client {
    let credentials = Credentials::new(
        &config.access_key,
        &config.secret_key,
        None,
        None,
        "markify",
    );

    let mut builder = aws_sdk_s3::Config::builder()
        .credentials_provider(credentials)
        .region(Region::new(config.region.clone()))
        .behavior_version_latest();

    // MinIO and friends
    if let Some(endpoint) = &config.endpoint {
        builder = builder.endpoint_url(endpoint).force_path_style(true);
    }

    Client::from_conf(builder.build())
}

/// Reads whole objects from one bucket.
#[derive(Debug, Clone)]
pub struct S3Reader {
    client: Client,
    bucket: String,
}

impl S3Reader {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub async fn read(&self, key: &str) -> Result<Vec<u8>, MarkifyError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let detail = e.to_string();
                if detail.contains("NoSuchKey") {
                    MarkifyError::FileNotFound {
                        path: format!("s3://{}/{}", self.bucket, key).into(),
                    }
                } else {
                    self.error(detail)
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| self.error(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn error(&self, detail: String) -> MarkifyError {
        MarkifyError::S3 {
            bucket: self.bucket.clone(),
            detail,
        }
    }
}

/// Writes objects below a key prefix in one bucket.
#[derive(Debug, Clone)]
pub struct S3Writer {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Writer {
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Object key `path` is stored under.
    pub fn key_of(&self, path: &str) -> String {
        join_key(&self.prefix, path)
    }
}

#[async_trait]
impl DataWriter for S3Writer {
    async fn write(&self, path: &str, data: &[u8]) -> Result<(), MarkifyError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.key_of(path))
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| MarkifyError::S3 {
                bucket: self.bucket.clone(),
                detail: e.to_string(),
            })?;
        Ok(())
    }

    fn location(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.prefix)
    }
}
