use std::path::Path;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::{Client, primitives::ByteStream};
use runsim_core::{BlobStore, CoreError, ObjectKey};
use tracing::{debug, info};

use crate::error::AwsError;

/// Public URL of `key` in `bucket`.
pub fn public_url(bucket: &str, key: &ObjectKey) -> String {
    format!("https://{bucket}.s3.amazonaws.com/{key}")
}

fn key_from_public_url(bucket: &str, url: &str) -> Result<ObjectKey, CoreError> {
    let base = format!("https://{bucket}.s3.amazonaws.com/");
    url.strip_prefix(&base)
        .ok_or_else(|| CoreError::InvalidKey(url.to_string()))
        .and_then(ObjectKey::parse)
}

fn find_bucket<'a>(names: impl IntoIterator<Item = &'a str>, prefix: &str) -> Option<&'a str> {
    names.into_iter().find(|name| name.contains(prefix))
}

pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Use the first bucket whose name contains `prefix`.
    pub async fn discover(config: &SdkConfig, prefix: &str) -> Result<Self, AwsError> {
        let client = Client::new(config);
        let out = client
            .list_buckets()
            .send()
            .await
            .map_err(AwsError::sdk("s3:ListBuckets"))?;

        let bucket = find_bucket(out.buckets().iter().filter_map(|b| b.name()), prefix)
            .ok_or_else(|| AwsError::BucketNotFound(prefix.to_string()))?
            .to_string();
        info!(target: "runsim.aws", %bucket, "upload bucket selected");
        Ok(Self::new(client, bucket))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Inverse of the URLs returned by [`BlobStore::put`].
    pub fn key_from_url(&self, url: &str) -> Result<ObjectKey, CoreError> {
        key_from_public_url(&self.bucket, url)
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &ObjectKey, file: &Path) -> Result<String, CoreError> {
        let upload_err = |e: AwsError| CoreError::Upload {
            key: key.to_string(),
            reason: e.to_string(),
        };

        let body = ByteStream::from_path(file)
            .await
            .map_err(AwsError::sdk("read upload body"))
            .map_err(upload_err)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key.to_string())
            .body(body)
            .send()
            .await
            .map_err(AwsError::sdk("s3:PutObject"))
            .map_err(upload_err)?;

        debug!(target: "runsim.aws", bucket = %self.bucket, %key, "object stored");
        Ok(public_url(&self.bucket, key))
    }
}
