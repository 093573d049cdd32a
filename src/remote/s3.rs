//! S3-compatible backend for [`RemoteStore`].
//!
//! Built directly against `aws-sdk-s3` rather than shelling out to the
//! `aws` CLI — the teacher's `storage/s3.rs` declared the SDK as a
//! dependency but never actually called it, driving every operation
//! through `std::process::Command` instead. That indirection buys
//! nothing here and loses typed errors, so this backend talks to the
//! SDK directly (see DESIGN.md).

use super::{RemoteFileInfo, RemoteStore, UploadResult};
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

const MOD_TIME_METADATA_KEY: &str = "src-last-modified-millis";

/// Object-storage client backing [`RemoteStore`] with a single S3
/// (or S3-compatible, e.g. Backblaze B2's S3 API) bucket.
pub struct S3RemoteStore {
    client: Client,
    bucket: String,
}

impl S3RemoteStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the ambient AWS configuration (environment,
    /// shared config file, or instance profile) — the same discovery
    /// chain `aws-config` always uses.
    pub async fn from_env(bucket: impl Into<String>, endpoint_url: Option<String>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(endpoint) = endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;
        Self::new(Client::new(&config), bucket)
    }

    fn is_not_found(err: &aws_sdk_s3::error::SdkError<impl std::error::Error>) -> bool {
        err.to_string().contains("NotFound") || err.to_string().contains("NoSuchKey")
    }
}

#[async_trait]
impl RemoteStore for S3RemoteStore {
    async fn upload(&self, data: &[u8], name: &str) -> Result<UploadResult> {
        let body = ByteStream::from(data.to_vec());
        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .body(body)
            .send()
            .await
            .map_err(|e| SyncError::remote(format!("upload {name} failed: {e}")))?;

        Ok(UploadResult {
            id: output.version_id().unwrap_or(name).to_string(),
            name: name.to_string(),
        })
    }

    async fn upload_with_mod_time(
        &self,
        data: &[u8],
        name: &str,
        src_last_modified_ms: i64,
    ) -> Result<UploadResult> {
        let body = ByteStream::from(data.to_vec());
        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .body(body)
            .metadata(MOD_TIME_METADATA_KEY, src_last_modified_ms.to_string())
            .send()
            .await
            .map_err(|e| SyncError::remote(format!("upload {name} failed: {e}")))?;

        Ok(UploadResult {
            id: output.version_id().unwrap_or(name).to_string(),
            name: name.to_string(),
        })
    }

    async fn download_by_name(&self, name: &str) -> Result<Vec<u8>> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
            .map_err(|e| SyncError::remote(format!("download {name} failed: {e}")))?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| SyncError::remote(format!("reading {name} body failed: {e}")))?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn delete_version(&self, _id: &str, name: &str) -> Result<()> {
        let result = self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if Self::is_not_found(&e) => {
                Err(SyncError::RemoteNotPresent(name.to_string()))
            }
            Err(e) => Err(SyncError::remote(format!("delete {name} failed: {e}"))),
        }
    }

    async fn list_file_names(&self, prefix: &str, limit: usize) -> Result<Vec<RemoteFileInfo>> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .max_keys(limit as i32)
            .send()
            .await
            .map_err(|e| SyncError::remote(format!("list {prefix} failed: {e}")))?;

        let mut results = Vec::new();
        for object in output.contents() {
            let name = object.key().unwrap_or_default().to_string();
            let size = object.size().unwrap_or(0).max(0) as u64;
            let upload_timestamp_ms = object
                .last_modified()
                .map(|t| t.as_secs_f64() as i64 * 1000)
                .unwrap_or(0);
            results.push(RemoteFileInfo {
                id: name.clone(),
                name,
                size,
                upload_timestamp_ms,
                src_last_modified_ms: None,
            });
        }
        Ok(results)
    }

    async fn stat(&self, name: &str) -> Result<Option<i64>> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await;

        match result {
            Ok(output) => {
                if let Some(raw) = output.metadata().and_then(|m| m.get(MOD_TIME_METADATA_KEY)) {
                    if let Ok(ms) = raw.parse::<i64>() {
                        return Ok(Some(ms));
                    }
                }
                let fallback = output
                    .last_modified()
                    .map(|t| t.as_secs_f64() as i64 * 1000)
                    .unwrap_or(0);
                Ok(Some(fallback))
            }
            Err(e) if Self::is_not_found(&e) => Ok(None),
            Err(e) => Err(SyncError::remote(format!("stat {name} failed: {e}"))),
        }
    }
}
