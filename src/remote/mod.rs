//! Remote object store contract (§6).
//!
//! The core consumes exactly four operations — upload, download-by-name,
//! delete-version, and list — through this trait; everything else about
//! the backing object-storage client is opaque to the rest of the crate.

pub mod s3;

pub use s3::S3RemoteStore;

use crate::error::Result;
use async_trait::async_trait;

/// One entry returned by [`RemoteStore::list_file_names`].
#[derive(Debug, Clone)]
pub struct RemoteFileInfo {
    pub name: String,
    pub id: String,
    pub size: u64,
    pub upload_timestamp_ms: i64,
    /// The original file's modification time, if the uploader recorded
    /// one (`src_last_modified_millis`, §6).
    pub src_last_modified_ms: Option<i64>,
}

/// Result of a successful upload (§6).
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub id: String,
    pub name: String,
}

/// The four operations the core needs from an object-storage client.
/// Backed by `aws-sdk-s3` in this crate (see `s3.rs`); transient I/O
/// errors are retried inside the implementation and only surface here
/// after the implementation gives up (§7).
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Upload `data` under `name`, optionally tagging it with the
    /// original file's modification time so future index comparisons
    /// (§4.F) can use it.
    async fn upload(&self, data: &[u8], name: &str) -> Result<UploadResult>;

    /// Upload with an explicit `src_last_modified_millis` tag, used by
    /// the index factory when re-uploading the index file (§4.F).
    async fn upload_with_mod_time(
        &self,
        data: &[u8],
        name: &str,
        src_last_modified_ms: i64,
    ) -> Result<UploadResult> {
        let _ = src_last_modified_ms;
        self.upload(data, name).await
    }

    /// Download the full object named `name`.
    async fn download_by_name(&self, name: &str) -> Result<Vec<u8>>;

    /// Delete a specific version of an object. Implementations translate
    /// a "not found" response into [`crate::error::SyncError::RemoteNotPresent`]
    /// rather than a hard error, since callers treat that as success (§7).
    async fn delete_version(&self, id: &str, name: &str) -> Result<()>;

    /// List up to `limit` objects under `prefix`.
    async fn list_file_names(&self, prefix: &str, limit: usize) -> Result<Vec<RemoteFileInfo>>;

    /// Stat a single object by name, for the index factory's mtime
    /// comparison (§4.F step 2). Returns the object's recorded
    /// modification time in milliseconds, or `None` if it does not
    /// exist.
    async fn stat(&self, name: &str) -> Result<Option<i64>>;
}

/// An in-process [`RemoteStore`] backed by a `Mutex<HashMap>`, shared by
/// the test modules of `action`, `core`, and `index` so each one doesn't
/// grow its own throwaway double.
#[cfg(test)]
pub(crate) mod mock {
    use super::{RemoteFileInfo, RemoteStore, UploadResult};
    use crate::error::{Result, SyncError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    struct Object {
        data: Vec<u8>,
        mod_time_ms: i64,
    }

    /// Records every object ever uploaded under its name, with a
    /// monotonic id counter standing in for the remote store's own
    /// opaque identifiers.
    pub(crate) struct InMemoryRemote {
        objects: Mutex<HashMap<String, Object>>,
        next_id: AtomicU64,
    }

    impl InMemoryRemote {
        pub(crate) fn new() -> Self {
            Self {
                objects: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }
        }

        /// Seeds an object directly, as if a prior run had already
        /// uploaded it (used to test the index factory's startup
        /// comparison and download actions without going through
        /// `upload` first).
        pub(crate) fn seed(&self, name: &str, data: Vec<u8>, mod_time_ms: i64) {
            self.objects.lock().unwrap().insert(
                name.to_string(),
                Object { data, mod_time_ms },
            );
        }
    }

    #[async_trait]
    impl RemoteStore for InMemoryRemote {
        async fn upload(&self, data: &[u8], name: &str) -> Result<UploadResult> {
            self.upload_with_mod_time(data, name, 0).await
        }

        async fn upload_with_mod_time(
            &self,
            data: &[u8],
            name: &str,
            src_last_modified_ms: i64,
        ) -> Result<UploadResult> {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
            self.objects.lock().unwrap().insert(
                name.to_string(),
                Object {
                    data: data.to_vec(),
                    mod_time_ms: src_last_modified_ms,
                },
            );
            Ok(UploadResult {
                id,
                name: name.to_string(),
            })
        }

        async fn download_by_name(&self, name: &str) -> Result<Vec<u8>> {
            self.objects
                .lock()
                .unwrap()
                .get(name)
                .map(|o| o.data.clone())
                .ok_or_else(|| SyncError::RemoteNotPresent(name.to_string()))
        }

        async fn delete_version(&self, _id: &str, name: &str) -> Result<()> {
            let mut objects = self.objects.lock().unwrap();
            if objects.remove(name).is_some() {
                Ok(())
            } else {
                Err(SyncError::RemoteNotPresent(name.to_string()))
            }
        }

        async fn list_file_names(&self, prefix: &str, limit: usize) -> Result<Vec<RemoteFileInfo>> {
            let objects = self.objects.lock().unwrap();
            Ok(objects
                .iter()
                .filter(|(name, _)| name.starts_with(prefix))
                .take(limit)
                .map(|(name, o)| RemoteFileInfo {
                    name: name.clone(),
                    id: name.clone(),
                    size: o.data.len() as u64,
                    upload_timestamp_ms: o.mod_time_ms,
                    src_last_modified_ms: Some(o.mod_time_ms),
                })
                .collect())
        }

        async fn stat(&self, name: &str) -> Result<Option<i64>> {
            Ok(self.objects.lock().unwrap().get(name).map(|o| o.mod_time_ms))
        }
    }
}
