//! `PathEntity`/`FileVersion`: the in-memory view of one local or remote
//! file or directory, independent of which folder produced it (§3).
//!
//! Grounded on `original_source/sync/path_entity.py`. `versions` keeps
//! the original's "most recent first" shape even though neither folder
//! type in this crate ever produces more than one version — the local
//! filesystem has no version history and the secure index keeps a
//! single row per path — so `versions[0]` is always authoritative.

use std::cmp::Ordering;

/// One version of a file's content as seen by a folder.
#[derive(Debug, Clone)]
pub struct FileVersion {
    /// Opaque identifier: full local path for `LocalFolder`, remote
    /// object id for `SecureFolder`.
    pub id: String,
    pub size: u64,
    /// Milliseconds since epoch.
    pub mod_time: i64,
    pub hash: Option<String>,
}

impl FileVersion {
    pub fn new(id: impl Into<String>, size: u64, mod_time: i64, hash: Option<String>) -> Self {
        Self {
            id: id.into(),
            size,
            mod_time,
            hash,
        }
    }
}

/// One file or directory as seen by a folder implementation.
#[derive(Debug, Clone)]
pub struct PathEntity {
    /// Path usable for access: full local path, or the encrypted remote
    /// name for a `SecureFolder` entity.
    pub native_path: String,
    /// Normalized, forward-slash-separated path relative to the
    /// folder's root, used for cross-folder comparison.
    pub relative_path: String,
    pub is_dir: bool,
    /// Most recent first; `versions[0]` is authoritative.
    pub versions: Vec<FileVersion>,
}

impl PathEntity {
    pub fn new(
        native_path: impl Into<String>,
        relative_path: impl Into<String>,
        is_dir: bool,
        versions: Vec<FileVersion>,
    ) -> Self {
        Self {
            native_path: native_path.into(),
            relative_path: relative_path.into(),
            is_dir,
            versions,
        }
    }

    pub fn latest_version(&self) -> &FileVersion {
        &self.versions[0]
    }

    pub fn latest_version_mut(&mut self) -> &mut FileVersion {
        &mut self.versions[0]
    }

    fn sort_key(&self) -> String {
        self.relative_path.to_lowercase()
    }
}

impl PartialEq for PathEntity {
    fn eq(&self, other: &Self) -> bool {
        self.is_dir == other.is_dir && self.sort_key() == other.sort_key()
    }
}

impl Eq for PathEntity {}

impl PartialOrd for PathEntity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PathEntity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}
