//! `SecureFolder`: a view of the secure index as a folder (§4.E).
//!
//! Grounded on `original_source/sync/folder.py`'s `SecureFolder`: walks
//! the index's already-sorted `get_all()` view, bounded to entries
//! whose path starts with this folder's prefix, skipping rows whose
//! `status` is `Uploading` — those represent an in-flight upload, not
//! yet a real remote object, so surfacing them here would make the
//! diff engine think the file already exists remotely.

use crate::error::Result;
use crate::folder::path_entity::{FileVersion, PathEntity};
use crate::folder::{Folder, FolderKind};
use crate::index::{EntryStatus, IndexEntry, SecureIndex};
use crate::progress::ProgressReporter;
use std::sync::Arc;

/// Folder interface backed by the secure index rather than a real
/// directory; every path it reports is one the index already knows the
/// remote identity of.
pub struct SecureFolder {
    /// Normalized, trailing-slash prefix this view is scoped to (empty
    /// string for the whole bucket).
    prefix: String,
    index: Arc<SecureIndex>,
}

impl SecureFolder {
    pub fn new(prefix: impl Into<String>, index: Arc<SecureIndex>) -> Self {
        let mut prefix = prefix.into().replace('\\', "/");
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self { prefix, index }
    }

    fn to_entity(&self, entry: &IndexEntry) -> PathEntity {
        let version = FileVersion::new(
            entry.remote_id.clone().unwrap_or_default(),
            entry.size,
            entry.mod_time,
            entry.hash.clone(),
        );
        PathEntity::new(
            entry.remote_name.clone().unwrap_or_default(),
            entry.path.clone(),
            entry.is_dir,
            vec![version],
        )
    }
}

impl Folder for SecureFolder {
    fn kind(&self) -> FolderKind {
        FolderKind::Secure
    }

    fn all_files(&self, _reporter: &ProgressReporter) -> Result<Vec<PathEntity>> {
        let prefix_lower = self.prefix.to_lowercase();
        let mut out = Vec::new();

        for entry in self.index.get_all() {
            if !prefix_lower.is_empty() {
                let key = entry.path.to_lowercase();
                if key < prefix_lower {
                    continue;
                }
                if !key.starts_with(&prefix_lower) {
                    break;
                }
            }
            if entry.status == EntryStatus::Uploading {
                continue;
            }
            out.push(self.to_entity(&entry));
        }
        Ok(out)
    }

    fn full_path_for(&self, entity: &PathEntity) -> String {
        if self.prefix.is_empty() {
            entity.relative_path.clone()
        } else {
            format!("{}{}", self.prefix, entity.relative_path)
        }
    }

    fn update_hash(&self, entity: &mut PathEntity) -> Result<Option<String>> {
        if entity.latest_version().hash.is_none() {
            if let Some(indexed) = self.index.get(&entity.relative_path) {
                entity.latest_version_mut().hash = indexed.hash;
            }
        }
        Ok(entity.latest_version().hash.clone())
    }
}
