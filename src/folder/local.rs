//! `LocalFolder`: a directory on the local filesystem (§4.E).
//!
//! Grounded on `original_source/sync/folder.py`'s
//! `LocalFolder.__walk_relative_paths` for the walk order and error
//! handling, generalizing the teacher's `fs/scanner.rs` (`Scanner`,
//! case-insensitive ordering) from an eager `Vec<FileEntry>` scan into
//! the lazy, reporter-aware `Folder` contract this crate needs.

use crate::error::{IoResultExt, Result};
use crate::folder::{normalize_relative_path, Folder, FolderKind, DOWNLOAD_TEMP_SUFFIX};
use crate::folder::path_entity::{FileVersion, PathEntity};
use crate::progress::ProgressReporter;
use crate::stream::hash::HashAlgorithm;
use crate::stream::pull::{PullRead, ReaderSource};
use crate::stream::HashStream;
use std::fs;
use std::path::{Path, PathBuf};

/// Interface to a directory on the local machine.
pub struct LocalFolder {
    root: PathBuf,
}

impl LocalFolder {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let root = fs::canonicalize(path.as_ref()).with_path(path.as_ref())?;
        Ok(Self { root })
    }

    /// Creates the root directory if it does not already exist.
    pub fn ensure_present(&self) -> Result<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root).with_path(&self.root)?;
        } else if !self.root.is_dir() {
            return Err(crate::error::SyncError::config(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        Ok(())
    }

    fn walk(
        &self,
        dir: &Path,
        reporter: &ProgressReporter,
        out: &mut Vec<PathEntity>,
    ) -> Result<()> {
        let mut children: Vec<(PathBuf, bool, String)> = Vec::new();

        let read_dir = match fs::read_dir(dir) {
            Ok(rd) => rd,
            Err(_) => {
                reporter.local_access_error(&dir.to_string_lossy());
                return Ok(());
            }
        };

        for entry in read_dir {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => {
                    reporter.local_access_error(&dir.to_string_lossy());
                    continue;
                }
            };
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.ends_with(DOWNLOAD_TEMP_SUFFIX) {
                continue;
            }

            let full_path = entry.path();
            if !full_path.exists() {
                reporter.local_access_error(&full_path.to_string_lossy());
                continue;
            }

            let metadata = match fs::symlink_metadata(&full_path) {
                Ok(m) => m,
                Err(_) => {
                    reporter.local_permission_error(&full_path.to_string_lossy());
                    continue;
                }
            };

            if metadata.is_symlink() && fs::metadata(&full_path).is_err() {
                reporter.local_access_error(&full_path.to_string_lossy());
                continue;
            }

            let is_dir = full_path.is_dir();
            let sort_path = full_path.to_string_lossy().replace('\\', "/").to_lowercase();
            children.push((full_path, is_dir, sort_path));
        }

        children.sort_by(|a, b| a.2.cmp(&b.2));

        for (full_path, is_dir, _) in children {
            match self.make_path_entity(&full_path, is_dir) {
                Ok(entity) => {
                    out.push(entity);
                    if is_dir {
                        self.walk(&full_path, reporter, out)?;
                    }
                }
                Err(_) => reporter.local_permission_error(&full_path.to_string_lossy()),
            }
        }

        Ok(())
    }

    fn make_path_entity(&self, full_path: &Path, is_dir: bool) -> Result<PathEntity> {
        let relative = full_path
            .strip_prefix(&self.root)
            .unwrap_or(full_path)
            .to_string_lossy()
            .replace('\\', "/");
        let relative = normalize_relative_path(&relative, is_dir);

        let metadata = fs::metadata(full_path).with_path(full_path)?;
        let size = if is_dir { 0 } else { metadata.len() };
        let mod_time = mod_time_ms(&metadata);

        let version = FileVersion::new(full_path.to_string_lossy(), size, mod_time, None);
        Ok(PathEntity::new(
            full_path.to_string_lossy(),
            relative,
            is_dir,
            vec![version],
        ))
    }
}

impl Folder for LocalFolder {
    fn kind(&self) -> FolderKind {
        FolderKind::Local
    }

    fn all_files(&self, reporter: &ProgressReporter) -> Result<Vec<PathEntity>> {
        let mut out = Vec::new();
        self.walk(&self.root.clone(), reporter, &mut out)?;
        Ok(out)
    }

    fn full_path_for(&self, entity: &PathEntity) -> String {
        self.root
            .join(entity.relative_path.replace('/', std::path::MAIN_SEPARATOR_STR))
            .to_string_lossy()
            .into_owned()
    }

    fn update_hash(&self, entity: &mut PathEntity) -> Result<Option<String>> {
        if entity.is_dir {
            return Ok(None);
        }
        if entity.latest_version().hash.is_some() {
            return Ok(entity.latest_version().hash.clone());
        }
        let file = fs::File::open(&entity.native_path).with_path(&entity.native_path)?;
        let mut hasher = HashStream::new(ReaderSource::new(file), HashAlgorithm::Md5);
        hasher.read_to_end()?;
        let digest = hasher.hex_digest();
        entity.latest_version_mut().hash = Some(digest.clone());
        Ok(Some(digest))
    }
}

fn mod_time_ms(metadata: &fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn walks_in_lowercase_sorted_order_with_dirs_before_contents() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Zebra.txt"), b"z").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/inner.txt"), b"i").unwrap();
        std::fs::write(dir.path().join("apple.txt"), b"a").unwrap();

        let folder = LocalFolder::new(dir.path()).unwrap();
        let reporter = ProgressReporter::disabled();
        let entities = folder.all_files(&reporter).unwrap();
        let paths: Vec<_> = entities.iter().map(|e| e.relative_path.clone()).collect();
        assert_eq!(paths, ["apple.txt", "sub/", "sub/inner.txt", "Zebra.txt"]);
    }

    #[test]
    fn download_temp_files_are_excluded() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt.sync.tmp"), b"x").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"x").unwrap();

        let folder = LocalFolder::new(dir.path()).unwrap();
        let reporter = ProgressReporter::disabled();
        let entities = folder.all_files(&reporter).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].relative_path, "a.txt");
    }

    #[test]
    fn update_hash_is_memoized() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello\n").unwrap();
        let folder = LocalFolder::new(dir.path()).unwrap();
        let reporter = ProgressReporter::disabled();
        let mut entities = folder.all_files(&reporter).unwrap();
        let hash1 = folder.update_hash(&mut entities[0]).unwrap();
        assert!(hash1.is_some());
        let hash2 = folder.update_hash(&mut entities[0]).unwrap();
        assert_eq!(hash1, hash2);
    }
}
