//! Folder abstractions (§4.E): a local directory and the secure index
//! behind the same capability set, so the diff engine (§4.G) never
//! needs to know which side of the sync it is looking at.

pub mod local;
pub mod path_entity;
pub mod secure;

pub use local::LocalFolder;
pub use path_entity::{FileVersion, PathEntity};
pub use secure::SecureFolder;

use crate::error::Result;
use crate::progress::ProgressReporter;

/// One of `"local"` or `"sec"` (§4.E), used for log messages and for
/// deciding which side of an action a folder plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderKind {
    Local,
    Secure,
}

impl FolderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FolderKind::Local => "local",
            FolderKind::Secure => "sec",
        }
    }
}

/// Shared capability set behind `LocalFolder` and `SecureFolder`
/// (§4.E): `type()`, `all_files(reporter)`, `full_path_for(entity)`,
/// `update_hash(entity)`.
pub trait Folder {
    fn kind(&self) -> FolderKind;

    /// All files and directories under this folder, in the same
    /// case-insensitive order both folder types agree on (§4.D, §4.E).
    /// Access or permission problems are reported to `reporter` and the
    /// offending entry is skipped rather than aborting the walk.
    fn all_files(&self, reporter: &ProgressReporter) -> Result<Vec<PathEntity>>;

    /// The native, directly accessible location for `entity` within
    /// this folder (a filesystem path for `LocalFolder`, a relative
    /// index path for `SecureFolder`).
    fn full_path_for(&self, entity: &PathEntity) -> String;

    /// Compute (or, for `SecureFolder`, simply retrieve) the content
    /// hash for `entity`, memoizing it onto the entity's latest
    /// version. Never recomputed if already present.
    fn update_hash(&self, entity: &mut PathEntity) -> Result<Option<String>>;
}

/// Suffix used for in-flight download temp files (§4.I). `LocalFolder`
/// excludes files with this suffix from its walk so a download in
/// progress never shows up as a spurious local entry.
pub const DOWNLOAD_TEMP_SUFFIX: &str = ".sync.tmp";

/// Normalizes a filesystem-relative path to the folder's cross-platform
/// comparison form: forward slashes, trailing slash for directories, no
/// leading slash. Grounded on `original_source/utility/util.py`'s
/// `normalizePath`.
pub fn normalize_relative_path(path: &str, is_dir: bool) -> String {
    let mut normalized = path.replace('\\', "/");
    while normalized.starts_with('/') {
        normalized.remove(0);
    }
    if is_dir && !normalized.is_empty() && !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_leading_slash_and_converts_separators() {
        assert_eq!(normalize_relative_path("/a\\b\\c", false), "a/b/c");
    }

    #[test]
    fn normalize_appends_trailing_slash_for_dirs() {
        assert_eq!(normalize_relative_path("a/b", true), "a/b/");
        assert_eq!(normalize_relative_path("a/b/", true), "a/b/");
    }

    #[test]
    fn normalize_of_root_dir_stays_empty() {
        assert_eq!(normalize_relative_path("", true), "");
    }
}
