//! `IndexEntry`: the plain value type stored in the secure index.
//!
//! Split from the durable store per §9's design note ("the index entry
//! is simultaneously a schema row and an in-memory value; in a systems
//! language this splits into two: a plain value type and a store-
//! specific mapper"). Equality and ordering are defined here, on the
//! value type, case-insensitively over `path` — the mapper in
//! `store.rs` never defines its own comparison semantics.

use std::cmp::Ordering;

/// Upload-resume status recorded on an entry (§3, §4.I).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Not mid-upload; `remote_id`/`remote_name` are both set or both
    /// absent.
    Absent,
    /// A large-file upload is in flight; the temp file and this row are
    /// the resume checkpoint (§4.I step 3).
    Uploading,
}

/// One row of the secure index (§3).
#[derive(Debug, Clone)]
pub struct IndexEntry {
    /// Normalized relative path, forward-slash separated, directories
    /// end in `/`. Compared case-insensitively; this is the primary key.
    pub path: String,
    pub is_dir: bool,
    /// Bytes of the plaintext file; 0 for directories.
    pub size: u64,
    /// Milliseconds since epoch.
    pub mod_time: i64,
    /// Hex digest of the plaintext content; null until computed.
    pub hash: Option<String>,
    /// Opaque remote object id; null for directories and for entries
    /// never uploaded.
    pub remote_id: Option<String>,
    /// Opaque encrypted remote name; null for directories and for
    /// entries never uploaded. Must equal `secure_name(path)` whenever
    /// set (§3 invariant).
    pub remote_name: Option<String>,
    pub status: EntryStatus,
}

impl IndexEntry {
    pub fn new_dir(path: impl Into<String>, mod_time: i64) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
            size: 0,
            mod_time,
            hash: None,
            remote_id: None,
            remote_name: None,
            status: EntryStatus::Absent,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new_file(
        path: impl Into<String>,
        size: u64,
        mod_time: i64,
        hash: Option<String>,
        remote_id: Option<String>,
        remote_name: Option<String>,
        status: EntryStatus,
    ) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
            size,
            mod_time,
            hash,
            remote_id,
            remote_name,
            status,
        }
    }

    fn sort_key(&self) -> String {
        self.path.to_lowercase()
    }
}

impl PartialEq for IndexEntry {
    fn eq(&self, other: &Self) -> bool {
        self.is_dir == other.is_dir && self.sort_key() == other.sort_key()
    }
}

impl Eq for IndexEntry {}

impl PartialOrd for IndexEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_case_insensitive_on_path_and_kind() {
        let a = IndexEntry::new_dir("Sub/", 0);
        let b = IndexEntry::new_dir("sub/", 0);
        assert_eq!(a, b);
    }

    #[test]
    fn directories_sort_before_their_contents() {
        let mut entries = vec![
            IndexEntry::new_file("sub/b.txt", 1, 0, None, None, None, EntryStatus::Absent),
            IndexEntry::new_dir("sub/", 0),
            IndexEntry::new_file("a.txt", 1, 0, None, None, None, EntryStatus::Absent),
        ];
        entries.sort();
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["a.txt", "sub/", "sub/b.txt"]);
    }
}
