//! Error types for securesync
//!
//! One error enum covers every layer: configuration, local I/O, the
//! crypto stream, the remote store, and the secure index. See §7 of the
//! design for how each variant maps onto the handling rules (fatal vs.
//! per-file vs. logical "not present").

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for securesync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Missing or malformed configuration. Fatal, raised before any I/O.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error during a local file operation.
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A path was not found where one was expected.
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    /// Local permission denied (reported per-file, sync continues).
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// A symlink could not be followed.
    #[error("broken symlink at '{0}'")]
    BrokenSymlink(PathBuf),

    /// Compression or decompression failure in the gzip stream stage.
    #[error("compression error: {0}")]
    Compression(String),

    /// Encryption, decryption, or key-derivation failure in the crypto
    /// stream stage.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Failure from the remote object store. Transient I/O is retried
    /// inside the store's own client and only surfaces here after it
    /// gives up.
    #[error("remote store error: {0}")]
    Remote(String),

    /// The remote store reported "not present" for an operation that
    /// tolerates it (e.g. deleting an already-gone object). Treated as
    /// success by callers that expect it; exists so those callers can
    /// distinguish it from other remote errors.
    #[error("remote object not present: {0}")]
    RemoteNotPresent(String),

    /// Failure reading, writing, or flushing the secure index.
    #[error("index error: {0}")]
    Index(String),

    /// Integrity check failed: content hash after decrypt+decompress did
    /// not match the recorded hash.
    #[error("integrity check failed for '{path}': expected {expected}, got {actual}")]
    IntegrityMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// A worker pool could not be built or a scheduled task panicked.
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// The run was cancelled via the shutdown flag.
    #[error("operation cancelled")]
    Cancelled,

    /// Several independent actions failed during one run; the scheduler
    /// collects them and reports the run as "sync incomplete".
    #[error("sync incomplete: {count} action(s) failed")]
    SyncIncomplete {
        count: usize,
        errors: Vec<SyncError>,
    },
}

impl SyncError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto(message.into())
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote(message.into())
    }

    pub fn index(message: impl Into<String>) -> Self {
        Self::Index(message.into())
    }

    pub fn integrity_mismatch(
        path: impl Into<PathBuf>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::IntegrityMismatch {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// True for errors §7 classifies as per-file: reported, the file is
    /// skipped, and the sync continues.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied(_) | Self::BrokenSymlink(_) | Self::NotFound(_)
        )
    }

    /// True for the logical "not present" case that delete actions treat
    /// as success rather than failure.
    pub fn is_not_present(&self) -> bool {
        matches!(self, Self::RemoteNotPresent(_))
    }

    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. }
            | Self::NotFound(path)
            | Self::PermissionDenied(path)
            | Self::BrokenSymlink(path)
            | Self::IntegrityMismatch { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Result type alias for securesync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        SyncError::Index(err.to_string())
    }
}

/// Extension trait for adding path context to a bare `std::io::Result`.
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| SyncError::io(path, e))
    }
}

/// Collects per-action results raised during a run into a single
/// "sync incomplete" summary, per §7's fatal-during-run handling.
pub fn collect_action_errors<T>(results: Vec<Result<T>>) -> Result<Vec<T>> {
    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(value) => successes.push(value),
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(successes)
    } else {
        Err(SyncError::SyncIncomplete {
            count: errors.len(),
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_carries_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = SyncError::io("/test/path", io_err);
        assert_eq!(err.path().unwrap(), &PathBuf::from("/test/path"));
    }

    #[test]
    fn per_file_errors_are_classified() {
        assert!(SyncError::PermissionDenied(PathBuf::from("/x")).is_per_file());
        assert!(!SyncError::Cancelled.is_per_file());
    }

    #[test]
    fn remote_not_present_is_logical_success() {
        assert!(SyncError::RemoteNotPresent("gone".into()).is_not_present());
        assert!(!SyncError::remote("timeout").is_not_present());
    }

    #[test]
    fn collect_action_errors_aggregates() {
        let results: Vec<Result<i32>> = vec![Ok(1), Ok(2), Ok(3)];
        assert_eq!(collect_action_errors(results).unwrap(), vec![1, 2, 3]);

        let results: Vec<Result<i32>> = vec![
            Ok(1),
            Err(SyncError::Cancelled),
            Err(SyncError::config("bad")),
        ];
        match collect_action_errors(results) {
            Err(SyncError::SyncIncomplete { count, .. }) => assert_eq!(count, 2),
            _ => panic!("expected SyncIncomplete"),
        }
    }
}
