//! CLI surface and run configuration (§4.L, §6).
//!
//! Grounded on the teacher's `config/settings.rs`: a `clap`-derive
//! struct with the same positional/flag shape, `parse_size`-style
//! parsing helpers, and a `from_cli` conversion into a plain config
//! struct the rest of the crate consumes.

use crate::error::{Result, SyncError};
use crate::secure_name::Salts;
use clap::Parser;
use std::path::PathBuf;

/// Encrypting bucket synchronizer.
#[derive(Parser, Debug, Clone)]
#[command(name = "securesync")]
#[command(author = "SecureSync Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bidirectional, content-encrypting sync between a local directory and a bucket")]
#[command(long_about = r#"
securesync mirrors a local directory and a remote object-storage bucket,
compressing, hashing, and encrypting file content before it ever leaves
the local side. Remote object names are deterministic salted hashes of
the relative path; a local SQLite index is the only thing that can map
a relative path back to a remote object.

Examples:
  securesync /local b2://my-bucket my-passphrase
  securesync b2://my-bucket/sub /local my-passphrase --keep
  securesync /local b2://my-bucket pw --dryrun --workers 8
"#)]
pub struct Cli {
    /// Source: a local path, or `b2://bucket[/folder]`.
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Destination: a local path, or `b2://bucket[/folder]`.
    #[arg(value_name = "DESTINATION")]
    pub destination: String,

    /// Passphrase the content encryption key is derived from.
    #[arg(value_name = "PASSPHRASE")]
    pub passphrase: String,

    /// Never delete files present only on the destination.
    #[arg(long)]
    pub keep: bool,

    /// Run with no remote network I/O (exercises index + policy only).
    #[arg(long)]
    pub test: bool,

    /// Run with the index acquisition step short-circuited, same as `--test`
    /// but scoped to just the index factory.
    #[arg(long = "test-index")]
    pub test_index: bool,

    /// Plan the run but perform no filesystem or remote mutation.
    #[arg(long)]
    pub dryrun: bool,

    /// Suppress progress output; only warnings and errors are logged.
    #[arg(long)]
    pub quiet: bool,

    /// Validate the index at PATH and exit without syncing.
    #[arg(long = "validate-index", value_name = "PATH")]
    pub validate_index: Option<PathBuf>,

    /// Force re-encrypt and upload the index at PATH and exit without syncing.
    #[arg(long = "upload-index", value_name = "PATH")]
    pub upload_index: Option<PathBuf>,

    /// Number of worker threads running actions concurrently.
    #[arg(long, default_value_t = 20, value_name = "N")]
    pub workers: usize,

    /// Exclude relative paths matching this regex (repeatable).
    #[arg(long = "exclude", value_name = "RE")]
    pub exclude: Vec<String>,

    /// Only include relative paths matching this regex (repeatable).
    #[arg(long = "include", value_name = "RE")]
    pub include: Vec<String>,

    /// Comparison level used to decide whether two sides are "the same" file.
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(1..=4), value_name = "1-4")]
    pub comparison: u8,

    /// Files larger than this many bytes are tracked with a resumable
    /// `status = Uploading` index row during upload.
    #[arg(long = "large-file-threshold", default_value_t = 100 * 1024 * 1024, value_name = "BYTES")]
    pub large_file_threshold: u64,

    /// Argon2id salt string mixed into every secure name (also settable
    /// via the `SECURE_NAME_SALT` environment variable).
    #[arg(long = "secure-name-salt", env = "SECURE_NAME_SALT", value_name = "SALT")]
    pub secure_name_salt: Option<String>,

    /// Fixed binary salt (hex-encoded) for content-key derivation (also
    /// settable via the `ARGON_SALT` environment variable).
    #[arg(long = "argon-salt", env = "ARGON_SALT", value_name = "HEX")]
    pub argon_salt: Option<String>,

    /// Optional S3-compatible endpoint override (e.g. a Backblaze B2
    /// S3-API endpoint); defaults to the ambient AWS endpoint discovery.
    #[arg(long = "endpoint-url", value_name = "URL")]
    pub endpoint_url: Option<String>,
}

/// One side of a sync run, resolved from a CLI positional argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncTarget {
    Local(PathBuf),
    Remote { bucket: String, folder: String },
}

impl SyncTarget {
    /// Parses `b2://bucket[/folder]` into [`SyncTarget::Remote`];
    /// anything else is a local path. Generalizes the teacher's
    /// `parse_remote_path`'s `user@host:/path` splitting into the
    /// bucket-URI scheme this crate's remote side actually uses.
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix("b2://") {
            Some(rest) => {
                let (bucket, folder) = match rest.split_once('/') {
                    Some((b, f)) => (b.to_string(), f.trim_matches('/').to_string()),
                    None => (rest.to_string(), String::new()),
                };
                SyncTarget::Remote { bucket, folder }
            }
            None => SyncTarget::Local(PathBuf::from(raw)),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, SyncTarget::Remote { .. })
    }
}

/// Which way content flows for this run, resolved from the two targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Local source, remote destination.
    Upload,
    /// Remote source, local destination.
    Download,
}

/// What subcommand the top-level orchestrator should run (§4.K).
#[derive(Debug, Clone)]
pub enum RunMode {
    Sync,
    ValidateIndex(PathBuf),
    UploadIndex(PathBuf),
}

/// Fully resolved configuration for one run, built from [`Cli`] (§4.L).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub local_root: PathBuf,
    pub bucket: String,
    pub remote_folder: String,
    pub direction: Direction,
    pub passphrase: String,
    pub salts: Salts,
    pub keep: bool,
    pub test_mode: bool,
    pub dry_run: bool,
    pub quiet: bool,
    pub workers: usize,
    pub exclude: Vec<String>,
    pub include: Vec<String>,
    pub comparison_level: u8,
    pub large_file_threshold: u64,
    pub endpoint_url: Option<String>,
    pub mode: RunMode,
}

impl RunConfig {
    /// Resolves a [`Cli`] into a [`RunConfig`], failing fast on any
    /// configuration error (§7 "Configuration" error kind): missing
    /// salts, or a source/destination pair that isn't exactly one local
    /// and one remote target.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let secure_name_salt = cli
            .secure_name_salt
            .clone()
            .ok_or_else(|| SyncError::config("missing --secure-name-salt (or SECURE_NAME_SALT)"))?;
        let argon_salt_hex = cli
            .argon_salt
            .clone()
            .ok_or_else(|| SyncError::config("missing --argon-salt (or ARGON_SALT)"))?;
        let fixed_salt = hex::decode(&argon_salt_hex)
            .map_err(|e| SyncError::config(format!("--argon-salt is not valid hex: {e}")))?;
        let salts = Salts::new(secure_name_salt, fixed_salt)?;

        let source = SyncTarget::parse(&cli.source);
        let destination = SyncTarget::parse(&cli.destination);

        let (local_root, bucket, remote_folder, direction) =
            match (source, destination) {
                (SyncTarget::Local(local), SyncTarget::Remote { bucket, folder }) => {
                    (local, bucket, folder, Direction::Upload)
                }
                (SyncTarget::Remote { bucket, folder }, SyncTarget::Local(local)) => {
                    (local, bucket, folder, Direction::Download)
                }
                (SyncTarget::Local(_), SyncTarget::Local(_)) => {
                    return Err(SyncError::config(
                        "source and destination are both local: one side must be a b2:// bucket",
                    ));
                }
                (SyncTarget::Remote { .. }, SyncTarget::Remote { .. }) => {
                    return Err(SyncError::config(
                        "source and destination are both remote: one side must be a local path",
                    ));
                }
            };

        let mode = if let Some(path) = &cli.validate_index {
            RunMode::ValidateIndex(path.clone())
        } else if let Some(path) = &cli.upload_index {
            RunMode::UploadIndex(path.clone())
        } else {
            RunMode::Sync
        };

        Ok(Self {
            local_root,
            bucket,
            remote_folder,
            direction,
            passphrase: cli.passphrase.clone(),
            salts,
            keep: cli.keep,
            test_mode: cli.test || cli.test_index,
            dry_run: cli.dryrun,
            quiet: cli.quiet,
            workers: cli.workers,
            exclude: cli.exclude.clone(),
            include: cli.include.clone(),
            comparison_level: cli.comparison,
            large_file_threshold: cli.large_file_threshold,
            endpoint_url: cli.endpoint_url.clone(),
            mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_remote_target_with_folder() {
        let target = SyncTarget::parse("b2://my-bucket/sub/dir");
        assert_eq!(
            target,
            SyncTarget::Remote {
                bucket: "my-bucket".into(),
                folder: "sub/dir".into(),
            }
        );
    }

    #[test]
    fn parses_remote_target_without_folder() {
        let target = SyncTarget::parse("b2://my-bucket");
        assert_eq!(
            target,
            SyncTarget::Remote {
                bucket: "my-bucket".into(),
                folder: String::new(),
            }
        );
    }

    #[test]
    fn parses_local_target() {
        assert_eq!(SyncTarget::parse("/var/data"), SyncTarget::Local(PathBuf::from("/var/data")));
    }

    fn base_cli() -> Cli {
        Cli {
            source: "/local".into(),
            destination: "b2://bucket/folder".into(),
            passphrase: "pw".into(),
            keep: false,
            test: false,
            test_index: false,
            dryrun: false,
            quiet: false,
            validate_index: None,
            upload_index: None,
            workers: 20,
            exclude: Vec::new(),
            include: Vec::new(),
            comparison: 4,
            large_file_threshold: 100 * 1024 * 1024,
            secure_name_salt: Some("salt".into()),
            argon_salt: Some("00112233445566778899aabbccddeeff".into()),
            endpoint_url: None,
        }
    }

    #[test]
    fn missing_secure_name_salt_is_a_config_error() {
        let mut cli = base_cli();
        cli.secure_name_salt = None;
        assert!(RunConfig::from_cli(&cli).is_err());
    }

    #[test]
    fn missing_argon_salt_is_a_config_error() {
        let mut cli = base_cli();
        cli.argon_salt = None;
        assert!(RunConfig::from_cli(&cli).is_err());
    }

    #[test]
    fn both_local_is_a_config_error() {
        let mut cli = base_cli();
        cli.destination = "/other/local".into();
        assert!(RunConfig::from_cli(&cli).is_err());
    }

    #[test]
    fn both_remote_is_a_config_error() {
        let mut cli = base_cli();
        cli.source = "b2://other-bucket".into();
        assert!(RunConfig::from_cli(&cli).is_err());
    }

    #[test]
    fn resolves_upload_direction() {
        let cli = base_cli();
        let cfg = RunConfig::from_cli(&cli).unwrap();
        assert_eq!(cfg.direction, Direction::Upload);
        assert_eq!(cfg.bucket, "bucket");
        assert_eq!(cfg.remote_folder, "folder");
    }

    #[test]
    fn resolves_download_direction() {
        let mut cli = base_cli();
        cli.source = "b2://bucket/folder".into();
        cli.destination = "/local".into();
        let cfg = RunConfig::from_cli(&cli).unwrap();
        assert_eq!(cfg.direction, Direction::Download);
    }
}
