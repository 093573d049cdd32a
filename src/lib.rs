//! # securesync
//!
//! A bidirectional, content-encrypting file synchronizer between a
//! local directory and a remote object-storage bucket. Files leaving
//! the local side are hashed, gzip-compressed, and encrypted with an
//! Argon2id-derived key before they ever reach the network; remote
//! object names are deterministic salted hashes of the relative path,
//! and a local SQLite index is the only thing that can translate a
//! relative path back into a remote object identity.
//!
//! ## Quick start
//!
//! ```no_run
//! use securesync::config::{Cli, RunConfig};
//! use securesync::orchestrator;
//! use securesync::progress::ProgressReporter;
//! use clap::Parser;
//! use std::sync::Arc;
//!
//! # async fn run() -> securesync::error::Result<()> {
//! let cli = Cli::parse();
//! let config = RunConfig::from_cli(&cli)?;
//! let reporter = Arc::new(ProgressReporter::new());
//! orchestrator::run(config, reporter).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod action;
pub mod config;
pub mod core;
pub mod error;
pub mod folder;
pub mod index;
pub mod orchestrator;
pub mod progress;
pub mod remote;
pub mod secure_name;
pub mod stream;
pub mod sync;

pub use config::{Cli, Direction, RunConfig, RunMode};
pub use error::{Result, SyncError};
pub use progress::ProgressReporter;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convenient re-exports for common usage.
pub mod prelude {
    //! ```no_run
    //! use securesync::prelude::*;
    //! ```

    pub use crate::action::{Action, ActionBundle, ActionContext};
    pub use crate::config::{Cli, Direction, RunConfig, RunMode};
    pub use crate::error::{Result, SyncError};
    pub use crate::folder::{Folder, FolderKind, LocalFolder, PathEntity, SecureFolder};
    pub use crate::index::{IndexEntry, IndexFactory, SecureIndex};
    pub use crate::progress::ProgressReporter;
    pub use crate::remote::{RemoteStore, S3RemoteStore};
    pub use crate::secure_name::{secure_name, Salts};
    pub use crate::sync::{plan, PolicyConfig, SyncDirection};
}
