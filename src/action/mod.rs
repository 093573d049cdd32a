//! Action runner (§4.I): the four kinds of work the policy engine can
//! emit, plus the shared template-method wrapper the scheduler drives
//! them through.
//!
//! Grounded on `original_source/sync/action.py`'s `AbstractAction`:
//! `run()` logs its start, executes unless this is a dry run, reports
//! success to the progress reporter, and on failure logs, reports, and
//! re-raises so the scheduler can collect it (§7 "fatal during run").
//! That template is `execute_action` below; each concrete action only
//! implements the part specific to it.

pub mod download;
pub mod local_delete;
pub mod remote_delete;
pub mod upload;

pub use download::DownloadAction;
pub use local_delete::LocalDeleteAction;
pub use remote_delete::RemoteDeleteAction;
pub use upload::UploadAction;

use crate::error::{Result, SyncError};
use crate::index::SecureIndex;
use crate::progress::ProgressReporter;
use crate::remote::RemoteStore;
use crate::secure_name::Salts;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared, read-only state every action needs to do its work: the
/// index, the remote store, the crypto salts/passphrase, the local
/// root, and the cooperative shutdown flag (§5 "Cancellation").
pub struct ActionContext {
    pub remote: Arc<dyn RemoteStore>,
    pub index: Arc<SecureIndex>,
    pub salts: Salts,
    pub passphrase: String,
    pub local_root: PathBuf,
    pub large_file_threshold: u64,
    pub test_mode: bool,
    pub reporter: Arc<ProgressReporter>,
    pub shutdown: Arc<AtomicBool>,
    pub runtime: tokio::runtime::Handle,
}

impl ActionContext {
    /// Raises `Cancelled` if the global shutdown flag is set. Every
    /// action polls this at entry (§5); in-flight actions still finish
    /// their current I/O call once started, they just never begin a new
    /// one after the flag flips.
    pub fn raise_if_shutting_down(&self) -> Result<()> {
        if self.shutdown.load(Ordering::SeqCst) {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn local_path(&self, relative_path: &str) -> PathBuf {
        self.local_root
            .join(relative_path.replace('/', std::path::MAIN_SEPARATOR_STR))
    }

    /// Stable on-disk location for an in-progress upload's compressed,
    /// encrypted temp file, keyed by the (deterministic) remote name so
    /// a second run can find and reuse it for resume (§4.I step 2, §8
    /// property 7).
    pub fn upload_temp_path(&self, remote_name: &str) -> PathBuf {
        self.local_root
            .join(".securesync-upload-tmp")
            .join(format!("{remote_name}.tmp"))
    }

    pub fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }
}

/// One unit of work the policy engine (§4.H) can emit and the scheduler
/// (§4.J) can run. `bytes()` is the progress weight; `run()` is the
/// action-specific logic, called by [`execute_action`] rather than
/// directly so every action gets the same logging/reporting/error
/// handling for free.
pub trait Action: Send {
    fn relative_path(&self) -> &str;
    fn bytes(&self) -> u64;
    fn kind(&self) -> &'static str;
    fn run(&self, ctx: &ActionContext, dry_run: bool) -> Result<()>;
}

/// A single policy decision may emit an ordered pair (delete-old, then
/// upload); the scheduler keeps a bundle's actions together and runs
/// them sequentially on one worker (§4.J, §9 "Action pairing").
pub type ActionBundle = Vec<Box<dyn Action>>;

/// The shared template method every concrete action runs through:
/// check for shutdown, log the start, execute (unless `dry_run`),
/// report success or failure, and re-raise failures so the caller
/// (the scheduler) can collect them (§4.I, §7).
pub fn execute_action(action: &dyn Action, ctx: &ActionContext, dry_run: bool) -> Result<()> {
    ctx.raise_if_shutting_down()?;
    tracing::debug!(
        kind = action.kind(),
        path = action.relative_path(),
        "running action"
    );
    match action.run(ctx, dry_run) {
        Ok(()) => {
            ctx.reporter
                .action_success(action.relative_path(), action.bytes());
            tracing::info!(
                kind = action.kind(),
                path = action.relative_path(),
                "action succeeded"
            );
            Ok(())
        }
        Err(e) => {
            ctx.reporter
                .action_error(action.relative_path(), &e.to_string());
            tracing::error!(
                kind = action.kind(),
                path = action.relative_path(),
                error = %e,
                "action failed"
            );
            Err(e)
        }
    }
}

/// Runs every action in a bundle sequentially on the calling worker
/// (§4.J: paired actions never interleave with another worker's
/// actions on the same path).
pub fn execute_bundle(bundle: &ActionBundle, ctx: &ActionContext, dry_run: bool) -> Result<()> {
    for action in bundle {
        execute_action(action.as_ref(), ctx, dry_run)?;
    }
    Ok(())
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
        }
    }
    Ok(())
}
