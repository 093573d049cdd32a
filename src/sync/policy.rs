//! Policy engine (§4.H): turns each diff pair into zero or more actions.
//!
//! Grounded on `original_source/sync/policy.py` and `policy_manager.py`:
//! per-pair decision table (transfer / delete / nothing) plus the
//! four-level "same or different" comparison, with level 4's hash check
//! skipped whenever either side cannot produce a hash.

use crate::action::{
    Action, ActionBundle, DownloadAction, LocalDeleteAction, RemoteDeleteAction, UploadAction,
};
use crate::error::Result;
use crate::folder::{Folder, PathEntity};
use crate::sync::diff::DiffPair;

/// Which side of the run is local and which is the secure remote.
/// Fixed for the whole run (§4.H): a sync never mixes directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// `src` is `LocalFolder`, `dst` is `SecureFolder`.
    Upload,
    /// `src` is `SecureFolder`, `dst` is `LocalFolder`.
    Download,
}

/// Tunables for one run's policy decisions.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub direction: SyncDirection,
    /// `--keep`: when `true`, never emit a delete for an entry present
    /// only on the destination.
    pub keep: bool,
    /// 1..4 (§4.H).
    pub comparison_level: u8,
    pub large_file_threshold: u64,
}

/// Turns every diff pair into zero or one [`ActionBundle`]s (§4.H, §4.J).
/// `src_folder`/`dst_folder` are consulted only to lazily fill in a
/// missing content hash when `comparison_level == 4` (§4.E).
pub fn plan(
    pairs: Vec<DiffPair>,
    src_folder: &dyn Folder,
    dst_folder: &dyn Folder,
    cfg: &PolicyConfig,
) -> Result<Vec<ActionBundle>> {
    let mut bundles = Vec::new();

    for pair in pairs {
        match (pair.src, pair.dst) {
            (Some(src), None) => {
                bundles.push(vec![transfer_action(cfg.direction, &src)]);
            }
            (None, Some(dst)) => {
                if !cfg.keep {
                    bundles.push(vec![delete_action(cfg.direction, &dst)]);
                }
            }
            (Some(mut src), Some(mut dst)) => {
                if !same(&mut src, &mut dst, src_folder, dst_folder, cfg.comparison_level)? {
                    let mut bundle: ActionBundle = Vec::new();
                    if cfg.direction == SyncDirection::Upload && !src.is_dir {
                        bundle.push(delete_action(cfg.direction, &dst));
                    }
                    bundle.push(transfer_action(cfg.direction, &src));
                    bundles.push(bundle);
                }
            }
            (None, None) => unreachable!("diff never yields an empty pair"),
        }
    }

    let _ = cfg.large_file_threshold; // consulted by the action runner, not here.
    Ok(bundles)
}

/// Comparison levels 1..4 (§4.H). Directories never differ past level 1.
fn same(
    src: &mut PathEntity,
    dst: &mut PathEntity,
    src_folder: &dyn Folder,
    dst_folder: &dyn Folder,
    level: u8,
) -> Result<bool> {
    if src.is_dir != dst.is_dir {
        return Ok(false);
    }
    if src.is_dir {
        return Ok(true);
    }
    if level == 1 {
        return Ok(true);
    }

    if level >= 2 && src.latest_version().size != dst.latest_version().size {
        return Ok(false);
    }
    if level == 2 {
        return Ok(true);
    }

    if level >= 3 && src.latest_version().mod_time != dst.latest_version().mod_time {
        return Ok(false);
    }
    if level == 3 {
        return Ok(true);
    }

    let src_hash = src_folder.update_hash(src)?;
    let dst_hash = dst_folder.update_hash(dst)?;
    match (src_hash, dst_hash) {
        (Some(a), Some(b)) => Ok(a == b),
        // Either side can't produce a hash: skip the check (§4.H).
        _ => Ok(true),
    }
}

fn transfer_action(direction: SyncDirection, entity: &PathEntity) -> Box<dyn Action> {
    match direction {
        SyncDirection::Upload => Box::new(UploadAction {
            relative_path: entity.relative_path.clone(),
            is_dir: entity.is_dir,
            local_path: entity.native_path.clone(),
            size: entity.latest_version().size,
            mod_time: entity.latest_version().mod_time,
        }),
        SyncDirection::Download => Box::new(DownloadAction {
            relative_path: entity.relative_path.clone(),
            is_dir: entity.is_dir,
            remote_name: entity.native_path.clone(),
            size: entity.latest_version().size,
            mod_time: entity.latest_version().mod_time,
        }),
    }
}

fn delete_action(direction: SyncDirection, dst: &PathEntity) -> Box<dyn Action> {
    match direction {
        SyncDirection::Upload => Box::new(RemoteDeleteAction {
            relative_path: dst.relative_path.clone(),
            remote_id: dst.latest_version().id.clone(),
            remote_name: dst.native_path.clone(),
        }),
        SyncDirection::Download => Box::new(LocalDeleteAction {
            relative_path: dst.relative_path.clone(),
            is_dir: dst.is_dir,
        }),
    }
}
