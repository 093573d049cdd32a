//! Remote-delete action (§4.I): remove a remote object and drop its
//! index row. A "not present" response from the remote store is
//! treated as success (§7 "logical" error kind) — the object is already
//! gone, which is exactly what this action wants.

use super::{Action, ActionContext};
use crate::error::Result;
use crate::remote::RemoteStore;

pub struct RemoteDeleteAction {
    pub relative_path: String,
    pub remote_id: String,
    pub remote_name: String,
}

impl Action for RemoteDeleteAction {
    fn relative_path(&self) -> &str {
        &self.relative_path
    }

    fn bytes(&self) -> u64 {
        0
    }

    fn kind(&self) -> &'static str {
        "remote-delete"
    }

    fn run(&self, ctx: &ActionContext, dry_run: bool) -> Result<()> {
        if dry_run {
            return Ok(());
        }
        match ctx.block_on(ctx.remote.delete_version(&self.remote_id, &self.remote_name)) {
            Ok(()) => {}
            Err(e) if e.is_not_present() => {}
            Err(e) => return Err(e),
        }
        ctx.index.remove(&self.relative_path);
        Ok(())
    }
}
