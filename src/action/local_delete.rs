//! Local-delete action (§4.I): remove a local file that no longer
//! exists on the remote side and `--keep` was not requested. Silent on
//! "not found" — another process or a prior partial run may have
//! already removed it.

use super::{Action, ActionContext};
use crate::error::Result;
use std::io::ErrorKind;

pub struct LocalDeleteAction {
    pub relative_path: String,
    pub is_dir: bool,
}

impl Action for LocalDeleteAction {
    fn relative_path(&self) -> &str {
        &self.relative_path
    }

    fn bytes(&self) -> u64 {
        0
    }

    fn kind(&self) -> &'static str {
        "local-delete"
    }

    fn run(&self, ctx: &ActionContext, dry_run: bool) -> Result<()> {
        if dry_run {
            return Ok(());
        }
        let path = ctx.local_path(&self.relative_path);
        let result = if self.is_dir {
            std::fs::remove_dir(&path)
        } else {
            std::fs::remove_file(&path)
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(crate::error::SyncError::io(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SecureIndex;
    use crate::progress::ProgressReporter;
    use crate::remote::mock::InMemoryRemote;
    use crate::secure_name::Salts;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn test_context(tmp: &tempfile::TempDir, runtime: &tokio::runtime::Runtime) -> Arc<ActionContext> {
        let index = SecureIndex::open(tmp.path().join("index.db")).unwrap();
        Arc::new(ActionContext {
            remote: Arc::new(InMemoryRemote::new()),
            index,
            salts: Salts::new("salt", vec![4u8; 16]).unwrap(),
            passphrase: "pw".into(),
            local_root: tmp.path().to_path_buf(),
            large_file_threshold: u64::MAX,
            test_mode: false,
            reporter: Arc::new(ProgressReporter::disabled()),
            shutdown: Arc::new(AtomicBool::new(false)),
            runtime: runtime.handle().clone(),
        })
    }

    #[test]
    fn removes_an_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), b"x").unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let ctx = test_context(&tmp, &runtime);

        let action = LocalDeleteAction {
            relative_path: "a.txt".into(),
            is_dir: false,
        };
        action.run(&ctx, false).unwrap();

        assert!(!tmp.path().join("a.txt").exists());
    }

    #[test]
    fn is_silent_when_the_file_is_already_gone() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let ctx = test_context(&tmp, &runtime);

        let action = LocalDeleteAction {
            relative_path: "never-existed.txt".into(),
            is_dir: false,
        };
        assert!(action.run(&ctx, false).is_ok());
    }

    #[test]
    fn removes_an_empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let ctx = test_context(&tmp, &runtime);

        let action = LocalDeleteAction {
            relative_path: "sub".into(),
            is_dir: true,
        };
        action.run(&ctx, false).unwrap();

        assert!(!tmp.path().join("sub").exists());
    }

    #[test]
    fn dry_run_leaves_the_file_in_place() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), b"x").unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let ctx = test_context(&tmp, &runtime);

        let action = LocalDeleteAction {
            relative_path: "a.txt".into(),
            is_dir: false,
        };
        action.run(&ctx, true).unwrap();

        assert!(tmp.path().join("a.txt").exists());
    }
}
