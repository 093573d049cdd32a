//! Download action (§4.I): pull an encrypted object from the remote
//! store, decrypt and decompress it through a `.sync.tmp` sibling, then
//! set the resulting file's modification time to the recorded value.

use super::{ensure_parent_dir, Action, ActionContext};
use crate::error::{IoResultExt, Result};
use crate::folder::DOWNLOAD_TEMP_SUFFIX;
use crate::remote::RemoteStore;
use crate::stream::pull::{PullRead, SliceSource};
use crate::stream::{DecryptStream, GzipDecompressStream};
use std::fs;

pub struct DownloadAction {
    pub relative_path: String,
    pub is_dir: bool,
    pub remote_name: String,
    pub size: u64,
    pub mod_time: i64,
}

impl Action for DownloadAction {
    fn relative_path(&self) -> &str {
        &self.relative_path
    }

    fn bytes(&self) -> u64 {
        self.size
    }

    fn kind(&self) -> &'static str {
        "download"
    }

    fn run(&self, ctx: &ActionContext, dry_run: bool) -> Result<()> {
        let final_path = ctx.local_path(&self.relative_path);

        if self.is_dir {
            if !dry_run {
                fs::create_dir_all(&final_path).with_path(&final_path)?;
            }
            return Ok(());
        }

        ensure_parent_dir(&final_path)?;

        if dry_run {
            return Ok(());
        }

        let temp_path = {
            let mut p = final_path.clone();
            let name = p.file_name().unwrap_or_default().to_string_lossy().into_owned();
            p.set_file_name(format!("{name}{DOWNLOAD_TEMP_SUFFIX}"));
            p
        };

        let ciphertext = ctx.block_on(ctx.remote.download_by_name(&self.remote_name))?;
        fs::write(&temp_path, &ciphertext).with_path(&temp_path)?;

        let decrypted = {
            let ciphertext = fs::read(&temp_path).with_path(&temp_path)?;
            let key = crate::stream::CryptoKey::derive(&ctx.passphrase, &ctx.salts.fixed_salt)?;
            let mut decrypt = DecryptStream::new(SliceSource::new(&ciphertext), key)?;
            let compressed = decrypt.read_to_end()?;
            let mut decompress = GzipDecompressStream::new(SliceSource::new(&compressed));
            decompress.read_to_end()?
        };

        fs::write(&final_path, &decrypted).with_path(&final_path)?;
        let _ = fs::remove_file(&temp_path);

        let mtime = filetime::FileTime::from_unix_time(self.mod_time / 1000, 0);
        filetime::set_file_mtime(&final_path, mtime).with_path(&final_path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SecureIndex;
    use crate::progress::ProgressReporter;
    use crate::remote::mock::InMemoryRemote;
    use crate::secure_name::Salts;
    use crate::stream::pull::ReaderSource;
    use crate::stream::{CryptoKey, EncryptStream, GzipCompressStream};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn test_context(tmp: &tempfile::TempDir, runtime: &tokio::runtime::Runtime, remote: InMemoryRemote) -> Arc<ActionContext> {
        let index = SecureIndex::open(tmp.path().join("index.db")).unwrap();
        Arc::new(ActionContext {
            remote: Arc::new(remote),
            index,
            salts: Salts::new("salt", vec![2u8; 16]).unwrap(),
            passphrase: "hunter2".into(),
            local_root: tmp.path().to_path_buf(),
            large_file_threshold: u64::MAX,
            test_mode: false,
            reporter: Arc::new(ProgressReporter::disabled()),
            shutdown: Arc::new(AtomicBool::new(false)),
            runtime: runtime.handle().clone(),
        })
    }

    fn encrypted_blob(ctx: &ActionContext, plaintext: &[u8]) -> Vec<u8> {
        let key = CryptoKey::derive(&ctx.passphrase, &ctx.salts.fixed_salt).unwrap();
        let compress = GzipCompressStream::new(ReaderSource::new(std::io::Cursor::new(plaintext.to_vec())));
        let mut encrypt = EncryptStream::new(compress, key);
        encrypt.read_to_end().unwrap()
    }

    #[test]
    fn directory_download_just_creates_the_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let ctx = test_context(&tmp, &runtime, InMemoryRemote::new());

        let action = DownloadAction {
            relative_path: "sub/".into(),
            is_dir: true,
            remote_name: String::new(),
            size: 0,
            mod_time: 0,
        };
        action.run(&ctx, false).unwrap();

        assert!(tmp.path().join("sub").is_dir());
    }

    #[test]
    fn file_download_decrypts_and_sets_mod_time() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let remote = InMemoryRemote::new();
        let ctx = test_context(&tmp, &runtime, remote);

        let ciphertext = encrypted_blob(&ctx, b"hello\n");
        runtime
            .block_on(ctx.remote.upload(&ciphertext, "deadbeef"))
            .unwrap();

        let mod_time_ms: i64 = 1_600_000_000_000;
        let action = DownloadAction {
            relative_path: "a.txt".into(),
            is_dir: false,
            remote_name: "deadbeef".into(),
            size: 6,
            mod_time: mod_time_ms,
        };
        action.run(&ctx, false).unwrap();

        let final_path = tmp.path().join("a.txt");
        assert_eq!(std::fs::read(&final_path).unwrap(), b"hello\n");

        let meta = std::fs::metadata(&final_path).unwrap();
        let actual = filetime::FileTime::from_last_modification_time(&meta);
        assert_eq!(actual.unix_seconds(), mod_time_ms / 1000);

        // The `.sync.tmp` sibling is cleaned up once decryption succeeds.
        let temp_path = tmp.path().join(format!("a.txt{DOWNLOAD_TEMP_SUFFIX}"));
        assert!(!temp_path.exists());
    }

    #[test]
    fn dry_run_does_not_touch_the_filesystem() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let ctx = test_context(&tmp, &runtime, InMemoryRemote::new());

        let action = DownloadAction {
            relative_path: "a.txt".into(),
            is_dir: false,
            remote_name: "missing".into(),
            size: 6,
            mod_time: 0,
        };
        action.run(&ctx, true).unwrap();

        assert!(!tmp.path().join("a.txt").exists());
    }
}
