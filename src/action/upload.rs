//! Upload action (§4.I): compress, hash, and encrypt a local file (or
//! just record a directory), then push it to the remote store under
//! its secure name, with resume support for large files.

use super::{ensure_parent_dir, Action, ActionContext};
use crate::error::{IoResultExt, Result};
use crate::index::{EntryStatus, IndexEntry};
use crate::remote::RemoteStore;
use crate::secure_name::secure_name;
use crate::stream::hash::HashAlgorithm;
use crate::stream::pull::{PullRead, ReaderSource};
use crate::stream::{EncryptStream, GzipCompressStream, HashStream};
use std::fs::File;
use std::io::Write;

pub struct UploadAction {
    pub relative_path: String,
    pub is_dir: bool,
    /// Full filesystem path of the source file; unused for directories.
    pub local_path: String,
    pub size: u64,
    pub mod_time: i64,
}

impl UploadAction {
    fn run_dir(&self, ctx: &ActionContext) -> Result<()> {
        ctx.index
            .add_or_update(IndexEntry::new_dir(self.relative_path.clone(), self.mod_time));
        Ok(())
    }

    /// Builds the compressed, encrypted temp file and returns its content
    /// hash (§4.I step 2, "else" branch). Hashing is a separate pass over
    /// the source file from compress+encrypt — both are streamed, so
    /// neither materializes the file in memory, and keeping them apart
    /// means the hash stage never has to survive being moved by value
    /// through two more pull adapters.
    fn build_temp_file(&self, ctx: &ActionContext, temp_path: &std::path::Path) -> Result<String> {
        ensure_parent_dir(temp_path)?;

        let hash_source = File::open(&self.local_path).with_path(&self.local_path)?;
        let mut hasher = HashStream::new(ReaderSource::new(hash_source), HashAlgorithm::Md5);
        hasher.read_to_end()?;
        let hash = hasher.hex_digest();

        let file = File::open(&self.local_path).with_path(&self.local_path)?;
        let compress = GzipCompressStream::new(ReaderSource::new(file));
        let key = crate::stream::CryptoKey::derive(&ctx.passphrase, &ctx.salts.fixed_salt)?;
        let mut encrypt = EncryptStream::new(compress, key);

        let mut out = File::create(temp_path).with_path(temp_path)?;
        loop {
            let chunk = encrypt.read(256 * 1024)?;
            if chunk.is_empty() {
                break;
            }
            out.write_all(&chunk).with_path(temp_path)?;
        }
        out.flush().with_path(temp_path)?;

        Ok(hash)
    }

    fn run_file(&self, ctx: &ActionContext, dry_run: bool) -> Result<()> {
        let remote_name = secure_name(&self.relative_path, &ctx.salts)?;
        let temp_path = ctx.upload_temp_path(&remote_name);

        let resumable = ctx.index.get(&self.relative_path);
        let resuming = temp_path.exists()
            && matches!(
                resumable.as_ref().map(|e| e.status),
                Some(EntryStatus::Uploading)
            );

        let hash = if resuming {
            resumable
                .as_ref()
                .and_then(|e| e.hash.clone())
                .ok_or_else(|| {
                    crate::error::SyncError::index(format!(
                        "resumable upload for '{}' has no recorded hash",
                        self.relative_path
                    ))
                })?
        } else {
            self.build_temp_file(ctx, &temp_path)?
        };

        if self.size > ctx.large_file_threshold {
            ctx.index.add_or_update(IndexEntry::new_file(
                self.relative_path.clone(),
                self.size,
                self.mod_time,
                Some(hash.clone()),
                None,
                None,
                EntryStatus::Uploading,
            ));
        }

        if ctx.test_mode || dry_run {
            ctx.index.add_or_update(IndexEntry::new_file(
                self.relative_path.clone(),
                self.size,
                self.mod_time,
                Some(hash),
                Some(remote_name.clone()),
                Some(remote_name),
                EntryStatus::Absent,
            ));
            return Ok(());
        }

        let temp_bytes = std::fs::read(&temp_path).with_path(&temp_path)?;
        let result = ctx.block_on(ctx.remote.upload(&temp_bytes, &remote_name))?;

        ctx.index.add_or_update(IndexEntry::new_file(
            self.relative_path.clone(),
            self.size,
            self.mod_time,
            Some(hash),
            Some(result.id),
            Some(result.name),
            EntryStatus::Absent,
        ));

        let _ = std::fs::remove_file(&temp_path);
        Ok(())
    }
}

impl Action for UploadAction {
    fn relative_path(&self) -> &str {
        &self.relative_path
    }

    fn bytes(&self) -> u64 {
        self.size
    }

    fn kind(&self) -> &'static str {
        "upload"
    }

    fn run(&self, ctx: &ActionContext, dry_run: bool) -> Result<()> {
        if self.is_dir {
            self.run_dir(ctx)
        } else {
            self.run_file(ctx, dry_run)
        }
    }
}
