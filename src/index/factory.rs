//! Index factory / lifecycle (§4.F).
//!
//! Grounded on `original_source/index/secure_index_factory.py`'s
//! `SecureIndexFactory.createIndex`/`storeIndex`: compare the remote
//! index object's stored modification time against the local index
//! file's mtime, download+decrypt if the remote is newer or local is
//! absent, otherwise keep what is on disk. On shutdown, re-upload if the
//! index changed during the run or the startup comparison forced it.

use crate::error::Result;
use crate::index::store::SecureIndex;
use crate::remote::RemoteStore;
use crate::secure_name::{secure_name, Salts};
use crate::stream::crypto::CryptoKey;
use crate::stream::gzip::{GzipCompressStream, GzipDecompressStream};
use crate::stream::pull::{PullRead, ReaderSource};
use crate::stream::{DecryptStream, EncryptStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of acquiring the index at startup.
pub struct OpenedIndex {
    pub index: Arc<SecureIndex>,
    /// `true` if the remote copy was missing or older than local at
    /// startup — forces a re-upload at shutdown even if nothing changed
    /// during this run, so the remote catches up.
    pub force_upload: bool,
}

/// Builds and tears down the secure index for one bucket.
pub struct IndexFactory<'a> {
    remote: &'a dyn RemoteStore,
    local_index_path: PathBuf,
    bucket: String,
    salts: Salts,
    passphrase: String,
    test_mode: bool,
}

impl<'a> IndexFactory<'a> {
    pub fn new(
        remote: &'a dyn RemoteStore,
        local_index_path: impl Into<PathBuf>,
        bucket: impl Into<String>,
        salts: Salts,
        passphrase: impl Into<String>,
        test_mode: bool,
    ) -> Self {
        Self {
            remote,
            local_index_path: local_index_path.into(),
            bucket: bucket.into(),
            salts,
            passphrase: passphrase.into(),
            test_mode,
        }
    }

    fn index_remote_name(&self) -> Result<String> {
        secure_name(&format!("{}/index", self.bucket), &self.salts)
    }

    /// Steps 1-6 of §4.F.
    pub async fn create_index(&self) -> Result<OpenedIndex> {
        let local_mod_time = local_mod_time_ms(&self.local_index_path);

        let mut force_upload = local_mod_time.is_none();

        if !self.test_mode {
            let remote_name = self.index_remote_name()?;
            if let Some(remote_mod_time) = self.remote.stat(&remote_name).await? {
                let remote_is_newer = match local_mod_time {
                    None => true,
                    Some(local) => remote_mod_time > local,
                };
                if remote_is_newer {
                    self.download_and_decrypt_index(&remote_name).await?;
                    force_upload = false;
                } else {
                    force_upload = false;
                }
            } else {
                // No remote index yet: local (if any) is authoritative,
                // and we must upload at shutdown regardless.
                force_upload = true;
            }
        }

        let index = SecureIndex::open(&self.local_index_path)?;
        Ok(OpenedIndex {
            index,
            force_upload,
        })
    }

    async fn download_and_decrypt_index(&self, remote_name: &str) -> Result<()> {
        let encrypted = self.remote.download_by_name(remote_name).await?;
        let key = CryptoKey::derive(&self.passphrase, &self.salts.fixed_salt)?;
        let mut decrypt = DecryptStream::new(crate::stream::SliceSource::new(&encrypted), key)?;
        let compressed = decrypt.read_to_end()?;
        let mut decompress =
            GzipDecompressStream::new(crate::stream::SliceSource::new(&compressed));
        let plaintext = decompress.read_to_end()?;
        std::fs::write(&self.local_index_path, plaintext)?;
        Ok(())
    }

    /// On shutdown: re-encrypt and upload the local index file if
    /// `has_changes || force_upload`.
    pub async fn store_index(&self, index: &SecureIndex, force_upload: bool) -> Result<()> {
        if self.test_mode {
            return Ok(());
        }
        if !(index.has_changes() || force_upload) {
            return Ok(());
        }

        index.flush()?;

        let plaintext = std::fs::read(&self.local_index_path)?;
        let reader = ReaderSource::new(std::io::Cursor::new(plaintext));
        let compress = GzipCompressStream::new(reader);
        let key = CryptoKey::derive(&self.passphrase, &self.salts.fixed_salt)?;
        let mut encrypt = EncryptStream::new(compress, key);
        let ciphertext = encrypt.read_to_end()?;

        // Tag the object with the just-flushed local file's mtime so the
        // next `create_index` comparison (step 2-3 above) has something
        // to compare against (spec.md line 121).
        let local_mod_time = local_mod_time_ms(&self.local_index_path).unwrap_or(0);

        let remote_name = self.index_remote_name()?;
        self.remote
            .upload_with_mod_time(&ciphertext, &remote_name, local_mod_time)
            .await?;
        Ok(())
    }
}

fn local_mod_time_ms(path: &Path) -> Option<i64> {
    let meta = std::fs::metadata(path).ok()?;
    let modified = meta.modified().ok()?;
    let since_epoch = modified
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    Some(since_epoch.as_millis() as i64)
}
