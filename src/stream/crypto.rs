//! Encrypt/decrypt stream adapters.
//!
//! This is the real replacement for the teacher's placeholder
//! `crypto/encryption.rs`: authenticated encryption via
//! `chacha20poly1305`, keyed by an Argon2id-derived key from the run
//! passphrase, with no XOR or fake-tag shortcuts anywhere in the path.
//!
//! The distilled spec requires the crypto stage to be a "symmetric-
//! crypto worker" with a concurrent writer thread feeding a bounded
//! input pipe (§4.B, §5, §9) — the historical shape of that requirement
//! was a GPG subprocess with a pipe on its stdin. There is no subprocess
//! here, but the same concurrency shape is preserved: a dedicated worker
//! thread pulls plaintext (or ciphertext) from the upstream `PullRead`,
//! seals (or opens) it frame by frame, and pushes the result into a
//! bounded `crossbeam` channel that the calling thread's `read(n)`
//! drains. The worker thread is the "per-stream key schedule" in place
//! of the original's per-thread keyring.

use crate::error::{Result, SyncError};
use crate::stream::pull::PullRead;
use crate::stream::ring_buffer::RingBuffer;
use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use crossbeam::channel::{bounded, Receiver};
use std::thread::JoinHandle;

/// Plaintext frame size; ciphertext frames are this plus the 16-byte
/// Poly1305 tag.
const FRAME_SIZE: usize = 64 * 1024;
/// Channel depth between the worker thread and the reading thread —
/// enough to keep the worker from blocking on a slow consumer while
/// still bounding memory use per stream.
const CHANNEL_DEPTH: usize = 8;

/// 256-bit symmetric key derived from a passphrase and a salt.
#[derive(Clone)]
pub struct CryptoKey(Key);

impl CryptoKey {
    /// Derive a key from a passphrase using Argon2id. `salt` must be at
    /// least 8 bytes; callers pass the configured `ArgonSalt` (§4.C/§4.L)
    /// or a random per-file salt stored alongside the ciphertext.
    pub fn derive(passphrase: &str, salt: &[u8]) -> Result<Self> {
        let params = Params::new(19 * 1024, 2, 1, Some(32))
            .map_err(|e| SyncError::crypto(format!("invalid argon2 params: {e}")))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let mut out = [0u8; 32];
        argon2
            .hash_password_into(passphrase.as_bytes(), salt, &mut out)
            .map_err(|e| SyncError::crypto(format!("key derivation failed: {e}")))?;
        Ok(Self(*Key::from_slice(&out)))
    }
}

fn nonce_for_frame(base: &[u8; 24], index: u64) -> XNonce {
    let mut nonce = *base;
    let counter = index.to_le_bytes();
    for (b, c) in nonce[16..24].iter_mut().zip(counter.iter()) {
        *b ^= c;
    }
    *XNonce::from_slice(&nonce)
}

enum WorkItem {
    Data(Vec<u8>),
    Err(SyncError),
}

/// Wraps an upstream plaintext `PullRead` and produces framed,
/// authenticated ciphertext: each frame is a 4-byte little-endian length
/// prefix followed by that many bytes of `ChaCha20-Poly1305` sealed
/// output. The base nonce is written as the first 24 bytes of the
/// stream, once, ahead of the first frame.
pub struct EncryptStream {
    rx: Receiver<WorkItem>,
    handle: Option<JoinHandle<()>>,
    out: RingBuffer,
    done: bool,
    header_sent: bool,
    base_nonce: [u8; 24],
}

impl EncryptStream {
    pub fn new<R>(mut upstream: R, key: CryptoKey) -> Self
    where
        R: PullRead + Send + 'static,
    {
        let (tx, rx) = bounded::<WorkItem>(CHANNEL_DEPTH);
        let mut base_nonce = [0u8; 24];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut base_nonce);
        let base_nonce_for_worker = base_nonce;

        let handle = std::thread::spawn(move || {
            let cipher = XChaCha20Poly1305::new(&key.0);
            let mut index: u64 = 0;
            loop {
                let chunk = match upstream.read(FRAME_SIZE as i64) {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx.send(WorkItem::Err(e));
                        return;
                    }
                };
                if chunk.is_empty() {
                    return;
                }
                let nonce = nonce_for_frame(&base_nonce_for_worker, index);
                index += 1;
                match cipher.encrypt(&nonce, chunk.as_slice()) {
                    Ok(ciphertext) => {
                        let mut framed =
                            Vec::with_capacity(4 + ciphertext.len());
                        framed.extend_from_slice(&(ciphertext.len() as u32).to_le_bytes());
                        framed.extend_from_slice(&ciphertext);
                        if tx.send(WorkItem::Data(framed)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(WorkItem::Err(SyncError::crypto(format!(
                            "encryption failed: {e}"
                        ))));
                        return;
                    }
                }
            }
        });

        Self {
            rx,
            handle: Some(handle),
            out: RingBuffer::new(),
            done: false,
            header_sent: false,
            base_nonce,
        }
    }

    fn pump(&mut self) -> Result<()> {
        match self.rx.recv() {
            Ok(WorkItem::Data(bytes)) => {
                self.out.write(bytes);
                Ok(())
            }
            Ok(WorkItem::Err(e)) => {
                self.done = true;
                Err(e)
            }
            Err(_) => {
                self.done = true;
                Ok(())
            }
        }
    }
}

impl PullRead for EncryptStream {
    fn read(&mut self, n: i64) -> Result<Vec<u8>> {
        if !self.header_sent {
            self.out.write(self.base_nonce.to_vec());
            self.header_sent = true;
        }
        while !self.done && (n < 0 || self.out.len() < n as usize) {
            self.pump()?;
        }
        Ok(self.out.read(n))
    }
}

impl Drop for EncryptStream {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Wraps an upstream `PullRead` of framed ciphertext (as produced by
/// `EncryptStream`) and produces the original plaintext.
pub struct DecryptStream {
    rx: Receiver<WorkItem>,
    handle: Option<JoinHandle<()>>,
    out: RingBuffer,
    done: bool,
}

impl DecryptStream {
    pub fn new<R>(mut upstream: R, key: CryptoKey) -> Result<Self>
    where
        R: PullRead + Send + 'static,
    {
        let header = upstream.read(24)?;
        if header.len() != 24 {
            return Err(SyncError::crypto("truncated ciphertext header"));
        }
        let mut base_nonce = [0u8; 24];
        base_nonce.copy_from_slice(&header);

        let (tx, rx) = bounded::<WorkItem>(CHANNEL_DEPTH);

        let handle = std::thread::spawn(move || {
            let cipher = XChaCha20Poly1305::new(&key.0);
            let mut index: u64 = 0;
            loop {
                let len_bytes = match read_exact_from(&mut upstream, 4) {
                    Ok(Some(b)) => b,
                    Ok(None) => return,
                    Err(e) => {
                        let _ = tx.send(WorkItem::Err(e));
                        return;
                    }
                };
                let frame_len =
                    u32::from_le_bytes(len_bytes.try_into().expect("4 bytes")) as i64;
                let ciphertext = match read_exact_from(&mut upstream, frame_len) {
                    Ok(Some(b)) => b,
                    Ok(None) => {
                        let _ = tx.send(WorkItem::Err(SyncError::crypto(
                            "truncated ciphertext frame",
                        )));
                        return;
                    }
                    Err(e) => {
                        let _ = tx.send(WorkItem::Err(e));
                        return;
                    }
                };
                let nonce = nonce_for_frame(&base_nonce, index);
                index += 1;
                match cipher.decrypt(&nonce, ciphertext.as_slice()) {
                    Ok(plaintext) => {
                        if tx.send(WorkItem::Data(plaintext)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(WorkItem::Err(SyncError::crypto(format!(
                            "decryption failed (tampered or wrong key): {e}"
                        ))));
                        return;
                    }
                }
            }
        });

        Ok(Self {
            rx,
            handle: Some(handle),
            out: RingBuffer::new(),
            done: false,
        })
    }

    fn pump(&mut self) -> Result<()> {
        match self.rx.recv() {
            Ok(WorkItem::Data(bytes)) => {
                self.out.write(bytes);
                Ok(())
            }
            Ok(WorkItem::Err(e)) => {
                self.done = true;
                Err(e)
            }
            Err(_) => {
                self.done = true;
                Ok(())
            }
        }
    }
}

impl PullRead for DecryptStream {
    fn read(&mut self, n: i64) -> Result<Vec<u8>> {
        while !self.done && (n < 0 || self.out.len() < n as usize) {
            self.pump()?;
        }
        Ok(self.out.read(n))
    }
}

impl Drop for DecryptStream {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Reads exactly `n` bytes from `upstream`, returning `None` at a clean
/// EOF (no bytes read at all) and an error on a partial read.
fn read_exact_from<R: PullRead>(upstream: &mut R, n: i64) -> Result<Option<Vec<u8>>> {
    let mut out = Vec::new();
    while (out.len() as i64) < n {
        let chunk = upstream.read(n - out.len() as i64)?;
        if chunk.is_empty() {
            return if out.is_empty() {
                Ok(None)
            } else {
                Err(SyncError::crypto("truncated read"))
            };
        }
        out.extend(chunk);
    }
    Ok(Some(out))
}
