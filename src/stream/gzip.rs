//! Gzip compress/decompress stream adapters.
//!
//! Grounded on the chunk-then-buffer shape of the original's
//! `GzipCompressStream`/`GzipDecompressStream`: pull a fixed-size chunk
//! from upstream, feed it to the codec, stash whatever the codec
//! produces in a ring buffer, and only hand back exactly what the
//! caller asked for.

use crate::error::{Result, SyncError};
use crate::stream::pull::PullRead;
use crate::stream::ring_buffer::RingBuffer;
use flate2::write::{GzDecoder, GzEncoder};
use flate2::Compression;
use std::io::Write;

const UPSTREAM_CHUNK: usize = 16 * 1024;

/// Wraps an upstream `PullRead` and produces its gzip-compressed bytes.
pub struct GzipCompressStream<R> {
    upstream: R,
    encoder: Option<GzEncoder<Vec<u8>>>,
    out: RingBuffer,
    upstream_done: bool,
}

impl<R: PullRead> GzipCompressStream<R> {
    pub fn new(upstream: R) -> Self {
        Self::with_level(upstream, Compression::best())
    }

    pub fn with_level(upstream: R, level: Compression) -> Self {
        Self {
            upstream,
            encoder: Some(GzEncoder::new(Vec::new(), level)),
            out: RingBuffer::new(),
            upstream_done: false,
        }
    }

    fn pump(&mut self) -> Result<()> {
        let chunk = self.upstream.read(UPSTREAM_CHUNK as i64)?;
        if chunk.is_empty() {
            self.upstream_done = true;
            if let Some(encoder) = self.encoder.take() {
                let finished = encoder
                    .finish()
                    .map_err(|e| SyncError::Compression(e.to_string()))?;
                self.out.write(finished);
            }
            return Ok(());
        }
        let encoder = self
            .encoder
            .as_mut()
            .expect("encoder only taken once upstream is exhausted");
        encoder
            .write_all(&chunk)
            .map_err(|e| SyncError::Compression(e.to_string()))?;
        let produced = std::mem::take(encoder.get_mut());
        self.out.write(produced);
        Ok(())
    }
}

impl<R: PullRead> PullRead for GzipCompressStream<R> {
    fn read(&mut self, n: i64) -> Result<Vec<u8>> {
        while !self.upstream_done && (n < 0 || self.out.len() < n as usize) {
            self.pump()?;
        }
        Ok(self.out.read(n))
    }
}

/// Wraps an upstream `PullRead` of gzip-compressed bytes and produces
/// the decompressed plaintext.
pub struct GzipDecompressStream<R> {
    upstream: R,
    decoder: GzDecoder<Vec<u8>>,
    out: RingBuffer,
    upstream_done: bool,
}

impl<R: PullRead> GzipDecompressStream<R> {
    pub fn new(upstream: R) -> Self {
        Self {
            upstream,
            decoder: GzDecoder::new(Vec::new()),
            out: RingBuffer::new(),
            upstream_done: false,
        }
    }

    fn pump(&mut self) -> Result<()> {
        let chunk = self.upstream.read(UPSTREAM_CHUNK as i64)?;
        if chunk.is_empty() {
            self.upstream_done = true;
            return Ok(());
        }
        self.decoder
            .write_all(&chunk)
            .map_err(|e| SyncError::Compression(e.to_string()))?;
        let produced = std::mem::take(self.decoder.get_mut());
        self.out.write(produced);
        Ok(())
    }
}

impl<R: PullRead> PullRead for GzipDecompressStream<R> {
    fn read(&mut self, n: i64) -> Result<Vec<u8>> {
        while !self.upstream_done && (n < 0 || self.out.len() < n as usize) {
            self.pump()?;
        }
        if self.upstream_done && self.out.is_empty() {
            self.decoder
                .try_finish()
                .map_err(|e| SyncError::Compression(e.to_string()))?;
        }
        Ok(self.out.read(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::pull::SliceSource;

    #[test]
    fn compress_then_decompress_round_trips() {
        let original = b"the quick brown fox jumps over the lazy dog".repeat(50);

        let mut compressor = GzipCompressStream::new(SliceSource::new(&original));
        let compressed = compressor.read_to_end().unwrap();
        assert!(compressed.len() < original.len());

        let mut decompressor = GzipDecompressStream::new(SliceSource::new(&compressed));
        let roundtrip = decompressor.read_to_end().unwrap();
        assert_eq!(roundtrip, original);
    }

    #[test]
    fn read_honors_requested_size() {
        let original = b"abcdefgh".repeat(4096);
        let mut compressor = GzipCompressStream::new(SliceSource::new(&original));
        let compressed = compressor.read_to_end().unwrap();

        let mut decompressor = GzipDecompressStream::new(SliceSource::new(&compressed));
        let mut got = Vec::new();
        loop {
            let chunk = decompressor.read(100).unwrap();
            if chunk.is_empty() {
                break;
            }
            assert!(chunk.len() <= 100);
            got.extend(chunk);
        }
        assert_eq!(got, original);
    }
}
