//! Unified pull-shaped stream contract shared by every adapter in the
//! compress/hash/encrypt pipeline.

use crate::error::Result;

/// A pull-shaped reader: callers ask for up to `n` bytes and get back
/// however many are currently available, with an empty result meaning
/// end-of-stream. Implementations may perform any number of upstream
/// pulls internally to satisfy one call.
pub trait PullRead {
    /// Read up to `n` bytes (`n < 0` means "all remaining bytes").
    /// Returns an empty `Vec` only at end-of-stream.
    fn read(&mut self, n: i64) -> Result<Vec<u8>>;

    /// Drain the stream to completion and return everything it produces.
    fn read_to_end(&mut self) -> Result<Vec<u8>> {
        self.read(-1)
    }
}

/// Adapts a plain byte slice into a `PullRead` source, the base case at
/// the top of an upload chain or the base case for tests.
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<'a> PullRead for SliceSource<'a> {
    fn read(&mut self, n: i64) -> Result<Vec<u8>> {
        let remaining = self.data.len() - self.pos;
        let want = if n < 0 {
            remaining
        } else {
            (n as usize).min(remaining)
        };
        let out = self.data[self.pos..self.pos + want].to_vec();
        self.pos += want;
        Ok(out)
    }
}

/// Adapts a `std::io::Read` into a `PullRead`, used at the top of the
/// upload chain (reading a local file) and the bottom of the download
/// chain (reading the network response body).
pub struct ReaderSource<R> {
    inner: R,
    chunk_size: usize,
}

impl<R: std::io::Read> ReaderSource<R> {
    pub const DEFAULT_CHUNK: usize = 16 * 1024;

    pub fn new(inner: R) -> Self {
        Self {
            inner,
            chunk_size: Self::DEFAULT_CHUNK,
        }
    }
}

impl<R: std::io::Read> PullRead for ReaderSource<R> {
    fn read(&mut self, n: i64) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let target = if n < 0 { usize::MAX } else { n as usize };

        while out.len() < target {
            let mut buf = vec![0u8; self.chunk_size.min(target - out.len()).max(1)];
            let read = self.inner.read(&mut buf)?;
            if read == 0 {
                break;
            }
            out.extend_from_slice(&buf[..read]);
            if n < 0 {
                continue;
            }
            if out.len() >= target {
                break;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_source_pulls_in_pieces() {
        let mut s = SliceSource::new(b"hello world");
        assert_eq!(s.read(5).unwrap(), b"hello");
        assert_eq!(s.read(-1).unwrap(), b" world");
        assert_eq!(s.read(1).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn reader_source_drains_to_end() {
        let cursor = std::io::Cursor::new(b"abcdefgh".to_vec());
        let mut s = ReaderSource::new(cursor);
        assert_eq!(s.read_to_end().unwrap(), b"abcdefgh");
    }
}
