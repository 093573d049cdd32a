//! FIFO byte queue backing the stream adapters.
//!
//! Chunks are stored whole and only split when a `read` would otherwise
//! overshoot, so the common case (reading whole chunks as produced by an
//! upstream pull) never copies.

use std::collections::VecDeque;

/// A FIFO queue of byte chunks with size-bounded reads.
///
/// Not `Sync`; each stream adapter owns exactly one of these and reads
/// and writes happen on whichever thread currently holds the adapter.
#[derive(Default)]
pub struct RingBuffer {
    chunks: VecDeque<Vec<u8>>,
    len: usize,
}

impl RingBuffer {
    pub fn new() -> Self {
        Self {
            chunks: VecDeque::new(),
            len: 0,
        }
    }

    /// Total number of buffered bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a chunk. Empty chunks are dropped rather than queued.
    pub fn write(&mut self, data: Vec<u8>) {
        if data.is_empty() {
            return;
        }
        self.len += data.len();
        self.chunks.push_back(data);
    }

    /// Pop up to `n` bytes in logical (FIFO) order. `n < 0` reads
    /// everything currently buffered. Splits the final chunk consumed if
    /// it would otherwise overshoot `n`, pushing the remainder back to
    /// the front of the queue.
    pub fn read(&mut self, n: i64) -> Vec<u8> {
        let want = if n < 0 {
            self.len
        } else {
            (n as usize).min(self.len)
        };

        if want == 0 {
            return Vec::new();
        }

        let mut out = Vec::with_capacity(want);
        let mut remaining = want;

        while remaining > 0 {
            let mut chunk = match self.chunks.pop_front() {
                Some(c) => c,
                None => break,
            };

            if chunk.len() <= remaining {
                remaining -= chunk.len();
                self.len -= chunk.len();
                out.append(&mut chunk);
            } else {
                let tail = chunk.split_off(remaining);
                self.len -= remaining;
                out.append(&mut chunk);
                self.chunks.push_front(tail);
                remaining = 0;
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_negative_drains_everything() {
        let mut buf = RingBuffer::new();
        buf.write(b"hello".to_vec());
        buf.write(b" world".to_vec());
        assert_eq!(buf.len(), 11);
        assert_eq!(buf.read(-1), b"hello world");
        assert!(buf.is_empty());
    }

    #[test]
    fn read_splits_chunk_when_overshooting() {
        let mut buf = RingBuffer::new();
        buf.write(b"abcdef".to_vec());
        buf.write(b"ghij".to_vec());
        assert_eq!(buf.read(4), b"abcd");
        assert_eq!(buf.len(), 6);
        assert_eq!(buf.read(4), b"efgh");
        assert_eq!(buf.read(-1), b"ij");
        assert!(buf.is_empty());
    }

    #[test]
    fn read_more_than_available_returns_all_available() {
        let mut buf = RingBuffer::new();
        buf.write(b"abc".to_vec());
        assert_eq!(buf.read(100), b"abc");
        assert!(buf.is_empty());
    }

    #[test]
    fn reads_stay_contiguous_across_many_writes() {
        let mut buf = RingBuffer::new();
        for i in 0..10u8 {
            buf.write(vec![i; 3]);
        }
        let mut got = Vec::new();
        loop {
            let chunk = buf.read(7);
            if chunk.is_empty() {
                break;
            }
            got.extend(chunk);
        }
        let expected: Vec<u8> = (0..10u8).flat_map(|i| vec![i; 3]).collect();
        assert_eq!(got, expected);
    }
}
