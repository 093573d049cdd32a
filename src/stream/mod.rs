//! Streaming compress/hash/encrypt pipeline.
//!
//! Every adapter implements [`PullRead`]; they are chained like
//! `file -> Hash -> Gzip compress -> Encrypt -> remote writer` for
//! uploads and the mirror image for downloads (§4.B).

pub mod crypto;
pub mod gzip;
pub mod hash;
pub mod pull;
pub mod ring_buffer;

pub use crypto::{CryptoKey, DecryptStream, EncryptStream};
pub use gzip::{GzipCompressStream, GzipDecompressStream};
pub use hash::{HashAlgorithm, HashStream};
pub use pull::{PullRead, ReaderSource, SliceSource};
pub use ring_buffer::RingBuffer;
