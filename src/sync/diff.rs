//! Diff engine (§4.G): merge-walks two sorted `PathEntity` streams.
//!
//! Grounded on the case-insensitive total ordering `IndexEntry` and
//! `PathEntity` both define (`original_source/index/secure_index.py`'s
//! `IndexEntry.__le__`): both streams are produced pre-sorted by their
//! respective folders, so a single linear merge pairs every entry on
//! exactly one side unless both have it, with no resorting here.

use crate::folder::PathEntity;

/// One step of the merge-walk: the source-side entry, the destination-
/// side entry, or both when they compare equal.
#[derive(Debug)]
pub struct DiffPair {
    pub src: Option<PathEntity>,
    pub dst: Option<PathEntity>,
}

fn key(entity: &PathEntity) -> String {
    entity.relative_path.to_lowercase()
}

/// Merge-walks `src` and `dst`, both assumed sorted case-insensitively
/// by `relative_path` with directories preceding their contents. Yields
/// one `DiffPair` per distinct path; no entry is yielded twice (§8
/// property 4).
pub fn diff(src: Vec<PathEntity>, dst: Vec<PathEntity>) -> Vec<DiffPair> {
    let mut pairs = Vec::new();
    let mut src_iter = src.into_iter().peekable();
    let mut dst_iter = dst.into_iter().peekable();

    loop {
        match (src_iter.peek(), dst_iter.peek()) {
            (None, None) => break,
            (Some(_), None) => {
                pairs.push(DiffPair {
                    src: src_iter.next(),
                    dst: None,
                });
            }
            (None, Some(_)) => {
                pairs.push(DiffPair {
                    src: None,
                    dst: dst_iter.next(),
                });
            }
            (Some(s), Some(d)) => {
                let (sk, dk) = (key(s), key(d));
                match sk.cmp(&dk) {
                    std::cmp::Ordering::Less => {
                        pairs.push(DiffPair {
                            src: src_iter.next(),
                            dst: None,
                        });
                    }
                    std::cmp::Ordering::Greater => {
                        pairs.push(DiffPair {
                            src: None,
                            dst: dst_iter.next(),
                        });
                    }
                    std::cmp::Ordering::Equal => {
                        pairs.push(DiffPair {
                            src: src_iter.next(),
                            dst: dst_iter.next(),
                        });
                    }
                }
            }
        }
    }

    pairs
}
