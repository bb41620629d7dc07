//! Content fingerprints for uploaded image sets.
//!
//! A [`Fingerprint`] is the cache key of the analysis cache. It is derived
//! from a bounded signature of each buffer rather than the whole buffer:
//!
//! - the first 2 KiB,
//! - 1 KiB from the middle, for buffers larger than 4 KiB,
//! - the last 1 KiB, for buffers larger than 2 KiB (never overlapping the head).
//!
//! Re-encodes of the same photo that only differ outside those windows
//! (typically trailing metadata) map to the same key. This is a deliberate
//! trade of uniqueness for hit rate.
//!
//! The signatures are prefixed with `count:<N>|` so a carousel never shares a
//! key with a single image whose bytes happen to match its first element.

use std::fmt;

use sha2::{Digest, Sha256};
use tracing::warn;

/// Bytes taken from the start of every buffer.
const HEAD_LEN: usize = 2048;
/// Bytes taken from the middle of buffers larger than [`MIDDLE_THRESHOLD`].
const MIDDLE_LEN: usize = 1024;
const MIDDLE_THRESHOLD: usize = 4096;
/// Bytes taken from the end of buffers larger than [`HEAD_LEN`].
const TAIL_LEN: usize = 1024;
/// Number of whole buffers hashed by the fallback path.
const FALLBACK_BUFFERS: usize = 3;
/// Length of [`Fingerprint::short`].
const SHORT_LEN: usize = 16;

/// SHA-256 hex digest identifying a buffer sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Full 64-character hex digest. This is the cache key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 16 hex characters, for log lines only.
    pub fn short(&self) -> &str {
        &self.0[..SHORT_LEN.min(self.0.len())]
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the fingerprint of an ordered set of image buffers.
///
/// Never fails: if any buffer cannot produce a signature, the digest of the
/// first three whole buffers is returned instead (see [`fallback_fingerprint`]).
pub fn derive_fingerprint<B: AsRef<[u8]>>(buffers: &[B]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(format!("count:{}|", buffers.len()).as_bytes());

    for (index, buffer) in buffers.iter().enumerate() {
        match signature(buffer.as_ref()) {
            Some(parts) => {
                for part in parts {
                    hasher.update(part);
                }
            }
            None => {
                warn!(
                    index,
                    len = buffer.as_ref().len(),
                    "signature extraction failed, using fallback hash"
                );
                return fallback_fingerprint(buffers);
            }
        }
    }

    Fingerprint(hex::encode(hasher.finalize()))
}

/// Digest of the concatenation of at most the first three whole buffers.
pub fn fallback_fingerprint<B: AsRef<[u8]>>(buffers: &[B]) -> Fingerprint {
    let mut hasher = Sha256::new();
    for buffer in buffers.iter().take(FALLBACK_BUFFERS) {
        hasher.update(buffer.as_ref());
    }
    Fingerprint(hex::encode(hasher.finalize()))
}

/// Head, optional middle and optional tail windows of one buffer.
///
/// Returns `None` for an empty buffer, which has no meaningful signature.
fn signature(buffer: &[u8]) -> Option<[&[u8]; 3]> {
    let len = buffer.len();
    if len == 0 {
        return None;
    }

    let head = buffer.get(..HEAD_LEN.min(len))?;

    let middle: &[u8] = if len > MIDDLE_THRESHOLD {
        let mid = len / 2;
        buffer.get(mid..mid + MIDDLE_LEN)?
    } else {
        &[]
    };

    let tail: &[u8] = if len > HEAD_LEN {
        buffer.get(len.saturating_sub(TAIL_LEN).max(HEAD_LEN)..)?
    } else {
        &[]
    };

    Some([head, middle, tail])
}
