//! Entry Codec Module
//!
//! Versioned binary encoding of payloads.
//!
//! Blob layout:
//! ```text
//! +------+---------+-------------------+------------------+
//! | P123 | version | checksum (8 bytes) | bincode(Payload) |
//! +------+---------+-------------------+------------------+
//! ```
//! The checksum is the first 8 bytes of SHA-256 over the body.

use sha2::{Digest, Sha256};

use crate::cache::Payload;
use crate::error::{CacheError, DecodeError, Result};

/// Leading bytes of every blob.
pub const MAGIC: &[u8; 4] = b"P123";

/// Current blob format version. Bump whenever `Payload` changes shape.
pub const FORMAT_VERSION: u8 = 2;

const CHECKSUM_LEN: usize = 8;
const HEADER_LEN: usize = MAGIC.len() + 1 + CHECKSUM_LEN;

// == Encode ==
/// Serializes a payload into a self-describing blob.
pub fn encode(payload: &Payload) -> Result<Vec<u8>> {
    let body = bincode::serialize(payload)
        .map_err(|e| CacheError::InvalidParameters(format!("payload cannot be encoded: {e}")))?;

    let mut blob = Vec::with_capacity(HEADER_LEN + body.len());
    blob.extend_from_slice(MAGIC);
    blob.push(FORMAT_VERSION);
    blob.extend_from_slice(&checksum(&body));
    blob.extend_from_slice(&body);
    Ok(blob)
}

// == Decode ==
/// Reconstitutes a payload, rejecting foreign, stale or damaged blobs.
pub fn decode(blob: &[u8]) -> std::result::Result<Payload, DecodeError> {
    if blob.len() < HEADER_LEN {
        return Err(DecodeError::Truncated(blob.len()));
    }

    let (magic, rest) = blob.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(DecodeError::BadMagic);
    }

    let version = rest[0];
    if version != FORMAT_VERSION {
        return Err(DecodeError::UnsupportedVersion {
            found: version,
            expected: FORMAT_VERSION,
        });
    }

    let (stored_sum, body) = rest[1..].split_at(CHECKSUM_LEN);
    if stored_sum != checksum(body) {
        return Err(DecodeError::ChecksumMismatch);
    }

    bincode::deserialize(body).map_err(|e| DecodeError::Malformed(e.to_string()))
}

fn checksum(body: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = Sha256::digest(body);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}
