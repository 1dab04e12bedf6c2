//! Checksummed binary envelope around checkpoint payloads.
//!
//! Layout: a 4-byte little-endian header length, the bincode-encoded
//! [`EnvelopeHeader`], then the payload bytes.

use kiln_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::CheckpointError;

/// Magic bytes identifying a Kiln checkpoint file.
const CHECKPOINT_MAGIC: [u8; 4] = *b"KILN";

/// Current envelope format version. Increment on breaking changes to the
/// header layout.
const CHECKPOINT_FORMAT_VERSION: u32 = 1;

/// What an envelope carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadKind {
    /// An encoded [`CheckpointRecord`](crate::CheckpointRecord).
    State,
    /// Program tree bytes from the front end's codec.
    Tree,
}

/// Header prepended to every checkpoint payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    /// Magic bytes: must be `b"KILN"`.
    pub magic: [u8; 4],
    /// Envelope format version.
    pub format_version: u32,
    /// Compiler version that wrote the payload.
    pub compiler_version: String,
    /// What the payload is.
    pub kind: PayloadKind,
    /// Hash of the payload.
    pub checksum: ContentHash,
}

/// Wraps `payload` in an envelope.
pub fn seal(
    kind: PayloadKind,
    payload: &[u8],
    compiler_version: &str,
) -> Result<Vec<u8>, CheckpointError> {
    let header = EnvelopeHeader {
        magic: CHECKPOINT_MAGIC,
        format_version: CHECKPOINT_FORMAT_VERSION,
        compiler_version: compiler_version.to_string(),
        kind,
        checksum: ContentHash::from_bytes(payload),
    };
    let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
        .map_err(|e| CheckpointError::Serialization {
            reason: e.to_string(),
        })?;

    let header_len = header_bytes.len() as u32;
    let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(payload);
    Ok(output)
}

/// Validates an envelope of the expected kind and returns its header and
/// payload.
pub fn open(
    bytes: &[u8],
    expected: PayloadKind,
) -> Result<(EnvelopeHeader, &[u8]), CheckpointError> {
    let invalid = |reason: &str| CheckpointError::InvalidHeader {
        reason: reason.to_string(),
    };
    let len_bytes: [u8; 4] = bytes
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| invalid("truncated header length"))?;
    let header_len = u32::from_le_bytes(len_bytes) as usize;
    let header_bytes = bytes
        .get(4..4 + header_len)
        .ok_or_else(|| invalid("truncated header"))?;

    let (header, _): (EnvelopeHeader, usize) =
        bincode::serde::decode_from_slice(header_bytes, bincode::config::standard())
            .map_err(|e| invalid(&e.to_string()))?;

    if header.magic != CHECKPOINT_MAGIC {
        return Err(invalid("not a kiln checkpoint"));
    }
    if header.format_version != CHECKPOINT_FORMAT_VERSION {
        return Err(CheckpointError::VersionMismatch {
            expected: CHECKPOINT_FORMAT_VERSION,
            actual: header.format_version,
        });
    }
    if header.kind != expected {
        return Err(invalid(&format!(
            "expected {expected:?} payload, found {:?}",
            header.kind
        )));
    }

    let payload = &bytes[4 + header_len..];
    let actual = ContentHash::from_bytes(payload);
    if actual != header.checksum {
        return Err(CheckpointError::ChecksumMismatch {
            expected: header.checksum.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok((header, payload))
}
