//! Versioned envelope format for cached artifacts.
//!
//! Layout: 4-byte magic, version byte, u32-LE length of a JSON header block,
//! the header block, u64-LE payload length, payload bytes. A record either
//! decodes completely or is structurally invalid; the store deletes invalid
//! records on sight.

use bytes::Bytes;
use thiserror::Error;

use crate::context::HeaderMap;

const MAGIC: [u8; 4] = *b"OMBC";
const VERSION: u8 = 1;

/// Fixed-size prefix: magic + version + header length.
const PREFIX_LEN: usize = MAGIC.len() + 1 + 4;
/// Length field separating the header block from the payload.
const PAYLOAD_LEN_FIELD: usize = 8;

/// A derived artifact as stored in the cache: payload bytes plus the
/// response headers to replay on a hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub payload: Bytes,
    pub headers: HeaderMap,
}

impl CacheEntry {
    pub fn new(payload: Bytes, headers: HeaderMap) -> Self {
        Self { payload, headers }
    }
}

/// Structural decode failures. Any of these marks the record as corrupt.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record is truncated")]
    Truncated,
    #[error("record magic bytes do not match")]
    BadMagic,
    #[error("unsupported record version {0}")]
    UnsupportedVersion(u8),
    #[error("record header block is not valid JSON")]
    Header(#[from] serde_json::Error),
    #[error("record payload length does not match the stored payload")]
    LengthMismatch,
}

/// Serialize an entry into its on-disk form.
pub(crate) fn encode(entry: &CacheEntry) -> Result<Vec<u8>, RecordError> {
    let header_block = serde_json::to_vec(&entry.headers)?;

    let mut raw = Vec::with_capacity(
        PREFIX_LEN + header_block.len() + PAYLOAD_LEN_FIELD + entry.payload.len(),
    );
    raw.extend_from_slice(&MAGIC);
    raw.push(VERSION);
    raw.extend_from_slice(&(header_block.len() as u32).to_le_bytes());
    raw.extend_from_slice(&header_block);
    raw.extend_from_slice(&(entry.payload.len() as u64).to_le_bytes());
    raw.extend_from_slice(&entry.payload);

    Ok(raw)
}

/// Deserialize an on-disk record, validating every structural invariant.
pub(crate) fn decode(raw: &[u8]) -> Result<CacheEntry, RecordError> {
    if raw.len() < PREFIX_LEN {
        return Err(RecordError::Truncated);
    }

    if raw[..MAGIC.len()] != MAGIC {
        return Err(RecordError::BadMagic);
    }

    let version = raw[MAGIC.len()];
    if version != VERSION {
        return Err(RecordError::UnsupportedVersion(version));
    }

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&raw[MAGIC.len() + 1..PREFIX_LEN]);
    let header_len = u32::from_le_bytes(len_bytes) as usize;

    let header_end = PREFIX_LEN
        .checked_add(header_len)
        .ok_or(RecordError::Truncated)?;
    let payload_start = header_end
        .checked_add(PAYLOAD_LEN_FIELD)
        .ok_or(RecordError::Truncated)?;
    if raw.len() < payload_start {
        return Err(RecordError::Truncated);
    }

    let headers: HeaderMap = serde_json::from_slice(&raw[PREFIX_LEN..header_end])?;

    let mut payload_len_bytes = [0u8; 8];
    payload_len_bytes.copy_from_slice(&raw[header_end..payload_start]);
    let payload_len = u64::from_le_bytes(payload_len_bytes);

    let payload = &raw[payload_start..];
    if payload.len() as u64 != payload_len {
        return Err(RecordError::LengthMismatch);
    }

    Ok(CacheEntry {
        payload: Bytes::copy_from_slice(payload),
        headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> CacheEntry {
        let mut headers = HeaderMap::new();
        headers.set("Content-Type", "image/png");
        headers.append("Vary", "Accept");
        headers.append("Vary", "Accept-Encoding");
        CacheEntry::new(Bytes::from_static(b"png bytes"), headers)
    }

    #[test]
    fn roundtrip_preserves_payload_and_headers() {
        let entry = sample_entry();
        let raw = encode(&entry).expect("encode");
        let decoded = decode(&raw).expect("decode");

        assert_eq!(decoded, entry);
        assert_eq!(decoded.headers.get_all("Vary").len(), 2);
    }

    #[test]
    fn empty_input_is_truncated() {
        assert!(matches!(decode(&[]), Err(RecordError::Truncated)));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut raw = encode(&sample_entry()).expect("encode");
        raw[0] = b'X';
        assert!(matches!(decode(&raw), Err(RecordError::BadMagic)));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut raw = encode(&sample_entry()).expect("encode");
        raw[4] = 99;
        assert!(matches!(
            decode(&raw),
            Err(RecordError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn garbage_header_block_is_rejected() {
        let entry = sample_entry();
        let mut raw = encode(&entry).expect("encode");
        // Stomp the JSON block without touching the length fields.
        raw[PREFIX_LEN] = b'!';
        assert!(matches!(decode(&raw), Err(RecordError::Header(_))));
    }

    #[test]
    fn short_payload_is_a_length_mismatch() {
        let mut raw = encode(&sample_entry()).expect("encode");
        raw.truncate(raw.len() - 1);
        assert!(matches!(decode(&raw), Err(RecordError::LengthMismatch)));
    }

    #[test]
    fn trailing_bytes_are_a_length_mismatch() {
        let mut raw = encode(&sample_entry()).expect("encode");
        raw.push(0);
        assert!(matches!(decode(&raw), Err(RecordError::LengthMismatch)));
    }

    #[test]
    fn oversized_header_length_is_truncated() {
        let mut raw = encode(&sample_entry()).expect("encode");
        raw[5..9].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(decode(&raw), Err(RecordError::Truncated)));
    }
}
