//! GLB framing: the 12-byte header plus length/type-prefixed chunks that wrap
//! the JSON document and the binary payload of a `.vrm` / `.vrma` / `.glb` file.

use bytes::Bytes;

use crate::error::{FramingError, Result};
use crate::{log_debug, log_warn};

pub const GLB_MAGIC: [u8; 4] = *b"glTF";
pub const GLB_VERSION: u32 = 2;
pub const HEADER_LENGTH: usize = 12;
pub const CHUNK_HEADER_LENGTH: usize = 8;

/// Chunk type tag for the JSON chunk (`"JSON"` read as little-endian u32).
pub const CHUNK_JSON: u32 = 0x4E4F_534A;
/// Chunk type tag for the binary chunk (`"BIN\0"` read as little-endian u32).
pub const CHUNK_BIN: u32 = 0x004E_4942;

/// Chunk payloads extracted from a container.
///
/// Both fields borrow from the input buffer; no payload is copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    /// JSON text with trailing space padding removed.
    pub json: Bytes,
    /// The BIN chunk including any trailing zero padding, if present.
    pub bin: Option<Bytes>,
}

// ─── Read path ────────────────────────────────────────────────────────────────

/// Split a GLB container into its JSON text and binary chunk.
pub fn decode_container(bytes: impl Into<Bytes>) -> Result<Container> {
    let bytes: Bytes = bytes.into();

    if bytes.len() < HEADER_LENGTH {
        return Err(FramingError::TruncatedOrCorrupt {
            declared: HEADER_LENGTH,
            actual: bytes.len(),
        }
        .into());
    }

    let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
    if magic != GLB_MAGIC {
        return Err(FramingError::BadMagic { found: magic }.into());
    }

    let version = read_u32(&bytes, 4);
    if version != GLB_VERSION {
        return Err(FramingError::UnsupportedVersion(version).into());
    }

    let declared = read_u32(&bytes, 8) as usize;
    if declared != bytes.len() {
        return Err(FramingError::TruncatedOrCorrupt {
            declared,
            actual: bytes.len(),
        }
        .into());
    }

    let mut json = None;
    let mut bin = None;
    let mut cursor = HEADER_LENGTH;
    let mut chunk_index = 0usize;

    while cursor < bytes.len() {
        if cursor + CHUNK_HEADER_LENGTH > bytes.len() {
            return Err(FramingError::TruncatedOrCorrupt {
                declared: cursor + CHUNK_HEADER_LENGTH,
                actual: bytes.len(),
            }
            .into());
        }

        let length = read_u32(&bytes, cursor) as usize;
        let kind = read_u32(&bytes, cursor + 4);
        let start = cursor + CHUNK_HEADER_LENGTH;
        let end = start
            .checked_add(length)
            .filter(|end| *end <= bytes.len())
            .ok_or(FramingError::TruncatedOrCorrupt {
                declared: start.saturating_add(length),
                actual: bytes.len(),
            })?;

        if length % 4 != 0 {
            log_warn!("chunk {chunk_index} length {length} is not 4-byte aligned");
        }

        match (chunk_index, kind) {
            (0, CHUNK_JSON) => json = Some(bytes.slice(start..end)),
            (0, _) => return Err(FramingError::MissingJsonChunk.into()),
            (_, CHUNK_BIN) if bin.is_none() => bin = Some(bytes.slice(start..end)),
            (_, CHUNK_BIN) => log_warn!("ignoring additional BIN chunk {chunk_index}"),
            (_, other) => log_debug!("skipping unknown chunk type {other:#010x}"),
        }

        cursor = end;
        chunk_index += 1;
    }

    let json = json.ok_or(FramingError::MissingJsonChunk)?;
    Ok(Container {
        json: strip_json_padding(json),
        bin,
    })
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn strip_json_padding(json: Bytes) -> Bytes {
    let trimmed = json
        .iter()
        .rposition(|byte| *byte != b' ')
        .map(|last| last + 1)
        .unwrap_or(0);
    json.slice(..trimmed)
}

// ─── Write path ───────────────────────────────────────────────────────────────

/// Frame JSON text and a binary payload as a GLB container.
///
/// An empty `bin` produces a container with no BIN chunk.
pub fn encode_container(json: &[u8], bin: &[u8]) -> Vec<u8> {
    let mut chunks = Vec::with_capacity(json.len() + bin.len() + 2 * CHUNK_HEADER_LENGTH + 6);
    push_chunk(&mut chunks, CHUNK_JSON, json, b' ');
    if !bin.is_empty() {
        push_chunk(&mut chunks, CHUNK_BIN, bin, 0);
    }

    // The header carries the total length, so it is written once the chunks are laid out.
    let total = HEADER_LENGTH + chunks.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&GLB_MAGIC);
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.append(&mut chunks);
    out
}

fn push_chunk(out: &mut Vec<u8>, kind: u32, payload: &[u8], pad: u8) {
    let padded = align4(payload.len());
    out.extend_from_slice(&(padded as u32).to_le_bytes());
    out.extend_from_slice(&kind.to_le_bytes());
    out.extend_from_slice(payload);
    out.resize(out.len() + (padded - payload.len()), pad);
}

/// Round up to the next multiple of four.
pub fn align4(value: usize) -> usize {
    (value + 3) & !3
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;

    use super::*;
    use crate::error::VrmError;

    fn minimal_json() -> &'static [u8] {
        br#"{"asset":{"version":"2.0"},"nodes":[{}]}"#
    }

    #[test]
    fn given_minimal_container_when_decoding_then_json_is_returned_without_bin() {
        let bytes = encode_container(minimal_json(), &[]);
        assert_eq!(bytes.len() % 4, 0);

        let container = decode_container(bytes).expect("container should decode");
        assert_eq!(container.json.as_ref(), minimal_json());
        assert!(container.bin.is_none());
    }

    #[test]
    fn given_declared_length_too_large_when_decoding_then_truncated_error_is_returned() {
        let mut bytes = encode_container(minimal_json(), &[1, 2, 3]);
        let actual = bytes.len();
        bytes[8..12].copy_from_slice(&((actual + 10) as u32).to_le_bytes());

        let err = decode_container(bytes).expect_err("length mismatch must fail");
        assert!(matches!(
            err,
            VrmError::ContainerFraming(FramingError::TruncatedOrCorrupt { declared, actual: found })
                if declared == actual + 10 && found == actual
        ));
    }

    #[test]
    fn given_wrong_magic_when_decoding_then_bad_magic_is_reported() {
        let mut bytes = encode_container(minimal_json(), &[]);
        bytes[0..4].copy_from_slice(b"glTf");

        let err = decode_container(bytes).expect_err("magic must be checked");
        assert!(matches!(
            err,
            VrmError::ContainerFraming(FramingError::BadMagic { .. })
        ));
    }

    #[test]
    fn given_version_one_header_when_decoding_then_version_is_rejected() {
        let mut bytes = encode_container(minimal_json(), &[]);
        bytes[4..8].copy_from_slice(&1u32.to_le_bytes());

        let err = decode_container(bytes).expect_err("version 1 is not supported");
        assert!(matches!(
            err,
            VrmError::ContainerFraming(FramingError::UnsupportedVersion(1))
        ));
    }

    #[test]
    fn given_bin_first_when_decoding_then_missing_json_chunk_is_reported() {
        let mut bytes = Vec::new();
        push_chunk(&mut bytes, CHUNK_BIN, &[0, 0, 0, 0], 0);
        let mut framed = Vec::new();
        framed.extend_from_slice(&GLB_MAGIC);
        framed.extend_from_slice(&GLB_VERSION.to_le_bytes());
        framed.extend_from_slice(&((HEADER_LENGTH + bytes.len()) as u32).to_le_bytes());
        framed.extend_from_slice(&bytes);

        let err = decode_container(framed).expect_err("JSON must come first");
        assert!(matches!(
            err,
            VrmError::ContainerFraming(FramingError::MissingJsonChunk)
        ));
    }

    #[test]
    fn given_unknown_chunk_between_json_and_bin_when_decoding_then_it_is_skipped() {
        let mut chunks = Vec::new();
        push_chunk(&mut chunks, CHUNK_JSON, minimal_json(), b' ');
        push_chunk(&mut chunks, 0x1234_5678, b"vendor", 0);
        push_chunk(&mut chunks, CHUNK_BIN, &[9, 8, 7, 6], 0);
        let mut framed = Vec::new();
        framed.extend_from_slice(&GLB_MAGIC);
        framed.extend_from_slice(&GLB_VERSION.to_le_bytes());
        framed.extend_from_slice(&((HEADER_LENGTH + chunks.len()) as u32).to_le_bytes());
        framed.extend_from_slice(&chunks);

        let container = decode_container(framed).expect("unknown chunks are not fatal");
        assert_eq!(container.bin.as_deref(), Some(&[9u8, 8, 7, 6][..]));
    }

    #[test]
    fn given_chunk_running_past_end_when_decoding_then_truncated_error_is_returned() {
        let mut bytes = encode_container(minimal_json(), &[1, 2, 3, 4]);
        // Inflate the BIN chunk length while keeping the header length honest.
        let bin_header = HEADER_LENGTH + CHUNK_HEADER_LENGTH + align4(minimal_json().len());
        bytes[bin_header..bin_header + 4].copy_from_slice(&64u32.to_le_bytes());

        let err = decode_container(bytes).expect_err("overrun must fail");
        assert!(matches!(
            err,
            VrmError::ContainerFraming(FramingError::TruncatedOrCorrupt { .. })
        ));
    }

    #[test]
    fn given_encoded_container_when_reading_with_gltf_crate_then_chunks_match() {
        let bin = vec![1u8, 2, 3, 4, 5];
        let bytes = encode_container(minimal_json(), &bin);

        let glb = gltf::binary::Glb::from_slice(&bytes).expect("gltf crate should accept output");
        let json: serde_json::Value =
            serde_json::from_slice(glb.json.as_ref()).expect("padded JSON still parses");
        assert_eq!(json["asset"]["version"], "2.0");
        let read_bin = glb.bin.expect("BIN chunk present");
        assert_eq!(&read_bin[..bin.len()], &bin[..]);
        assert_eq!(read_bin.len(), 8);
    }

    #[quickcheck]
    fn framing_round_trip_preserves_json_and_bin(json: String, bin: Vec<u8>) -> bool {
        let bytes = encode_container(json.as_bytes(), &bin);
        if bytes.len() % 4 != 0 {
            return false;
        }

        let Ok(container) = decode_container(bytes) else {
            return false;
        };

        let expected_json = json.trim_end_matches(' ').as_bytes();
        let read_bin = container.bin.unwrap_or_default();
        container.json.as_ref() == expected_json
            && read_bin.len() == align4(bin.len())
            && read_bin[..bin.len()] == bin[..]
            && read_bin[bin.len()..].iter().all(|byte| *byte == 0)
    }
}
