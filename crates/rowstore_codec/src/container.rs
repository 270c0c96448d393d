//! Versioned binary container framing.
//!
//! A container holds one table's serialized row set together with its
//! sequence counter. The layout is a fixed little-endian header followed
//! by a payload region:
//!
//! ```text
//! offset  size  field
//! 0       4     magic "RTBL"
//! 4       2     format version (u16)
//! 6       1     compression mode (u8)
//! 7       8     sequence counter (i64)
//! 15      4     record count (i32)
//! 19      4     stored payload length (u32)
//! 23      4     uncompressed payload length (u32)
//! 27      ..    payload region
//! ```
//!
//! Two framing versions coexist. Version 2 (flat) is what new writers
//! emit: the payload is one contiguous, optionally compressed region.
//! Version 1 (page-oriented) is read-only legacy: the payload is split
//! across fixed-header pages that are reassembled before decompression.
//! Bytes past the stored payload length are dead space left behind by
//! shrinking rewrites and are ignored on decode.

use crate::compression::Compression;
use crate::error::{CodecError, CodecResult};

/// Magic bytes identifying a container file.
pub const CONTAINER_MAGIC: [u8; 4] = *b"RTBL";

/// Legacy page-oriented framing version (decode only).
pub const FORMAT_V1: u16 = 1;

/// Flat framing version; all new containers are written as v2.
pub const FORMAT_V2: u16 = 2;

/// The framing version emitted by `encode_container`.
pub const CURRENT_FORMAT_VERSION: u16 = FORMAT_V2;

/// Total length of the fixed container header.
pub const HEADER_LEN: usize = 27;

/// Byte offset of the sequence counter within the header.
///
/// The channel rewrites these eight bytes in place when the sequence
/// advances, without touching the payload.
pub const SEQUENCE_OFFSET: u64 = 7;

/// Length of a v1 page header.
const PAGE_HEADER_LEN: usize = 17;

/// The only page type v1 ever wrote.
const PAGE_TYPE_DATA: u8 = 1;

/// Decoded container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    /// Framing version the payload region uses.
    pub version: u16,
    /// Compression applied to the payload.
    pub compression: Compression,
    /// Persisted sequence counter (`-1` for a fresh table).
    pub sequence: i64,
    /// Number of live records in the payload.
    pub record_count: i32,
    /// Stored (possibly compressed) payload length in bytes.
    pub payload_len: u32,
    /// Payload length after decompression.
    pub uncompressed_len: u32,
}

impl ContainerHeader {
    /// Encodes the header into its fixed wire form.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&CONTAINER_MAGIC);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6] = self.compression.as_byte();
        buf[7..15].copy_from_slice(&self.sequence.to_le_bytes());
        buf[15..19].copy_from_slice(&self.record_count.to_le_bytes());
        buf[19..23].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[23..27].copy_from_slice(&self.uncompressed_len.to_le_bytes());
        buf
    }

    /// Decodes a header from the start of `data`.
    ///
    /// # Errors
    ///
    /// Returns `CorruptContainer` if the buffer is too short, the magic
    /// does not match, or the version/compression bytes are unknown.
    pub fn decode(data: &[u8]) -> CodecResult<Self> {
        if data.len() < HEADER_LEN {
            return Err(CodecError::corrupt_container(format!(
                "container too short: {} bytes, header needs {HEADER_LEN}",
                data.len()
            )));
        }

        if data[0..4] != CONTAINER_MAGIC {
            return Err(CodecError::corrupt_container("invalid container magic"));
        }

        let version = u16::from_le_bytes([data[4], data[5]]);
        if version != FORMAT_V1 && version != FORMAT_V2 {
            return Err(CodecError::corrupt_container(format!(
                "unsupported framing version {version}"
            )));
        }

        let compression = Compression::from_byte(data[6]).ok_or_else(|| {
            CodecError::corrupt_container(format!("unknown compression byte {}", data[6]))
        })?;

        let sequence = i64::from_le_bytes([
            data[7], data[8], data[9], data[10], data[11], data[12], data[13], data[14],
        ]);
        let record_count = i32::from_le_bytes([data[15], data[16], data[17], data[18]]);
        let payload_len = u32::from_le_bytes([data[19], data[20], data[21], data[22]]);
        let uncompressed_len = u32::from_le_bytes([data[23], data[24], data[25], data[26]]);

        Ok(Self {
            version,
            compression,
            sequence,
            record_count,
            payload_len,
            uncompressed_len,
        })
    }
}

/// Encodes a row payload into a complete v2 container.
///
/// `rows_bytes` is the uncompressed output of a [`RowCodec`]; zero rows
/// encode to a well-formed container with an empty payload region.
///
/// [`RowCodec`]: crate::RowCodec
pub fn encode_container(
    rows_bytes: &[u8],
    record_count: i32,
    sequence: i64,
    compression: Compression,
) -> CodecResult<Vec<u8>> {
    let stored = compression.compress(rows_bytes)?;

    let payload_len = u32::try_from(stored.len())
        .map_err(|_| CodecError::serialization("payload exceeds 4 GiB container limit"))?;
    let uncompressed_len = u32::try_from(rows_bytes.len())
        .map_err(|_| CodecError::serialization("payload exceeds 4 GiB container limit"))?;

    let header = ContainerHeader {
        version: CURRENT_FORMAT_VERSION,
        compression,
        sequence,
        record_count,
        payload_len,
        uncompressed_len,
    };

    let mut buf = Vec::with_capacity(HEADER_LEN + stored.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(&stored);
    Ok(buf)
}

/// Decodes a container, returning its header and uncompressed row payload.
///
/// Dispatches on the framing version read from the header: v2 payloads
/// are taken as-is, v1 payloads are reassembled from their page stream
/// first. Dead bytes past the stored payload are ignored.
///
/// # Errors
///
/// Returns `CorruptContainer` for any framing violation. The error is
/// fatal for the read; no partial row list is produced.
pub fn decode_container(data: &[u8]) -> CodecResult<(ContainerHeader, Vec<u8>)> {
    let header = ContainerHeader::decode(data)?;
    let region = &data[HEADER_LEN..];

    let stored = match header.version {
        FORMAT_V2 => {
            let len = header.payload_len as usize;
            if region.len() < len {
                return Err(CodecError::corrupt_container(format!(
                    "payload truncated: header declares {len} bytes, {} present",
                    region.len()
                )));
            }
            region[..len].to_vec()
        }
        FORMAT_V1 => reassemble_pages(region, header.payload_len as usize)?,
        // Unreachable: ContainerHeader::decode rejects other versions.
        v => {
            return Err(CodecError::corrupt_container(format!(
                "unsupported framing version {v}"
            )))
        }
    };

    let rows_bytes = header
        .compression
        .decompress(&stored, header.uncompressed_len as usize)?;

    Ok((header, rows_bytes))
}

/// Reassembles a v1 page stream into one contiguous payload buffer.
///
/// The region starts with a `u32` page count, followed by that many
/// pages. Page numbers must run strictly sequentially from 1 and each
/// page's next-page pointer must name its successor (0 for the last).
fn reassemble_pages(region: &[u8], expected_len: usize) -> CodecResult<Vec<u8>> {
    if region.len() < 4 {
        return Err(CodecError::corrupt_container(
            "v1 payload missing page count",
        ));
    }

    let page_count = u32::from_le_bytes([region[0], region[1], region[2], region[3]]);
    let mut cursor = 4usize;
    let mut assembled = Vec::with_capacity(expected_len);

    for index in 0..page_count {
        let expected_no = index + 1;

        if cursor + PAGE_HEADER_LEN > region.len() {
            return Err(CodecError::corrupt_container(format!(
                "container declares {page_count} pages but ends inside page {expected_no}"
            )));
        }

        let page = &region[cursor..];
        let page_no = u32::from_le_bytes([page[0], page[1], page[2], page[3]]);
        let page_type = page[4];
        let _page_version = u16::from_le_bytes([page[5], page[6]]);
        let data_start = u16::from_le_bytes([page[7], page[8]]) as usize;
        let next_page = u32::from_le_bytes([page[9], page[10], page[11], page[12]]);
        let in_page_len = u32::from_le_bytes([page[13], page[14], page[15], page[16]]) as usize;

        if page_no != expected_no {
            return Err(CodecError::corrupt_container(format!(
                "page sequence gap: expected page {expected_no}, found {page_no}"
            )));
        }

        if page_type != PAGE_TYPE_DATA {
            return Err(CodecError::corrupt_container(format!(
                "page {page_no} has unknown type {page_type}"
            )));
        }

        if data_start != PAGE_HEADER_LEN {
            return Err(CodecError::corrupt_container(format!(
                "page {page_no} declares data start {data_start}, expected {PAGE_HEADER_LEN}"
            )));
        }

        let expected_next = if expected_no == page_count {
            0
        } else {
            expected_no + 1
        };
        if next_page != expected_next {
            return Err(CodecError::corrupt_container(format!(
                "page {page_no} links to page {next_page}, expected {expected_next}"
            )));
        }

        let data_at = cursor + PAGE_HEADER_LEN;
        if data_at + in_page_len > region.len() {
            return Err(CodecError::corrupt_container(format!(
                "page {page_no} declares {in_page_len} data bytes past end of container"
            )));
        }

        assembled.extend_from_slice(&region[data_at..data_at + in_page_len]);
        cursor = data_at + in_page_len;
    }

    if assembled.len() != expected_len {
        return Err(CodecError::corrupt_container(format!(
            "reassembled payload is {} bytes, header declares {expected_len}",
            assembled.len()
        )));
    }

    Ok(assembled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Builds a v1 container by hand; no production writer emits v1.
    fn build_v1_container(
        rows_bytes: &[u8],
        record_count: i32,
        sequence: i64,
        compression: Compression,
        page_size: usize,
    ) -> Vec<u8> {
        let stored = compression.compress(rows_bytes).unwrap();

        let chunks: Vec<&[u8]> = if stored.is_empty() {
            Vec::new()
        } else {
            stored.chunks(page_size).collect()
        };

        let header = ContainerHeader {
            version: FORMAT_V1,
            compression,
            sequence,
            record_count,
            payload_len: stored.len() as u32,
            uncompressed_len: rows_bytes.len() as u32,
        };

        let mut buf = Vec::new();
        buf.extend_from_slice(&header.encode());
        buf.extend_from_slice(&(chunks.len() as u32).to_le_bytes());

        for (index, chunk) in chunks.iter().enumerate() {
            let page_no = (index + 1) as u32;
            let next = if index + 1 == chunks.len() {
                0
            } else {
                page_no + 1
            };
            buf.extend_from_slice(&page_no.to_le_bytes());
            buf.push(1); // page type: data
            buf.extend_from_slice(&1u16.to_le_bytes()); // page version
            buf.extend_from_slice(&(PAGE_HEADER_LEN as u16).to_le_bytes());
            buf.extend_from_slice(&next.to_le_bytes());
            buf.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
            buf.extend_from_slice(chunk);
        }

        buf
    }

    #[test]
    fn header_roundtrip() {
        let header = ContainerHeader {
            version: FORMAT_V2,
            compression: Compression::Brotli,
            sequence: 41,
            record_count: 7,
            payload_len: 1234,
            uncompressed_len: 5678,
        };

        let decoded = ContainerHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn encode_decode_v2() {
        let rows = br#"[{"id":0,"name":"a"},{"id":1,"name":"b"}]"#;
        let bytes = encode_container(rows, 2, 1, Compression::None).unwrap();

        let (header, payload) = decode_container(&bytes).unwrap();
        assert_eq!(header.version, FORMAT_V2);
        assert_eq!(header.record_count, 2);
        assert_eq!(header.sequence, 1);
        assert_eq!(payload, rows);
    }

    #[test]
    fn encode_decode_v2_brotli() {
        let rows: Vec<u8> = br#"{"id":0,"name":"row"}"#.repeat(500);
        let bytes = encode_container(&rows, 500, 499, Compression::Brotli).unwrap();
        assert!(bytes.len() < HEADER_LEN + rows.len());

        let (header, payload) = decode_container(&bytes).unwrap();
        assert_eq!(header.compression, Compression::Brotli);
        assert_eq!(header.uncompressed_len as usize, rows.len());
        assert_eq!(payload, rows);
    }

    #[test]
    fn zero_rows_is_well_formed() {
        let bytes = encode_container(b"", 0, -1, Compression::None).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN);

        let (header, payload) = decode_container(&bytes).unwrap();
        assert_eq!(header.record_count, 0);
        assert_eq!(header.sequence, -1);
        assert!(payload.is_empty());
    }

    #[test]
    fn dead_tail_bytes_are_ignored() {
        let rows = b"[1,2,3]";
        let mut bytes = encode_container(rows, 3, 2, Compression::None).unwrap();
        bytes.extend_from_slice(&[0xAA; 64]);

        let (_, payload) = decode_container(&bytes).unwrap();
        assert_eq!(payload, rows);
    }

    #[test]
    fn truncated_payload_is_corrupt() {
        let rows = b"[1,2,3,4,5,6,7,8]";
        let bytes = encode_container(rows, 8, 7, Compression::None).unwrap();

        let result = decode_container(&bytes[..bytes.len() - 3]);
        assert!(matches!(result, Err(CodecError::CorruptContainer { .. })));
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let rows = b"[]";
        let mut bytes = encode_container(rows, 0, -1, Compression::None).unwrap();
        bytes[0] = b'X';

        let result = decode_container(&bytes);
        assert!(matches!(result, Err(CodecError::CorruptContainer { .. })));
    }

    #[test]
    fn unknown_version_is_corrupt() {
        let rows = b"[]";
        let mut bytes = encode_container(rows, 0, -1, Compression::None).unwrap();
        bytes[4] = 9;
        bytes[5] = 0;

        let result = decode_container(&bytes);
        assert!(matches!(result, Err(CodecError::CorruptContainer { .. })));
    }

    #[test]
    fn short_buffer_is_corrupt() {
        let result = decode_container(&[0u8; 10]);
        assert!(matches!(result, Err(CodecError::CorruptContainer { .. })));
    }

    #[test]
    fn v1_single_page_decodes() {
        let rows = br#"[{"id":0},{"id":1}]"#;
        let bytes = build_v1_container(rows, 2, 1, Compression::None, 4096);

        let (header, payload) = decode_container(&bytes).unwrap();
        assert_eq!(header.version, FORMAT_V1);
        assert_eq!(payload, rows);
    }

    #[test]
    fn v1_multi_page_reassembly() {
        let rows: Vec<u8> = br#"{"id":123,"name":"paged row"}"#.repeat(200);
        let bytes = build_v1_container(&rows, 200, 199, Compression::None, 64);

        let (_, payload) = decode_container(&bytes).unwrap();
        assert_eq!(payload, rows);
    }

    #[test]
    fn v1_brotli_multi_page() {
        let rows: Vec<u8> = br#"{"id":1,"tag":"compress me"}"#.repeat(300);
        let bytes = build_v1_container(&rows, 300, 299, Compression::Brotli, 128);

        let (header, payload) = decode_container(&bytes).unwrap();
        assert_eq!(header.compression, Compression::Brotli);
        assert_eq!(payload, rows);
    }

    #[test]
    fn v1_empty_payload() {
        let bytes = build_v1_container(b"", 0, -1, Compression::None, 64);
        let (_, payload) = decode_container(&bytes).unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn v1_page_gap_is_corrupt() {
        let rows: Vec<u8> = b"0123456789".repeat(20);
        let mut bytes = build_v1_container(&rows, 1, 0, Compression::None, 50);

        // Renumber the second page from 2 to 3.
        let second_page_at = HEADER_LEN + 4 + PAGE_HEADER_LEN + 50;
        bytes[second_page_at..second_page_at + 4].copy_from_slice(&3u32.to_le_bytes());

        let result = decode_container(&bytes);
        assert!(matches!(result, Err(CodecError::CorruptContainer { .. })));
    }

    #[test]
    fn v1_broken_next_pointer_is_corrupt() {
        let rows: Vec<u8> = b"0123456789".repeat(20);
        let mut bytes = build_v1_container(&rows, 1, 0, Compression::None, 50);

        // First page's next pointer should be 2.
        let next_at = HEADER_LEN + 4 + 9;
        bytes[next_at..next_at + 4].copy_from_slice(&7u32.to_le_bytes());

        let result = decode_container(&bytes);
        assert!(matches!(result, Err(CodecError::CorruptContainer { .. })));
    }

    #[test]
    fn v1_page_count_mismatch_is_corrupt() {
        let rows: Vec<u8> = b"0123456789".repeat(20);
        let mut bytes = build_v1_container(&rows, 1, 0, Compression::None, 50);

        // Declare one more page than is present.
        let declared = u32::from_le_bytes([
            bytes[HEADER_LEN],
            bytes[HEADER_LEN + 1],
            bytes[HEADER_LEN + 2],
            bytes[HEADER_LEN + 3],
        ]);
        bytes[HEADER_LEN..HEADER_LEN + 4].copy_from_slice(&(declared + 1).to_le_bytes());

        let result = decode_container(&bytes);
        assert!(matches!(result, Err(CodecError::CorruptContainer { .. })));
    }

    proptest! {
        #[test]
        fn v2_roundtrip_arbitrary(
            rows in proptest::collection::vec(any::<u8>(), 0..2048),
            sequence in -1i64..1_000_000,
            brotli in any::<bool>(),
        ) {
            let compression = if brotli { Compression::Brotli } else { Compression::None };
            let bytes = encode_container(&rows, rows.len() as i32, sequence, compression).unwrap();
            let (header, payload) = decode_container(&bytes).unwrap();
            prop_assert_eq!(header.sequence, sequence);
            prop_assert_eq!(payload, rows);
        }
    }
}
