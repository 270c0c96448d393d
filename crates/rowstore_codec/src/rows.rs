//! Pluggable row-list serialization boundary.

use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Translates a list of rows to and from bytes.
///
/// The container codec is agnostic to row shape; callers supply a
/// `RowCodec` for their row type and the store threads the encoded
/// bytes through the framing layer unchanged. [`JsonRowCodec`] is the
/// default implementation.
pub trait RowCodec<T>: Send + Sync {
    /// Encodes a row list to bytes.
    fn encode_rows(&self, rows: &[T]) -> CodecResult<Vec<u8>>;

    /// Decodes a row list from bytes.
    ///
    /// An empty input decodes to an empty list.
    fn decode_rows(&self, bytes: &[u8]) -> CodecResult<Vec<T>>;
}

/// JSON row codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRowCodec;

impl<T> RowCodec<T> for JsonRowCodec
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn encode_rows(&self, rows: &[T]) -> CodecResult<Vec<u8>> {
        serde_json::to_vec(rows).map_err(|e| CodecError::serialization(e.to_string()))
    }

    fn decode_rows(&self, bytes: &[u8]) -> CodecResult<Vec<T>> {
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_slice(bytes).map_err(|e| CodecError::serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestRow {
        id: i64,
        name: String,
    }

    #[test]
    fn roundtrip() {
        let rows = vec![
            TestRow {
                id: 0,
                name: "alice".into(),
            },
            TestRow {
                id: 1,
                name: "bob".into(),
            },
        ];

        let bytes = JsonRowCodec.encode_rows(&rows).unwrap();
        let back: Vec<TestRow> = JsonRowCodec.decode_rows(&bytes).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn empty_list() {
        let rows: Vec<TestRow> = Vec::new();
        let bytes = JsonRowCodec.encode_rows(&rows).unwrap();
        assert_eq!(bytes, b"[]");

        let back: Vec<TestRow> = JsonRowCodec.decode_rows(&bytes).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn empty_bytes_decode_to_empty_list() {
        let back: Vec<TestRow> = JsonRowCodec.decode_rows(b"").unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn malformed_json_fails() {
        let result: CodecResult<Vec<TestRow>> = JsonRowCodec.decode_rows(b"[{\"id\":");
        assert!(matches!(result, Err(CodecError::Serialization { .. })));
    }
}
