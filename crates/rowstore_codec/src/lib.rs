//! # rowstore codec
//!
//! Versioned container framing and row serialization for rowstore.
//!
//! This crate owns everything about the byte layout of a table's
//! container: the fixed header, the v1 (legacy, page-oriented) and v2
//! (flat) framing versions, whole-payload Brotli compression, and the
//! pluggable [`RowCodec`] boundary that turns typed row lists into the
//! bytes the container carries.
//!
//! ## Example
//!
//! ```rust
//! use rowstore_codec::{decode_container, encode_container, Compression};
//!
//! let rows = br#"[{"id":0},{"id":1}]"#;
//! let bytes = encode_container(rows, 2, 1, Compression::Brotli).unwrap();
//! let (header, payload) = decode_container(&bytes).unwrap();
//! assert_eq!(header.record_count, 2);
//! assert_eq!(payload, rows);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod compression;
mod container;
mod error;
mod rows;

pub use compression::Compression;
pub use container::{
    decode_container, encode_container, ContainerHeader, CONTAINER_MAGIC, CURRENT_FORMAT_VERSION,
    FORMAT_V1, FORMAT_V2, HEADER_LEN, SEQUENCE_OFFSET,
};
pub use error::{CodecError, CodecResult};
pub use rows::{JsonRowCodec, RowCodec};
