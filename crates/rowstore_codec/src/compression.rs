//! Whole-payload compression modes.

use crate::error::{CodecError, CodecResult};
use brotli::enc::BrotliEncoderParams;

/// Compression applied to a container's row payload.
///
/// Compression is all-or-nothing: either the entire payload region is
/// Brotli-compressed or none of it is. The mode is recorded as a single
/// byte in the container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Compression {
    /// Payload is stored as-is.
    #[default]
    None = 0,
    /// Payload is Brotli-compressed.
    Brotli = 1,
}

impl Compression {
    /// Converts the mode to its wire byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Converts a wire byte to a compression mode.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::None),
            1 => Some(Self::Brotli),
            _ => None,
        }
    }

    /// Compresses a payload according to this mode.
    pub fn compress(self, payload: &[u8]) -> CodecResult<Vec<u8>> {
        match self {
            Self::None => Ok(payload.to_vec()),
            Self::Brotli => {
                let mut out = Vec::new();
                let params = BrotliEncoderParams::default();
                brotli::BrotliCompress(&mut &payload[..], &mut out, &params)
                    .map_err(|e| CodecError::compression(e.to_string()))?;
                Ok(out)
            }
        }
    }

    /// Decompresses a stored payload and verifies its declared length.
    ///
    /// # Errors
    ///
    /// Returns `CorruptContainer` if the inflated payload does not match
    /// `declared_len` exactly, or if the compressed stream is invalid.
    pub fn decompress(self, stored: &[u8], declared_len: usize) -> CodecResult<Vec<u8>> {
        let payload = match self {
            Self::None => stored.to_vec(),
            Self::Brotli => {
                let mut out = Vec::with_capacity(declared_len);
                brotli::BrotliDecompress(&mut &stored[..], &mut out)
                    .map_err(|e| CodecError::corrupt_container(format!("brotli stream: {e}")))?;
                out
            }
        };

        if payload.len() != declared_len {
            return Err(CodecError::corrupt_container(format!(
                "uncompressed size mismatch: declared {declared_len}, got {}",
                payload.len()
            )));
        }

        Ok(payload)
    }
}
