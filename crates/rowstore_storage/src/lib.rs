//! # rowstore storage
//!
//! Exclusive container-file handles for rowstore.
//!
//! This is the lowest layer of the store: an opaque, advisory-locked
//! byte file per table. It knows nothing about container framing,
//! sequences, or rows — the codec and core crates own all format
//! interpretation.
//!
//! ## Design Principles
//!
//! - One exclusive handle per container file, lock held for the
//!   handle's whole lifetime (acquire on open, release on drop)
//! - Overwrites never truncate; dead tail bytes are the upper layers'
//!   concern
//! - Must be `Send + Sync` for concurrent access

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;

pub use error::{StorageError, StorageResult};
pub use file::TableFile;
