//! Embedded, file-backed record store.
//!
//! Each table lives in its own container file under a root directory:
//! a small binary header (framing version, compression mode, persisted
//! sequence counter, record count) followed by the encoded row set.
//! Tables are opened through a [`TableRegistry`], held under an
//! exclusive file lock while open, and expose typed CRUD over rows
//! implementing [`Record`].
//!
//! Cross-table referential integrity is enforced by a shared
//! [`ForeignKeyManager`]: relationships declared when a table is
//! opened are validated on insert and update (the referenced row must
//! exist) and on delete and truncate (the removed row must not be
//! referenced).
//!
//! ```rust,ignore
//! let registry = TableRegistry::open("/var/lib/app/data")?;
//! let users: Table<User> = registry.open_table(
//!     TableDescriptor::new("users", Compression::Brotli)?,
//!     vec![],
//! )?;
//!
//! let mut alice = User { id: RecordId::new(), name: "Alice".into() };
//! users.insert(&mut alice)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod channel;
mod descriptor;
mod error;
mod fk;
mod record;
mod registry;
mod table;

pub use channel::TableChannel;
pub use descriptor::{validate_table_name, TableDescriptor, RESERVED_NAME_CHARS};
pub use error::{CoreError, CoreResult};
pub use fk::{FkUse, ForeignKey, ForeignKeyManager, RegisteredTable};
pub use record::{Record, RecordId, NEW_RECORD_ID};
pub use registry::TableRegistry;
pub use table::Table;

pub use rowstore_codec::{Compression, JsonRowCodec, RowCodec};
