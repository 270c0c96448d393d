//! Registry of tables under one root directory.

use crate::descriptor::TableDescriptor;
use crate::error::{CoreError, CoreResult};
use crate::fk::{ForeignKey, ForeignKeyManager};
use crate::record::Record;
use crate::table::Table;
use parking_lot::Mutex;
use rowstore_codec::{JsonRowCodec, RowCodec};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// State shared between the registry and the tables it opened.
pub(crate) struct RegistryShared {
    root: PathBuf,
    fk: Arc<ForeignKeyManager>,
    open_tables: Mutex<BTreeSet<String>>,
}

impl RegistryShared {
    /// Releases a table name; called when a table closes.
    pub(crate) fn release(&self, name: &str) {
        self.open_tables.lock().remove(name);
    }
}

/// Entry point of the store: opens typed tables over container files
/// in a root directory.
///
/// Each table is backed by `<root>/<name>.dat` and held exclusively
/// while open; the registry tracks open names and shares one
/// [`ForeignKeyManager`] across all of them, so relationships declared
/// at open time are enforced store-wide.
pub struct TableRegistry {
    shared: Arc<RegistryShared>,
}

impl TableRegistry {
    /// Opens a registry over an existing directory.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `root` is not an existing
    /// directory; the registry never creates it.
    pub fn open(root: impl AsRef<Path>) -> CoreResult<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(CoreError::invalid_argument(format!(
                "root path {} is not an existing directory",
                root.display()
            )));
        }

        info!(root = %root.display(), "opened table registry");

        Ok(Self {
            shared: Arc::new(RegistryShared {
                root: root.to_path_buf(),
                fk: Arc::new(ForeignKeyManager::new()),
                open_tables: Mutex::new(BTreeSet::new()),
            }),
        })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.shared.root
    }

    /// Returns the shared foreign-key manager.
    #[must_use]
    pub fn foreign_keys(&self) -> Arc<ForeignKeyManager> {
        Arc::clone(&self.shared.fk)
    }

    /// Returns the names of currently open tables, sorted.
    #[must_use]
    pub fn tables(&self) -> Vec<String> {
        self.shared.open_tables.lock().iter().cloned().collect()
    }

    /// Returns true if a table of this name is currently open.
    #[must_use]
    pub fn is_open(&self, name: &str) -> bool {
        self.shared.open_tables.lock().contains(name)
    }

    /// Returns the container file path for a table name.
    #[must_use]
    pub fn table_path(&self, name: &str) -> PathBuf {
        self.shared.root.join(format!("{name}.dat"))
    }

    /// Opens a table with the default JSON row codec.
    ///
    /// `relationships` declares the table's outgoing foreign keys;
    /// their source must be this table. The target tables must be open
    /// (registered) by the time rows are inserted.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the table is already open in this
    ///   registry, or a relationship is malformed
    /// - `TableLocked` if another process holds the container file
    pub fn open_table<T: Record>(
        &self,
        descriptor: TableDescriptor,
        relationships: Vec<ForeignKey>,
    ) -> CoreResult<Table<T>> {
        self.open_table_with_codec(descriptor, relationships, Box::new(JsonRowCodec))
    }

    /// Opens a table with an explicit row codec.
    pub fn open_table_with_codec<T: Record>(
        &self,
        descriptor: TableDescriptor,
        relationships: Vec<ForeignKey>,
        codec: Box<dyn RowCodec<T>>,
    ) -> CoreResult<Table<T>> {
        let name = descriptor.name().to_string();

        let mut open = self.shared.open_tables.lock();
        if open.contains(&name) {
            return Err(CoreError::invalid_argument(format!(
                "table {name} is already open"
            )));
        }

        let path = self.table_path(&name);
        let table = Table::open(
            &path,
            descriptor,
            relationships,
            codec,
            Arc::clone(&self.shared.fk),
            Arc::clone(&self.shared),
        )?;

        open.insert(name.clone());
        debug!(table = name.as_str(), "registered table");

        Ok(table)
    }
}
