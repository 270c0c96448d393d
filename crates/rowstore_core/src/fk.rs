//! Foreign-key registry and referential-integrity checks.

use crate::error::{CoreError, CoreResult};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A directed reference constraint between two tables.
///
/// Rows of `source_table` carry a `source_property` whose value must
/// match the `target_property` (the identity) of an existing row in
/// `target_table`; referenced target rows may not be removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Table whose rows carry the reference.
    pub source_table: String,
    /// Table being referenced.
    pub target_table: String,
    /// Property on the source rows holding the referenced value.
    pub source_property: String,
    /// Property on the target rows being referenced.
    pub target_property: String,
}

impl ForeignKey {
    /// Creates a relationship.
    pub fn new(
        source_table: impl Into<String>,
        target_table: impl Into<String>,
        source_property: impl Into<String>,
        target_property: impl Into<String>,
    ) -> Self {
        Self {
            source_table: source_table.into(),
            target_table: target_table.into(),
            source_property: source_property.into(),
            target_property: target_property.into(),
        }
    }
}

/// Where a value is still referenced, reported on failed removals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FkUse {
    /// Table owning the live reference.
    pub table: String,
    /// Property on that table holding the reference.
    pub property: String,
}

/// Table handle the manager checks relationships against.
///
/// Implemented by open tables over their cached row sets; registered
/// at open and deregistered at close.
pub trait RegisteredTable: Send + Sync {
    /// Returns the table name.
    fn table_name(&self) -> &str;

    /// Returns true if a live row carries this identity.
    fn contains_id(&self, id: i64) -> CoreResult<bool>;

    /// Returns true if any live row's `property` equals `value`.
    fn property_in_use(&self, property: &str, value: i64) -> CoreResult<bool>;

    /// Returns every live row's value for `property`, skipping nulls.
    fn property_values(&self, property: &str) -> CoreResult<Vec<i64>>;
}

#[derive(Default)]
struct FkRegistry {
    tables: HashMap<String, Arc<dyn RegisteredTable>>,
    relationships: Vec<ForeignKey>,
}

/// Registry of open tables and their foreign-key relationships.
///
/// One manager is shared by every table of a registry. Tables register
/// themselves at open and deregister at close; relationships follow
/// their source table's lifecycle. All access is internally
/// synchronized, and table handles are scanned outside the registry
/// lock so checks never hold it across row scans.
#[derive(Default)]
pub struct ForeignKeyManager {
    inner: Mutex<FkRegistry>,
}

impl ForeignKeyManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an open table handle, keyed by its name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty name or when a table of
    /// the same name is already registered.
    pub fn register_table(&self, table: Arc<dyn RegisteredTable>) -> CoreResult<()> {
        let name = table.table_name().to_string();
        if name.is_empty() {
            return Err(CoreError::invalid_argument("table name must not be empty"));
        }

        let mut registry = self.inner.lock();
        if registry.tables.contains_key(&name) {
            return Err(CoreError::invalid_argument(format!(
                "table {name} is already registered"
            )));
        }

        registry.tables.insert(name, table);
        Ok(())
    }

    /// Deregisters a table and drops the relationships it sourced.
    ///
    /// Deregistering an unknown table is a no-op.
    pub fn unregister_table(&self, name: &str) -> CoreResult<()> {
        if name.is_empty() {
            return Err(CoreError::invalid_argument("table name must not be empty"));
        }

        let mut registry = self.inner.lock();
        registry.tables.remove(name);
        registry.relationships.retain(|r| r.source_table != name);
        Ok(())
    }

    /// Returns true if a table of this name is registered.
    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.inner.lock().tables.contains_key(name)
    }

    /// Adds a relationship.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if any field is empty.
    pub fn add_relationship(&self, relationship: ForeignKey) -> CoreResult<()> {
        if relationship.source_table.is_empty()
            || relationship.target_table.is_empty()
            || relationship.source_property.is_empty()
            || relationship.target_property.is_empty()
        {
            return Err(CoreError::invalid_argument(
                "relationship tables and properties must not be empty",
            ));
        }

        self.inner.lock().relationships.push(relationship);
        Ok(())
    }

    /// Returns the relationships sourced by `table`.
    #[must_use]
    pub fn relationships_from(&self, table: &str) -> Vec<ForeignKey> {
        self.inner
            .lock()
            .relationships
            .iter()
            .filter(|r| r.source_table == table)
            .cloned()
            .collect()
    }

    /// Returns true if `target_table` holds a row with identity `id`.
    ///
    /// Used on the referencing side before an insert or update.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the target table is not registered.
    pub fn value_exists(&self, target_table: &str, id: i64) -> CoreResult<bool> {
        if target_table.is_empty() {
            return Err(CoreError::invalid_argument("table name must not be empty"));
        }

        let handle = {
            let registry = self.inner.lock();
            registry.tables.get(target_table).cloned()
        };

        let handle = handle.ok_or_else(|| {
            CoreError::invalid_state(format!("table {target_table} is not registered"))
        })?;

        handle.contains_id(id)
    }

    /// Reports whether any registered table still references `value`
    /// through a relationship targeting `(target_table, target_property)`.
    ///
    /// Used on the referenced side before a delete or truncate.
    pub fn value_in_use(
        &self,
        target_table: &str,
        target_property: &str,
        value: i64,
    ) -> CoreResult<Option<FkUse>> {
        self.value_in_use_filtered(target_table, target_property, value, None)
    }

    /// Set form of [`value_in_use`] covering many values at once.
    ///
    /// [`value_in_use`]: ForeignKeyManager::value_in_use
    pub fn any_value_in_use(
        &self,
        target_table: &str,
        target_property: &str,
        values: &HashSet<i64>,
    ) -> CoreResult<Option<FkUse>> {
        self.any_value_in_use_filtered(target_table, target_property, values, None)
    }

    /// Like `value_in_use`, skipping relationships sourced by
    /// `skip_source` (a table excludes itself while mutating; its own
    /// survivors are checked in-table).
    pub(crate) fn value_in_use_filtered(
        &self,
        target_table: &str,
        target_property: &str,
        value: i64,
        skip_source: Option<&str>,
    ) -> CoreResult<Option<FkUse>> {
        for (source, property, handle) in
            self.inbound_sources(target_table, target_property, skip_source)?
        {
            if handle.property_in_use(&property, value)? {
                return Ok(Some(FkUse {
                    table: source,
                    property,
                }));
            }
        }
        Ok(None)
    }

    /// Like `any_value_in_use`, with the same source filter.
    pub(crate) fn any_value_in_use_filtered(
        &self,
        target_table: &str,
        target_property: &str,
        values: &HashSet<i64>,
        skip_source: Option<&str>,
    ) -> CoreResult<Option<FkUse>> {
        for (source, property, handle) in
            self.inbound_sources(target_table, target_property, skip_source)?
        {
            for value in handle.property_values(&property)? {
                if values.contains(&value) {
                    return Ok(Some(FkUse {
                        table: source,
                        property,
                    }));
                }
            }
        }
        Ok(None)
    }

    /// Collects `(source table, source property, handle)` triples for
    /// relationships targeting `(target_table, target_property)`.
    /// Handles are cloned out so scans run without the registry lock.
    #[allow(clippy::type_complexity)]
    fn inbound_sources(
        &self,
        target_table: &str,
        target_property: &str,
        skip_source: Option<&str>,
    ) -> CoreResult<Vec<(String, String, Arc<dyn RegisteredTable>)>> {
        if target_table.is_empty() || target_property.is_empty() {
            return Err(CoreError::invalid_argument(
                "table and property names must not be empty",
            ));
        }

        let registry = self.inner.lock();
        let mut sources = Vec::new();

        for relationship in &registry.relationships {
            if relationship.target_table != target_table
                || relationship.target_property != target_property
            {
                continue;
            }
            if skip_source == Some(relationship.source_table.as_str()) {
                continue;
            }
            if let Some(handle) = registry.tables.get(&relationship.source_table) {
                sources.push((
                    relationship.source_table.clone(),
                    relationship.source_property.clone(),
                    Arc::clone(handle),
                ));
            }
        }

        Ok(sources)
    }
}
