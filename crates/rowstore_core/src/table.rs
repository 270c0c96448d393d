//! Generic CRUD operations over a table's row set.

use crate::channel::TableChannel;
use crate::descriptor::TableDescriptor;
use crate::error::{CoreError, CoreResult};
use crate::fk::{ForeignKey, ForeignKeyManager, RegisteredTable};
use crate::record::Record;
use crate::registry::RegistryShared;
use parking_lot::{Mutex, RwLock};
use rowstore_codec::RowCodec;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// A typed table of records.
///
/// `Table<T>` caches the live row set in memory and treats the
/// container file as the unit of persistence: every mutation replaces
/// rows in the cached set and re-saves the whole container through the
/// channel. Foreign-key constraints are validated before any byte is
/// written, so a failed batch leaves the file untouched.
///
/// Obtained from [`TableRegistry::open_table`]; closing (or dropping)
/// the table releases the exclusive file lock and deregisters it from
/// the foreign-key manager.
///
/// # Example
///
/// ```rust,ignore
/// let users: Table<User> = registry.open_table(descriptor, vec![])?;
///
/// let mut alice = User { id: RecordId::new(), name: "Alice".into() };
/// users.insert(&mut alice)?;
/// assert_eq!(alice.id.value(), 0);
///
/// let found = users.select(0)?;
/// ```
///
/// [`TableRegistry::open_table`]: crate::TableRegistry::open_table
pub struct Table<T: Record> {
    inner: Arc<TableInner<T>>,
    fk: Arc<ForeignKeyManager>,
    registry: Arc<RegistryShared>,
}

/// Shared table state; also the handle registered with the FK manager.
pub(crate) struct TableInner<T: Record> {
    name: String,
    codec: Box<dyn RowCodec<T>>,
    /// Serializes public mutations end to end.
    op: Mutex<()>,
    /// Row set and channel; `None` once the table is closed.
    state: RwLock<Option<TableState<T>>>,
}

struct TableState<T> {
    channel: TableChannel,
    rows: Vec<T>,
}

impl<T: Record> TableInner<T> {
    fn with_state<R>(&self, f: impl FnOnce(&TableState<T>) -> CoreResult<R>) -> CoreResult<R> {
        let guard = self.state.read();
        let state = guard
            .as_ref()
            .ok_or_else(|| CoreError::disposed(format!("table {}", self.name)))?;
        f(state)
    }

    fn persist(&self, state: &mut TableState<T>) -> CoreResult<()> {
        let payload = self.codec.encode_rows(&state.rows)?;
        state.channel.save(&payload, state.rows.len() as i32)
    }
}

impl<T: Record> RegisteredTable for TableInner<T> {
    fn table_name(&self) -> &str {
        &self.name
    }

    fn contains_id(&self, id: i64) -> CoreResult<bool> {
        self.with_state(|state| Ok(state.rows.iter().any(|r| r.record_id().value() == id)))
    }

    fn property_in_use(&self, property: &str, value: i64) -> CoreResult<bool> {
        self.with_state(|state| {
            for row in &state.rows {
                if row_property(row, &self.name, property)? == Some(value) {
                    return Ok(true);
                }
            }
            Ok(false)
        })
    }

    fn property_values(&self, property: &str) -> CoreResult<Vec<i64>> {
        self.with_state(|state| {
            let mut values = Vec::new();
            for row in &state.rows {
                if let Some(value) = row_property(row, &self.name, property)? {
                    values.push(value);
                }
            }
            Ok(values)
        })
    }
}

impl<T: Record> Table<T> {
    /// Opens a table over its container file and registers it with the
    /// foreign-key manager. Called through the registry.
    pub(crate) fn open(
        path: &Path,
        descriptor: TableDescriptor,
        relationships: Vec<ForeignKey>,
        codec: Box<dyn RowCodec<T>>,
        fk: Arc<ForeignKeyManager>,
        registry: Arc<RegistryShared>,
    ) -> CoreResult<Self> {
        let name = descriptor.name().to_string();

        for relationship in &relationships {
            if relationship.source_table != name {
                return Err(CoreError::invalid_argument(format!(
                    "relationship source {} does not match table {name}",
                    relationship.source_table
                )));
            }
        }

        let channel = TableChannel::open(path, descriptor)?;
        let payload = channel.read()?;
        let rows = codec.decode_rows(&payload)?;

        let inner = Arc::new(TableInner {
            name: name.clone(),
            codec,
            op: Mutex::new(()),
            state: RwLock::new(Some(TableState { channel, rows })),
        });

        fk.register_table(Arc::clone(&inner) as Arc<dyn RegisteredTable>)?;
        for relationship in relationships {
            if let Err(err) = fk.add_relationship(relationship) {
                fk.unregister_table(&name)?;
                return Err(err);
            }
        }

        debug!(table = name.as_str(), "opened table");

        Ok(Self {
            inner,
            fk,
            registry,
        })
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Inserts one row. See [`insert_all`](Table::insert_all).
    pub fn insert(&self, row: &mut T) -> CoreResult<()> {
        self.insert_all(std::slice::from_mut(row))
    }

    /// Inserts a batch of rows.
    ///
    /// Rows with the new-record sentinel receive consecutive sequence
    /// values; other pending identities are kept as caller-chosen ids
    /// (uniqueness is the caller's responsibility). All identities end
    /// up `Assigned`, written back into the given rows.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` on an empty batch
    /// - `ForeignKeyViolation` if any row references a missing target;
    ///   raised before anything is written, the whole batch fails
    pub fn insert_all(&self, rows: &mut [T]) -> CoreResult<()> {
        require_rows(rows)?;
        let _op = self.inner.op.lock();
        self.ensure_open()?;
        self.validate_references(rows)?;

        let mut guard = self.inner.state.write();
        let state = guard
            .as_mut()
            .ok_or_else(|| CoreError::disposed(format!("table {}", self.inner.name)))?;

        let sentinel_count = rows.iter().filter(|r| r.record_id().is_new()).count();
        let mut next = if sentinel_count > 0 {
            state.channel.take_sequences(sentinel_count)?
        } else {
            0
        };

        for row in rows.iter_mut() {
            if row.record_id().is_new() {
                row.record_id_mut().assign(next);
                next += 1;
            } else if row.record_id().is_pending() {
                row.record_id_mut().mark_assigned();
            }
            state.rows.push(row.clone());
        }

        self.inner.persist(state)
    }

    /// Updates one row. See [`update_all`](Table::update_all).
    pub fn update(&self, row: &T) -> CoreResult<()> {
        self.update_all(std::slice::from_ref(row))
    }

    /// Updates a batch of rows, located by identity.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` on an empty batch or a pending identity
    /// - `NotFound` if any identity has no stored row; nothing is
    ///   persisted
    /// - `ForeignKeyViolation` as for insert
    pub fn update_all(&self, rows: &[T]) -> CoreResult<()> {
        require_rows(rows)?;
        let _op = self.inner.op.lock();
        self.ensure_open()?;

        for row in rows {
            if row.record_id().is_pending() {
                return Err(CoreError::invalid_argument(
                    "cannot update a row without an assigned identity",
                ));
            }
        }

        self.validate_references(rows)?;

        let mut guard = self.inner.state.write();
        let state = guard
            .as_mut()
            .ok_or_else(|| CoreError::disposed(format!("table {}", self.inner.name)))?;

        // Resolve every identity before touching the set.
        let mut positions = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.record_id().value();
            match state.rows.iter().position(|r| r.record_id().value() == id) {
                Some(position) => positions.push(position),
                None => return Err(CoreError::not_found(&self.inner.name, id)),
            }
        }

        for (position, row) in positions.into_iter().zip(rows) {
            state.rows[position] = row.clone();
        }

        self.inner.persist(state)
    }

    /// Inserts or updates one row. See
    /// [`insert_or_update_all`](Table::insert_or_update_all).
    pub fn insert_or_update(&self, row: &mut T) -> CoreResult<()> {
        self.insert_or_update_all(std::slice::from_mut(row))
    }

    /// Inserts rows carrying the sentinel, updates the rest.
    ///
    /// A non-sentinel identity with no stored row is inserted keeping
    /// its id.
    pub fn insert_or_update_all(&self, rows: &mut [T]) -> CoreResult<()> {
        require_rows(rows)?;
        let _op = self.inner.op.lock();
        self.ensure_open()?;
        self.validate_references(rows)?;

        let mut guard = self.inner.state.write();
        let state = guard
            .as_mut()
            .ok_or_else(|| CoreError::disposed(format!("table {}", self.inner.name)))?;

        let sentinel_count = rows.iter().filter(|r| r.record_id().is_new()).count();
        let mut next = if sentinel_count > 0 {
            state.channel.take_sequences(sentinel_count)?
        } else {
            0
        };

        for row in rows.iter_mut() {
            if row.record_id().is_new() {
                row.record_id_mut().assign(next);
                next += 1;
                state.rows.push(row.clone());
                continue;
            }

            if row.record_id().is_pending() {
                row.record_id_mut().mark_assigned();
            }

            let id = row.record_id().value();
            match state.rows.iter().position(|r| r.record_id().value() == id) {
                Some(position) => state.rows[position] = row.clone(),
                None => state.rows.push(row.clone()),
            }
        }

        self.inner.persist(state)
    }

    /// Deletes one row. See [`delete_all`](Table::delete_all).
    pub fn delete(&self, row: &T) -> CoreResult<()> {
        self.delete_all(std::slice::from_ref(row))
    }

    /// Deletes a batch of rows, located by identity.
    ///
    /// Identities without a stored row are ignored.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` on an empty batch or a pending identity
    /// - `ForeignKeyViolation` if any removed identity is still
    ///   referenced by a live row elsewhere (or by a surviving row of
    ///   this table); no rows are removed
    pub fn delete_all(&self, rows: &[T]) -> CoreResult<()> {
        require_rows(rows)?;

        let mut ids = HashSet::new();
        for row in rows {
            if row.record_id().is_pending() {
                return Err(CoreError::invalid_argument(
                    "cannot delete a row without an assigned identity",
                ));
            }
            ids.insert(row.record_id().value());
        }

        let _op = self.inner.op.lock();
        self.ensure_open()?;
        self.remove_ids(&ids)
    }

    /// Deletes every row in the table.
    ///
    /// # Errors
    ///
    /// `ForeignKeyViolation` if any other registered table still
    /// references a row of this table; no rows are removed.
    pub fn truncate(&self) -> CoreResult<()> {
        let _op = self.inner.op.lock();
        self.ensure_open()?;

        let ids: HashSet<i64> = self
            .inner
            .with_state(|state| Ok(state.rows.iter().map(|r| r.record_id().value()).collect()))?;

        if ids.is_empty() {
            return Ok(());
        }

        if let Some(usage) = self.fk.any_value_in_use_filtered(
            &self.inner.name,
            T::id_field(),
            &ids,
            Some(&self.inner.name),
        )? {
            return Err(CoreError::foreign_key_violation(format!(
                "cannot truncate {}: {}.{} still references it",
                self.inner.name, usage.table, usage.property
            )));
        }

        let mut guard = self.inner.state.write();
        let state = guard
            .as_mut()
            .ok_or_else(|| CoreError::disposed(format!("table {}", self.inner.name)))?;
        state.rows.clear();
        self.inner.persist(state)
    }

    /// Returns all rows.
    pub fn select_all(&self) -> CoreResult<Vec<T>> {
        self.inner.with_state(|state| Ok(state.rows.clone()))
    }

    /// Returns the row with the given identity, if present.
    pub fn select(&self, id: i64) -> CoreResult<Option<T>> {
        self.inner.with_state(|state| {
            Ok(state
                .rows
                .iter()
                .find(|r| r.record_id().value() == id)
                .cloned())
        })
    }

    /// Increments and returns the table's sequence counter.
    pub fn next_sequence(&self) -> CoreResult<i64> {
        self.inner.with_state(|state| state.channel.next_sequence())
    }

    /// Forces the sequence counter to `value`.
    pub fn reset_sequence(&self, value: i64) -> CoreResult<()> {
        self.inner
            .with_state(|state| state.channel.reset_sequence(value))
    }

    /// Returns the persisted sequence counter.
    pub fn sequence(&self) -> CoreResult<i64> {
        self.inner.with_state(|state| state.channel.sequence())
    }

    /// Returns the number of live records.
    pub fn record_count(&self) -> CoreResult<i32> {
        self.inner.with_state(|state| state.channel.record_count())
    }

    /// Returns the byte length of the container's payload region.
    pub fn data_length(&self) -> CoreResult<u64> {
        self.inner.with_state(|state| state.channel.data_length())
    }

    /// Returns the compaction estimate (0–100); see
    /// [`TableChannel::compact_percent`].
    pub fn compact_percent(&self) -> CoreResult<u8> {
        self.inner
            .with_state(|state| state.channel.compact_percent())
    }

    /// Closes the table: releases the file lock and deregisters it
    /// from the foreign-key manager and registry. Idempotent.
    pub fn close(&self) -> CoreResult<()> {
        let _op = self.inner.op.lock();
        let mut guard = self.inner.state.write();
        if let Some(state) = guard.take() {
            state.channel.close();
            self.fk.unregister_table(&self.inner.name)?;
            self.registry.release(&self.inner.name);
            debug!(table = self.inner.name.as_str(), "closed table");
        }
        Ok(())
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.inner.state.read().is_some() {
            Ok(())
        } else {
            Err(CoreError::disposed(format!("table {}", self.inner.name)))
        }
    }

    /// Validates every outgoing relationship of the given rows.
    ///
    /// Runs before anything is written; a violation fails the batch
    /// with the container file untouched.
    fn validate_references(&self, rows: &[T]) -> CoreResult<()> {
        let relationships = self.fk.relationships_from(&self.inner.name);
        if relationships.is_empty() {
            return Ok(());
        }

        for relationship in &relationships {
            for row in rows {
                let Some(value) =
                    row_property(row, &self.inner.name, &relationship.source_property)?
                else {
                    continue;
                };

                let exists = if relationship.target_table == self.inner.name {
                    // Self-referential: resolve against stored rows or
                    // batch rows carrying a known identity.
                    self.inner.contains_id(value)?
                        || rows
                            .iter()
                            .any(|r| !r.record_id().is_new() && r.record_id().value() == value)
                } else {
                    self.fk.value_exists(&relationship.target_table, value)?
                };

                if !exists {
                    return Err(CoreError::foreign_key_violation(format!(
                        "{}.{} = {value} has no matching row in {}.{}",
                        self.inner.name,
                        relationship.source_property,
                        relationship.target_table,
                        relationship.target_property
                    )));
                }
            }
        }

        Ok(())
    }

    /// Removes the given identities after inbound reference checks.
    fn remove_ids(&self, ids: &HashSet<i64>) -> CoreResult<()> {
        let id_field = T::id_field();

        if let Some(usage) =
            self.fk
                .any_value_in_use_filtered(&self.inner.name, id_field, ids, Some(&self.inner.name))?
        {
            return Err(CoreError::foreign_key_violation(format!(
                "{}.{} still references a row being removed from {}",
                usage.table, usage.property, self.inner.name
            )));
        }

        // Surviving rows of this table must not reference removed ids.
        let self_relationships: Vec<ForeignKey> = self
            .fk
            .relationships_from(&self.inner.name)
            .into_iter()
            .filter(|r| r.target_table == self.inner.name && r.target_property == id_field)
            .collect();

        if !self_relationships.is_empty() {
            self.inner.with_state(|state| {
                for relationship in &self_relationships {
                    for row in &state.rows {
                        if ids.contains(&row.record_id().value()) {
                            continue;
                        }
                        if let Some(value) =
                            row_property(row, &self.inner.name, &relationship.source_property)?
                        {
                            if ids.contains(&value) {
                                return Err(CoreError::foreign_key_violation(format!(
                                    "{}.{} still references a row being removed from {}",
                                    self.inner.name,
                                    relationship.source_property,
                                    self.inner.name
                                )));
                            }
                        }
                    }
                }
                Ok(())
            })?;
        }

        let mut guard = self.inner.state.write();
        let state = guard
            .as_mut()
            .ok_or_else(|| CoreError::disposed(format!("table {}", self.inner.name)))?;
        state.rows.retain(|r| !ids.contains(&r.record_id().value()));
        self.inner.persist(state)
    }
}

impl<T: Record> Drop for Table<T> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Reads a named integer property from a serialized row.
///
/// `None` means the property is present but null (no reference).
fn row_property<T: Record>(row: &T, table: &str, property: &str) -> CoreResult<Option<i64>> {
    let value = serde_json::to_value(row)
        .map_err(|e| CoreError::Codec(rowstore_codec::CodecError::serialization(e.to_string())))?;

    match value.get(property) {
        None => Err(CoreError::invalid_argument(format!(
            "rows of table {table} have no property '{property}'"
        ))),
        Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v.as_i64().map(Some).ok_or_else(|| {
            CoreError::invalid_argument(format!(
                "property '{property}' of table {table} is not an integer"
            ))
        }),
    }
}

fn require_rows<R>(rows: &[R]) -> CoreResult<()> {
    if rows.is_empty() {
        return Err(CoreError::invalid_argument(
            "row collection must not be empty",
        ));
    }
    Ok(())
}
