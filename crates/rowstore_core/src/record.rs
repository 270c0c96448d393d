//! Record identity and the row capability trait.

use crate::error::{CoreError, CoreResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Sentinel identity requesting "assign the next sequence value" on insert.
pub const NEW_RECORD_ID: i64 = -1;

/// A record's numeric identity, tagged by its lifecycle state.
///
/// An identity starts out `Pending`: either the sentinel (`-1`, asking
/// the store to assign the next sequence value on insert) or a
/// caller-chosen value. Once the store has materialized the record —
/// by assigning a sequence value, accepting the chosen id, or loading
/// the row from disk — the identity is `Assigned` and any further
/// mutation fails with `InvalidState`.
///
/// On the wire an identity is a bare `i64`; the state tag is not
/// persisted. Deserializing the sentinel yields `Pending`, everything
/// else `Assigned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordId {
    /// Identity not yet accepted by the store; still mutable.
    Pending(i64),
    /// Identity materialized from storage; immutable.
    Assigned(i64),
}

impl RecordId {
    /// Creates the sentinel identity for a new record.
    #[must_use]
    pub const fn new() -> Self {
        Self::Pending(NEW_RECORD_ID)
    }

    /// Creates a pending identity with a caller-chosen value.
    ///
    /// Callers are responsible for uniqueness outside the sentinel path.
    #[must_use]
    pub const fn pending(value: i64) -> Self {
        Self::Pending(value)
    }

    /// Returns the numeric identity value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        match self {
            Self::Pending(v) | Self::Assigned(v) => *v,
        }
    }

    /// Returns true if the identity has not been accepted by the store.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Returns true if this is the new-record sentinel.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        matches!(self, Self::Pending(NEW_RECORD_ID))
    }

    /// Sets the identity value.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the identity is already `Assigned`.
    pub fn set(&mut self, value: i64) -> CoreResult<()> {
        match self {
            Self::Pending(_) => {
                *self = Self::Pending(value);
                Ok(())
            }
            Self::Assigned(current) => Err(CoreError::invalid_state(format!(
                "record identity {current} is immutable once assigned"
            ))),
        }
    }

    /// Transitions a pending identity to `Assigned` with the given value.
    pub(crate) fn assign(&mut self, value: i64) {
        *self = Self::Assigned(value);
    }

    /// Freezes the current value as `Assigned`.
    pub(crate) fn mark_assigned(&mut self) {
        *self = Self::Assigned(self.value());
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.value())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = i64::deserialize(deserializer)?;
        if value == NEW_RECORD_ID {
            Ok(Self::Pending(value))
        } else {
            Ok(Self::Assigned(value))
        }
    }
}

/// Capability trait for types stored as table rows.
///
/// Implementors expose their identity field and, through the supertrait
/// bounds, the serde surface the default JSON codec and the foreign-key
/// property scans rely on.
///
/// # Example
///
/// ```rust
/// use rowstore_core::{Record, RecordId};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct User {
///     id: RecordId,
///     name: String,
/// }
///
/// impl Record for User {
///     fn record_id(&self) -> RecordId {
///         self.id
///     }
///
///     fn record_id_mut(&mut self) -> &mut RecordId {
///         &mut self.id
///     }
/// }
/// ```
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Returns the record's identity.
    fn record_id(&self) -> RecordId;

    /// Returns a mutable reference to the record's identity.
    fn record_id_mut(&mut self) -> &mut RecordId;

    /// Name of the identity property in the serialized row.
    ///
    /// Inbound foreign-key relationships target this property.
    fn id_field() -> &'static str {
        "id"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_sentinel() {
        let id = RecordId::new();
        assert_eq!(id.value(), NEW_RECORD_ID);
        assert!(id.is_pending());
        assert!(id.is_new());
    }

    #[test]
    fn pending_accepts_mutation() {
        let mut id = RecordId::new();
        id.set(42).unwrap();
        assert_eq!(id, RecordId::Pending(42));
        assert!(!id.is_new());
    }

    #[test]
    fn assigned_rejects_mutation() {
        let mut id = RecordId::new();
        id.assign(7);
        assert_eq!(id.value(), 7);

        let result = id.set(99);
        assert!(matches!(result, Err(CoreError::InvalidState { .. })));
        assert_eq!(id.value(), 7);
    }

    #[test]
    fn serializes_as_bare_integer() {
        let json = serde_json::to_string(&RecordId::Assigned(12)).unwrap();
        assert_eq!(json, "12");

        let json = serde_json::to_string(&RecordId::new()).unwrap();
        assert_eq!(json, "-1");
    }

    #[test]
    fn deserialized_ids_are_assigned() {
        let id: RecordId = serde_json::from_str("5").unwrap();
        assert_eq!(id, RecordId::Assigned(5));

        let sentinel: RecordId = serde_json::from_str("-1").unwrap();
        assert!(sentinel.is_new());
    }

    #[test]
    fn mark_assigned_freezes_value() {
        let mut id = RecordId::pending(3);
        id.mark_assigned();
        assert_eq!(id, RecordId::Assigned(3));
        assert!(id.set(4).is_err());
    }
}
