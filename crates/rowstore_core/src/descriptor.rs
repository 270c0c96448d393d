//! Table descriptors and name validation.

use crate::error::{CoreError, CoreResult};
use rowstore_codec::{Compression, FORMAT_V1};

/// Characters that may not appear in a table name.
///
/// Table names become file names, so the set covers the usual
/// path-hostile characters plus the historically reserved `<`, `>`
/// and `!`.
pub const RESERVED_NAME_CHARS: &[char] = &['<', '>', '!', '"', '/', '\\', '|', '?', '*', ':'];

/// Immutable description of a table, supplied at open time.
///
/// Replaces declarative per-type annotations with an explicit
/// configuration value: the table name (validated against the reserved
/// character set), the compression mode for new writes, and the
/// minimum container framing version the table accepts on read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    name: String,
    compression: Compression,
    min_version: u32,
}

impl TableDescriptor {
    /// Creates a descriptor, validating the table name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the name is empty or contains a
    /// control character or one of [`RESERVED_NAME_CHARS`]; the message
    /// identifies the offending character.
    pub fn new(name: impl Into<String>, compression: Compression) -> CoreResult<Self> {
        let name = name.into();
        validate_table_name(&name)?;
        Ok(Self {
            name,
            compression,
            min_version: u32::from(FORMAT_V1),
        })
    }

    /// Sets the minimum container framing version accepted on read.
    #[must_use]
    pub const fn min_version(mut self, version: u32) -> Self {
        self.min_version = version;
        self
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the compression mode used for new writes.
    #[must_use]
    pub const fn compression(&self) -> Compression {
        self.compression
    }

    /// Returns the minimum accepted container framing version.
    #[must_use]
    pub const fn minimum_version(&self) -> u32 {
        self.min_version
    }
}

/// Validates a table name against the reserved character set.
pub fn validate_table_name(name: &str) -> CoreResult<()> {
    if name.is_empty() {
        return Err(CoreError::invalid_argument("table name must not be empty"));
    }

    for ch in name.chars() {
        if ch.is_control() {
            return Err(CoreError::invalid_argument(format!(
                "table name {name:?} contains a control character"
            )));
        }
        if RESERVED_NAME_CHARS.contains(&ch) {
            return Err(CoreError::invalid_argument(format!(
                "table name {name:?} contains reserved character '{ch}'"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names_accepted() {
        for name in ["users", "Order_Items", "t2", "snake.case"] {
            assert!(TableDescriptor::new(name, Compression::None).is_ok());
        }
    }

    #[test]
    fn empty_name_rejected() {
        let result = TableDescriptor::new("", Compression::None);
        assert!(matches!(result, Err(CoreError::InvalidArgument { .. })));
    }

    #[test]
    fn reserved_characters_rejected() {
        for name in ["us<ers", "a>b", "bang!", "a/b", "pipe|", "q?", "col:on"] {
            let result = TableDescriptor::new(name, Compression::None);
            assert!(
                matches!(result, Err(CoreError::InvalidArgument { .. })),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn error_names_offending_character() {
        let err = TableDescriptor::new("us<ers", Compression::None).unwrap_err();
        assert!(err.to_string().contains('<'));
    }

    #[test]
    fn control_characters_rejected() {
        let result = TableDescriptor::new("tab\tname", Compression::None);
        assert!(matches!(result, Err(CoreError::InvalidArgument { .. })));
    }

    #[test]
    fn descriptor_accessors() {
        let descriptor = TableDescriptor::new("users", Compression::Brotli)
            .unwrap()
            .min_version(2);
        assert_eq!(descriptor.name(), "users");
        assert_eq!(descriptor.compression(), Compression::Brotli);
        assert_eq!(descriptor.minimum_version(), 2);
    }
}
