//! Error types for relmap operations.

use thiserror::Error as ThisError;

/// Result type alias for relmap operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the mapping engine and its drivers.
#[derive(Debug, ThisError)]
pub enum Error {
    /// An entity's declarative mapping is invalid.
    #[error("mapping error in {entity}: {message}")]
    Mapping {
        entity: &'static str,
        message: String,
    },

    /// An operation needed a primary key the entity does not declare.
    #[error("{entity} declares no identity or composite key")]
    MissingIdentity { entity: &'static str },

    /// A statement could not be built safely from the given instance.
    #[error("invalid statement: {0}")]
    InvalidStatement(String),

    /// Transaction state-machine misuse.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// A column value could not be read into a field.
    #[error("cannot read field `{field}`: expected {expected}, found {found}")]
    Conversion {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Statement execution or connection failure reported by the driver.
    #[error("database error: {0}")]
    Database(String),
}

impl Error {
    /// Build a mapping error for `entity`.
    pub fn mapping(entity: &'static str, message: impl Into<String>) -> Self {
        Error::Mapping {
            entity,
            message: message.into(),
        }
    }

    /// Attach a field name to a low-level conversion failure.
    pub fn conversion(field: impl Into<String>, err: ConversionError) -> Self {
        Error::Conversion {
            field: field.into(),
            expected: err.expected,
            found: err.found,
        }
    }

    /// Whether this error came from the store rather than from the engine.
    pub const fn is_database(&self) -> bool {
        matches!(self, Error::Database(_))
    }
}

/// A value-level conversion failure, not yet tied to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
#[error("expected {expected}, found {found}")]
pub struct ConversionError {
    pub expected: &'static str,
    pub found: &'static str,
}

impl ConversionError {
    pub const fn new(expected: &'static str, found: &'static str) -> Self {
        Self { expected, found }
    }
}
