//! SQL type descriptors and dialect differences.

use serde::Deserialize;

use crate::value::ValueKind;

/// SQL column type as rendered into DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    /// Auto-incrementing identity column.
    Serial,
    BigInt,
    Integer,
    SmallInt,
    Varchar,
    Boolean,
    Date,
    Time,
    Timestamp,
    DoublePrecision,
    Real,
    Bytea,
    /// Explicit type text taken verbatim from a column directive.
    Custom(&'static str),
}

impl SqlType {
    /// Fixed type table keyed by a field's declared value kind.
    ///
    /// Entity references fall back to `BIGINT`, the width of an identity value.
    pub const fn from_kind(kind: ValueKind) -> Self {
        match kind {
            ValueKind::BigInt => SqlType::BigInt,
            ValueKind::Int => SqlType::Integer,
            ValueKind::SmallInt => SqlType::SmallInt,
            ValueKind::Text => SqlType::Varchar,
            ValueKind::Timestamp => SqlType::Timestamp,
            ValueKind::Date => SqlType::Date,
            ValueKind::Time => SqlType::Time,
            ValueKind::Bool => SqlType::Boolean,
            ValueKind::Double => SqlType::DoublePrecision,
            ValueKind::Float => SqlType::Real,
            ValueKind::Bytes => SqlType::Bytea,
            ValueKind::Entity => SqlType::BigInt,
        }
    }

    /// Render the type name for `dialect`.
    pub const fn sql_name(&self, dialect: Dialect) -> &'static str {
        match self {
            SqlType::Serial => dialect.identity_type(),
            SqlType::BigInt => "BIGINT",
            SqlType::Integer => "INTEGER",
            SqlType::SmallInt => "SMALLINT",
            SqlType::Varchar => "VARCHAR",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::DoublePrecision => "DOUBLE PRECISION",
            SqlType::Real => "REAL",
            SqlType::Bytea => match dialect {
                Dialect::Sqlite => "BLOB",
                _ => "BYTEA",
            },
            SqlType::Custom(text) => text,
        }
    }
}

/// SQL dialect for placeholder and identity rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// ANSI-ish output with `?` placeholders and `SERIAL` identities.
    #[default]
    Generic,
    /// PostgreSQL: `$1, $2, ...` placeholders.
    Postgres,
    /// SQLite: `INTEGER PRIMARY KEY` aliases the rowid.
    Sqlite,
}

impl Dialect {
    /// Placeholder for the 1-based parameter `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Generic | Dialect::Sqlite => "?".to_string(),
        }
    }

    /// Column type used for an auto-incrementing identity.
    pub const fn identity_type(self) -> &'static str {
        match self {
            Dialect::Sqlite => "INTEGER",
            Dialect::Generic | Dialect::Postgres => "SERIAL",
        }
    }
}
