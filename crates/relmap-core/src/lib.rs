//! Core types and traits for relmap.
//!
//! `relmap-core` is the **foundation layer** of the workspace. It defines the
//! declarative mapping vocabulary that entity types carry, the resolver that
//! turns that vocabulary into immutable storage descriptors, and the data types
//! shared by every other crate.
//!
//! # Role In The Architecture
//!
//! - **Contract layer**: `Entity`/`DynEntity` are implemented by domain types
//!   (normally through `#[derive(Entity)]`), `Connection`/`ConnectionProvider` by
//!   database drivers.
//! - **Data model**: `Row`, `Value`, `SqlType` and `Dialect` describe statement
//!   inputs and outputs.
//! - **Metadata**: `metadata::resolve` computes an `EntityMeta` once per type and
//!   caches it for the lifetime of the process.
//!
//! # Who Uses This Crate
//!
//! - `relmap-macros` generates `Entity` implementations defined here.
//! - `relmap-schema` turns `EntityMeta` into DDL.
//! - `relmap-query` turns `EntityMeta` into DML/SELECT statements and marshals rows.
//! - `relmap-session` sequences all of the above against a `Connection`.
//! - `relmap-sqlite` implements `Connection`.

pub mod association;
pub mod connection;
pub mod entity;
pub mod error;
pub mod field;
pub mod identifiers;
pub mod metadata;
pub mod relationship;
pub mod row;
pub mod types;
pub mod value;

#[cfg(test)]
mod fixtures;

pub use association::{Association, Reference};
pub use connection::{Connection, ConnectionProvider};
pub use entity::{DynEntity, Entity, EntityMapping, TableDirective, instantiate};
pub use error::{ConversionError, Error, Result};
pub use field::{ColumnDirective, FieldMapping, JoinColumnDirective};
pub use identifiers::is_valid_identifier;
pub use metadata::{
    ColumnMeta, EntityMeta, ForeignKeyMeta, KeyPart, PrimaryKey, RelationshipMeta, Role, TableMeta,
    resolve, resolve_mapping,
};
pub use relationship::{CascadeSet, CascadeType, RelationDirective, RelationshipKind};
pub use row::Row;
pub use types::{Dialect, SqlType};
pub use value::{ColumnValue, Value, ValueKind};
