//! Schema generation for relmap.
//!
//! `relmap-schema` renders CREATE TABLE statements from resolved
//! [`EntityMeta`](relmap_core::EntityMeta). It never talks to a database; the
//! session decides when a table needs creating.

pub mod ddl;

pub use ddl::{column_definition, create_table, create_table_sql};
