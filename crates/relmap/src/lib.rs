//! Annotation-driven object-relational mapping.
//!
//! Domain types declare their table, columns and one-to-one relationships
//! with `#[derive(Entity)]`. relmap resolves that declaration once per type
//! into cached metadata, renders CREATE/INSERT/UPDATE/DELETE and joined
//! SELECT statements from it, and runs them through a transactional
//! [`Session`].
//!
//! # Example
//!
//! ```ignore
//! use relmap::prelude::*;
//!
//! #[derive(Debug, Default, Entity)]
//! #[orm(table = "users")]
//! struct User {
//!     #[orm(id)]
//!     id: Option<i64>,
//!     firstname: Option<String>,
//!     #[orm(one_to_one(mapped_by = "user", cascade(all)))]
//!     profile: Option<Box<Profile>>,
//! }
//!
//! #[derive(Debug, Default, Entity)]
//! struct Profile {
//!     #[orm(id)]
//!     id: Option<i64>,
//!     #[orm(join_column(name = "user_id"))]
//!     user: Reference<User>,
//!     passport: Option<String>,
//! }
//!
//! let mut session = Session::new(SqliteConfig::file("app.db"));
//! session.begin_transaction()?;
//! let mut user = User { firstname: Some("Stepan".into()), ..User::default() };
//! session.create(&mut user)?;
//! session.commit()?;
//! ```
//!
//! The derive expands to paths under `relmap_core`, so crates deriving
//! `Entity` depend on `relmap-core` alongside `relmap`.

pub use relmap_core::{
    Association, CascadeSet, CascadeType, ColumnValue, Connection, ConnectionProvider,
    ConversionError, Dialect, DynEntity, Entity, EntityMeta, Error, Reference, RelationshipKind,
    Result, Row, SqlType, Value, resolve,
};
pub use relmap_macros::Entity;
pub use relmap_query::{DeleteBuilder, InsertBuilder, SelectPlan, Statement, UpdateBuilder};
pub use relmap_schema::{create_table, create_table_sql};
pub use relmap_session::{Session, SessionConfig, Transaction, TransactionState};

#[cfg(feature = "sqlite")]
pub use relmap_sqlite::{SqliteConfig, SqliteConnection};

/// Everything an application usually needs.
pub mod prelude {
    pub use relmap_core::{Connection, ConnectionProvider, Entity, Error, Reference, Result, Value};
    pub use relmap_macros::Entity;
    pub use relmap_session::{Session, SessionConfig};

    #[cfg(feature = "sqlite")]
    pub use relmap_sqlite::SqliteConfig;
}
