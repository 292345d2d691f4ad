//! SQLite driver for relmap.
//!
//! [`SqliteConfig`] is the [`ConnectionProvider`](relmap_core::ConnectionProvider):
//! hand it to a session and every transaction opens its own
//! [`SqliteConnection`].
//!
//! ```ignore
//! let dir = tempfile::tempdir()?;
//! let mut session = Session::new(SqliteConfig::file(dir.path().join("app.db")));
//! ```
//!
//! SQLite has no schemas of its own; a schema-qualified table name refers to
//! an attached database.

pub mod config;
pub mod connection;

pub use config::SqliteConfig;
pub use connection::SqliteConnection;
