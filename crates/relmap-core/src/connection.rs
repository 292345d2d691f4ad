//! The database connection boundary.
//!
//! The engine never opens connections itself. A driver supplies a
//! [`ConnectionProvider`], and a transaction acquires exactly one
//! [`Connection`] from it for its whole lifetime.
//!
//! All calls block until the statement completes or fails.

use crate::error::Result;
use crate::row::Row;
use crate::types::Dialect;
use crate::value::Value;

/// A live, transaction-capable connection.
pub trait Connection: Send {
    /// SQL dialect the connection speaks.
    fn dialect(&self) -> Dialect;

    /// Execute a statement, returning the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute a query, returning every result row.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute an INSERT, returning the store-assigned key if one was generated.
    fn insert(&mut self, sql: &str, params: &[Value]) -> Result<Option<i64>>;

    /// Whether `table` exists (inside `schema`, when given).
    fn table_exists(&mut self, schema: Option<&str>, table: &str) -> Result<bool>;

    /// Toggle auto-commit. Disabling it opens an explicit transaction.
    fn set_auto_commit(&mut self, enabled: bool) -> Result<()>;

    /// Commit the current transaction.
    fn commit(&mut self) -> Result<()>;

    /// Roll back the current transaction.
    fn rollback(&mut self) -> Result<()>;

    /// Release the connection.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Source of connections, typically a pool or a driver configuration.
pub trait ConnectionProvider {
    type Connection: Connection;

    /// Acquire a fresh connection.
    fn acquire(&self) -> Result<Self::Connection>;
}
