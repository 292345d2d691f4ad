//! [`Connection`] over `rusqlite`.
//!
//! Disabling auto-commit opens an explicit `BEGIN`. While auto-commit is off,
//! every `commit` and `rollback` immediately begins the next transaction, so
//! the connection is always inside one until auto-commit is restored or the
//! connection is closed. Closing with a transaction open rolls it back.

use std::sync::Arc;

use rusqlite::params_from_iter;
use rusqlite::types::{Value as SqlValue, ValueRef};

use relmap_core::{Connection, ConnectionProvider, Dialect, Error, Result, Row, Value};

use crate::config::SqliteConfig;

fn database(err: rusqlite::Error) -> Error {
    Error::Database(err.to_string())
}

/// Bind form of a value. Dates and times are stored as ISO-8601 text.
fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(v) => SqlValue::Integer(i64::from(*v)),
        Value::SmallInt(v) => SqlValue::Integer(i64::from(*v)),
        Value::Int(v) => SqlValue::Integer(i64::from(*v)),
        Value::BigInt(v) => SqlValue::Integer(*v),
        Value::Float(v) => SqlValue::Real(f64::from(*v)),
        Value::Double(v) => SqlValue::Real(*v),
        Value::Text(v) => SqlValue::Text(v.clone()),
        Value::Bytes(v) => SqlValue::Blob(v.clone()),
        Value::Date(v) => SqlValue::Text(v.format("%Y-%m-%d").to_string()),
        Value::Time(v) => SqlValue::Text(v.format("%H:%M:%S%.f").to_string()),
        Value::Timestamp(v) => SqlValue::Text(v.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::BigInt(v),
        ValueRef::Real(v) => Value::Double(v),
        ValueRef::Text(v) => Value::Text(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => Value::Bytes(v.to_vec()),
    }
}

/// A single SQLite connection.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
    /// Auto-commit disabled by the caller.
    manual: bool,
}

impl SqliteConnection {
    /// Open a connection as described by `config`.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let conn = match &config.path {
            Some(path) => rusqlite::Connection::open(path),
            None => rusqlite::Connection::open_in_memory(),
        }
        .map_err(database)?;
        conn.busy_timeout(config.busy_timeout).map_err(database)?;
        let pragma = if config.foreign_keys {
            "PRAGMA foreign_keys = ON;"
        } else {
            "PRAGMA foreign_keys = OFF;"
        };
        conn.execute_batch(pragma).map_err(database)?;
        tracing::debug!(path = ?config.path, "Opened SQLite connection");
        Ok(Self {
            conn,
            manual: false,
        })
    }

    /// The underlying `rusqlite` connection.
    pub fn raw(&self) -> &rusqlite::Connection {
        &self.conn
    }

    fn batch(&self, sql: &str) -> Result<()> {
        tracing::trace!(sql, "SQLite batch");
        self.conn.execute_batch(sql).map_err(database)
    }

    fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }
}

impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let params: Vec<SqlValue> = params.iter().map(to_sql).collect();
        let mut stmt = self.conn.prepare(sql).map_err(database)?;
        let affected = stmt.execute(params_from_iter(params.iter())).map_err(database)?;
        Ok(affected as u64)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let params: Vec<SqlValue> = params.iter().map(to_sql).collect();
        let mut stmt = self.conn.prepare(sql).map_err(database)?;
        let columns: Arc<[String]> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>()
            .into();
        let width = columns.len();

        let mut rows = stmt.query(params_from_iter(params.iter())).map_err(database)?;
        let mut result = Vec::new();
        while let Some(row) = rows.next().map_err(database)? {
            let values = (0..width)
                .map(|i| row.get_ref(i).map(from_sql))
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(database)?;
            result.push(Row::new(Arc::clone(&columns), values));
        }
        Ok(result)
    }

    fn insert(&mut self, sql: &str, params: &[Value]) -> Result<Option<i64>> {
        self.execute(sql, params)?;
        Ok(Some(self.conn.last_insert_rowid()))
    }

    fn table_exists(&mut self, schema: Option<&str>, table: &str) -> Result<bool> {
        let sql = match schema {
            Some(schema) => format!(
                "SELECT COUNT(*) FROM {schema}.sqlite_master WHERE type = 'table' AND name = ?1"
            ),
            None => "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1"
                .to_string(),
        };
        let count: i64 = self
            .conn
            .query_row(&sql, [table], |row| row.get(0))
            .map_err(database)?;
        Ok(count > 0)
    }

    fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        if enabled {
            if self.manual && self.in_transaction() {
                self.batch("COMMIT")?;
            }
            self.manual = false;
        } else {
            if !self.in_transaction() {
                self.batch("BEGIN")?;
            }
            self.manual = true;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.in_transaction() {
            self.batch("COMMIT")?;
        }
        if self.manual {
            self.batch("BEGIN")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.in_transaction() {
            self.batch("ROLLBACK")?;
        }
        if self.manual {
            self.batch("BEGIN")?;
        }
        Ok(())
    }

    fn close(self) -> Result<()> {
        if self.in_transaction() {
            self.batch("ROLLBACK")?;
        }
        self.conn.close().map_err(|(_, err)| database(err))?;
        tracing::debug!("Closed SQLite connection");
        Ok(())
    }
}

impl ConnectionProvider for SqliteConfig {
    type Connection = SqliteConnection;

    fn acquire(&self) -> Result<SqliteConnection> {
        SqliteConnection::open(self)
    }
}
