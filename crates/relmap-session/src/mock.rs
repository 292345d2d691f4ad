//! Recording connection used by the session unit tests.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use relmap_core::{Connection, ConnectionProvider, Dialect, Error, Result, Row, Value};

#[derive(Debug, Default)]
pub struct MockState {
    /// Every statement and lifecycle call, in order.
    pub ops: Vec<String>,
    pub params: Vec<Vec<Value>>,
    pub tables: HashSet<String>,
    pub results: VecDeque<Vec<Row>>,
    pub next_key: i64,
    pub affected: u64,
    pub fail_on: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    state: Arc<Mutex<MockState>>,
}

impl MockProvider {
    pub fn new() -> Self {
        let provider = Self::default();
        {
            let mut state = provider.state();
            state.next_key = 1;
            state.affected = 1;
        }
        provider
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConnectionProvider for MockProvider {
    type Connection = MockConnection;

    fn acquire(&self) -> Result<MockConnection> {
        Ok(MockConnection {
            state: Arc::clone(&self.state),
        })
    }
}

pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    fn record(&self, op: &str, params: &[Value]) -> Result<MutexGuard<'_, MockState>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.ops.push(op.to_string());
        state.params.push(params.to_vec());
        if state.fail_on.as_deref().is_some_and(|needle| op.contains(needle)) {
            return Err(Error::Database(format!("mock failure on `{op}`")));
        }
        Ok(state)
    }
}

impl Connection for MockConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Generic
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let mut state = self.record(sql, params)?;
        if let Some(rest) = sql.strip_prefix("CREATE TABLE IF NOT EXISTS ") {
            let table = rest.split([' ', '(']).next().unwrap_or_default();
            state.tables.insert(table.to_string());
        }
        Ok(state.affected)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        Ok(self.record(sql, params)?.results.pop_front().unwrap_or_default())
    }

    fn insert(&mut self, sql: &str, params: &[Value]) -> Result<Option<i64>> {
        let mut state = self.record(sql, params)?;
        let key = state.next_key;
        state.next_key += 1;
        Ok(Some(key))
    }

    fn table_exists(&mut self, _schema: Option<&str>, table: &str) -> Result<bool> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(state.tables.contains(table))
    }

    fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        let op = if enabled { "AUTOCOMMIT ON" } else { "AUTOCOMMIT OFF" };
        self.record(op, &[]).map(drop)
    }

    fn commit(&mut self) -> Result<()> {
        self.record("COMMIT", &[]).map(drop)
    }

    fn rollback(&mut self) -> Result<()> {
        self.record("ROLLBACK", &[]).map(drop)
    }

    fn close(self) -> Result<()> {
        let closed = self.record("CLOSE", &[]).map(drop);
        closed
    }
}

/// Recorded operations, in order.
pub fn ops(provider: &MockProvider) -> Vec<String> {
    provider.state().ops.clone()
}
