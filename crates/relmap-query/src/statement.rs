//! Rendered statements and the ordered column/value list they are built from.

use relmap_core::{Dialect, Value};

/// A SQL statement with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Ordered `(column, value)` pairs.
///
/// Placeholders are rendered from the same list the parameters are drained
/// from, so parameter `n` always belongs to column `n`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnValues {
    entries: Vec<(String, Value)>,
}

impl ColumnValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.entries.push((column.into(), value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value bound to `column`, if present.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }

    /// `a, b, c`
    pub fn column_list(&self) -> String {
        self.columns().collect::<Vec<_>>().join(", ")
    }

    /// Placeholders for every entry, numbered from `first`.
    pub fn placeholders(&self, dialect: Dialect, first: usize) -> String {
        (0..self.entries.len())
            .map(|i| dialect.placeholder(first + i))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `a = ?, b = ?`, numbered from `first`.
    pub fn assignments(&self, dialect: Dialect, first: usize) -> String {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, (c, _))| format!("{c} = {}", dialect.placeholder(first + i)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Consume into the parameter list, in column order.
    pub fn into_params(self) -> Vec<Value> {
        self.entries.into_iter().map(|(_, v)| v).collect()
    }
}
