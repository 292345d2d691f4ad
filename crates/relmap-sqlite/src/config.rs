//! SQLite connection configuration.

use std::path::PathBuf;
use std::time::Duration;

/// SQLite connection configuration.
///
/// Every [`acquire`](relmap_core::ConnectionProvider::acquire) opens a new
/// connection. With no `path` each connection gets its own private in-memory
/// database, so in-memory data does not outlive the transaction that wrote it.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database file. `None` opens an in-memory database.
    pub path: Option<PathBuf>,
    /// Enforce foreign-key constraints (`PRAGMA foreign_keys`).
    pub foreign_keys: bool,
    /// How long to wait on a locked database before failing.
    pub busy_timeout: Duration,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: None,
            foreign_keys: true,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl SqliteConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for the database file at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::default().path(path)
    }

    /// Set the database file.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Use an in-memory database.
    pub fn in_memory(mut self) -> Self {
        self.path = None;
        self
    }

    /// Enable or disable foreign-key enforcement.
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Set the busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}
