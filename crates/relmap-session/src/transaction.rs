//! The transaction state machine.
//!
//! ```text
//! Unstarted --begin--> Active --commit--> Committed --close--> Closed
//!                        |  \--rollback-> RolledBack --close--> Closed
//!                        \--------------close (rollback first)--> Closed
//! ```
//!
//! A transaction owns exactly one connection from `begin` until `close`.
//! Dropping a transaction closes it.

use relmap_core::{Connection, ConnectionProvider, Error, Result};

/// Lifecycle state of a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Unstarted,
    Active,
    Committed,
    RolledBack,
    Closed,
}

impl TransactionState {
    pub const fn as_str(self) -> &'static str {
        match self {
            TransactionState::Unstarted => "unstarted",
            TransactionState::Active => "active",
            TransactionState::Committed => "committed",
            TransactionState::RolledBack => "rolled back",
            TransactionState::Closed => "closed",
        }
    }

    /// Committed, rolled back or closed.
    pub const fn is_finished(self) -> bool {
        matches!(
            self,
            TransactionState::Committed | TransactionState::RolledBack | TransactionState::Closed
        )
    }
}

/// A unit of work bound to one connection.
pub struct Transaction<C: Connection> {
    state: TransactionState,
    connection: Option<C>,
}

impl<C: Connection> Transaction<C> {
    /// A transaction that has not acquired a connection yet.
    pub fn new() -> Self {
        Self {
            state: TransactionState::Unstarted,
            connection: None,
        }
    }

    /// Acquire a connection and disable auto-commit.
    pub fn begin<P>(&mut self, provider: &P) -> Result<()>
    where
        P: ConnectionProvider<Connection = C>,
    {
        if self.state != TransactionState::Unstarted {
            return Err(self.misuse("begin"));
        }
        let mut connection = provider.acquire()?;
        connection.set_auto_commit(false)?;
        self.connection = Some(connection);
        self.state = TransactionState::Active;
        tracing::info!("Transaction started");
        Ok(())
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// The live connection. Only available while active.
    pub fn connection(&mut self) -> Result<&mut C> {
        if self.state != TransactionState::Active {
            return Err(Error::Transaction(format!(
                "no active transaction (state: {})",
                self.state.as_str()
            )));
        }
        self.connection
            .as_mut()
            .ok_or_else(|| Error::Transaction("active transaction lost its connection".to_string()))
    }

    pub fn commit(&mut self) -> Result<()> {
        self.connection_for("commit")?.commit()?;
        self.state = TransactionState::Committed;
        tracing::info!("Transaction committed");
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.connection_for("rollback")?.rollback()?;
        self.state = TransactionState::RolledBack;
        tracing::info!("Transaction rolled back");
        Ok(())
    }

    /// Release the connection. An active transaction is rolled back first.
    ///
    /// Closing an already-closed transaction does nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.state == TransactionState::Closed {
            return Ok(());
        }
        let rollback = if self.state == TransactionState::Active {
            tracing::warn!("Closing an active transaction without commit; rolling back");
            self.connection.as_mut().map_or(Ok(()), Connection::rollback)
        } else {
            Ok(())
        };
        self.state = TransactionState::Closed;
        let closed = self.connection.take().map_or(Ok(()), Connection::close);
        tracing::debug!("Transaction closed");
        rollback.and(closed)
    }

    fn connection_for(&mut self, operation: &str) -> Result<&mut C> {
        if self.state != TransactionState::Active {
            return Err(self.misuse(operation));
        }
        self.connection()
    }

    fn misuse(&self, operation: &str) -> Error {
        Error::Transaction(format!(
            "cannot {operation} a transaction that is {}",
            self.state.as_str()
        ))
    }
}

impl<C: Connection> Default for Transaction<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connection> Drop for Transaction<C> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "Failed to close transaction on drop");
        }
    }
}

impl<C: Connection> std::fmt::Debug for Transaction<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("state", &self.state)
            .field("has_connection", &self.connection.is_some())
            .finish()
    }
}
