//! Transactional session for relmap.
//!
//! A [`Session`] runs every operation against the live connection of its
//! current [`Transaction`]. Operations cascade across one-to-one pairs
//! according to the cascade set of the inverse side:
//!
//! - `create` inserts the root, captures its generated key, then creates each
//!   associated object whose cascade includes `ADD`
//! - `delete` removes associated objects whose cascade includes `REMOVE`
//!   before the root row
//! - `find_by_id` / `find_all` fill associated objects whose cascade includes
//!   `GET` from the same joined row
//!
//! # Example
//!
//! ```ignore
//! let mut session = Session::new(SqliteConfig::default());
//! session.begin_transaction()?;
//!
//! let mut user = User { firstname: Some("Stepan".into()), ..User::default() };
//! session.create(&mut user)?;
//! let found = session.find_by_id::<User>(user.id.unwrap_or_default())?;
//!
//! session.commit()?;
//! session.close()?;
//! ```
//!
//! A failed cascade step is returned unchanged; rolling back the transaction
//! undoes whatever part of the graph was already written.

pub mod transaction;

#[cfg(test)]
mod mock;

use std::any::TypeId;
use std::collections::HashSet;

use serde::Deserialize;

use relmap_core::{
    CascadeType, Connection, ConnectionProvider, Dialect, DynEntity, Entity, EntityMeta, Error,
    PrimaryKey, Result, Role, Row, Value, resolve, resolve_mapping,
};
use relmap_query::{
    DeleteBuilder, InsertBuilder, SelectPlan, Statement, UpdateBuilder, fill_entity,
};
use relmap_schema::create_table_sql;

pub use transaction::{Transaction, TransactionState};

// ============================================================================
// Session Configuration
// ============================================================================

/// Configuration for Session behavior.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Create missing tables on first `create`.
    pub auto_create_tables: bool,
    /// Dialect to render SQL in. Defaults to the connection's own.
    pub dialect: Option<Dialect>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_create_tables: true,
            dialect: None,
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Unit of work over one transaction at a time.
pub struct Session<P: ConnectionProvider> {
    provider: P,
    config: SessionConfig,
    transaction: Option<Transaction<P::Connection>>,
}

impl<P: ConnectionProvider> Session<P> {
    pub fn new(provider: P) -> Self {
        Self::with_config(provider, SessionConfig::default())
    }

    pub fn with_config(provider: P, config: SessionConfig) -> Self {
        Self {
            provider,
            config,
            transaction: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// State of the current transaction, if one was ever begun.
    pub fn transaction_state(&self) -> Option<TransactionState> {
        self.transaction.as_ref().map(Transaction::state)
    }

    /// Begin a fresh transaction.
    ///
    /// A finished transaction is replaced (and closed). Beginning while the
    /// current one is still active is an error.
    pub fn begin_transaction(&mut self) -> Result<()> {
        if self.transaction.as_ref().is_some_and(Transaction::is_active) {
            return Err(Error::Transaction(
                "a transaction is already active".to_string(),
            ));
        }
        if let Some(mut finished) = self.transaction.take() {
            finished.close()?;
        }
        tracing::info!("Beginning transaction");
        let mut transaction = Transaction::new();
        transaction.begin(&self.provider)?;
        self.transaction = Some(transaction);
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        self.current()?.commit()
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.current()?.rollback()
    }

    /// Close the current transaction, rolling it back first if still active.
    pub fn close(&mut self) -> Result<()> {
        match self.transaction.as_mut() {
            Some(transaction) => transaction.close(),
            None => Ok(()),
        }
    }

    /// Load the `E` with identity `id`, filling joined associations.
    ///
    /// Returns `Ok(None)` when no row matches, including when the table of
    /// `E` was never created.
    #[tracing::instrument(level = "debug", skip(self), fields(entity = E::mapping().type_name))]
    pub fn find_by_id<E: Entity>(&mut self, id: i64) -> Result<Option<E>> {
        let plan = SelectPlan::for_entity::<E>()?;
        let mut executor = self.executor()?;
        if !executor.table_exists(&plan.root.meta)? {
            tracing::debug!(table = %plan.root.meta.qualified_table(), "No table, nothing to find");
            return Ok(None);
        }
        let statement = plan.select_by_id(id, executor.dialect)?;
        let rows = executor.query(&statement)?;
        rows.first()
            .map(|row| fill_entity::<E>(&plan, row))
            .transpose()
    }

    /// Load every `E`, each graph-filled.
    ///
    /// A table that was never created holds no rows.
    #[tracing::instrument(level = "debug", skip(self), fields(entity = E::mapping().type_name))]
    pub fn find_all<E: Entity>(&mut self) -> Result<Vec<E>> {
        let plan = SelectPlan::for_entity::<E>()?;
        let mut executor = self.executor()?;
        if !executor.table_exists(&plan.root.meta)? {
            tracing::debug!(table = %plan.root.meta.qualified_table(), "No table, nothing to find");
            return Ok(Vec::new());
        }
        let rows = executor.query(&plan.select_all())?;
        rows.iter().map(|row| fill_entity::<E>(&plan, row)).collect()
    }

    /// Insert `entity` and cascade to associated objects.
    ///
    /// The generated identity is written back onto `entity` and onto every
    /// cascaded child's back-reference.
    #[tracing::instrument(level = "debug", skip(self, entity), fields(entity = E::mapping().type_name))]
    pub fn create<E: Entity>(&mut self, entity: &mut E) -> Result<()> {
        self.executor()?.create(entity)
    }

    /// Update the set, non-relationship fields of `entity` by identity.
    ///
    /// Returns the number of affected rows.
    #[tracing::instrument(level = "debug", skip(self, entity), fields(entity = E::mapping().type_name))]
    pub fn update<E: Entity>(&mut self, entity: &E) -> Result<u64> {
        let meta = resolve::<E>()?;
        let mut executor = self.executor()?;
        let statement = UpdateBuilder::new(&meta, entity).build(executor.dialect)?;
        executor.execute(&statement)
    }

    /// Delete `entity` after its cascaded associated objects.
    ///
    /// Returns the number of root rows removed.
    #[tracing::instrument(level = "debug", skip(self, entity), fields(entity = E::mapping().type_name))]
    pub fn delete<E: Entity>(&mut self, entity: &E) -> Result<u64> {
        self.executor()?.delete(entity)
    }

    fn current(&mut self) -> Result<&mut Transaction<P::Connection>> {
        self.transaction
            .as_mut()
            .ok_or_else(|| Error::Transaction("no transaction has been started".to_string()))
    }

    fn executor(&mut self) -> Result<Executor<'_, P::Connection>> {
        let auto_create_tables = self.config.auto_create_tables;
        let configured = self.config.dialect;
        let connection = self
            .transaction
            .as_mut()
            .ok_or_else(|| Error::Transaction("no transaction has been started".to_string()))?
            .connection()?;
        let dialect = configured.unwrap_or_else(|| connection.dialect());
        Ok(Executor {
            connection,
            dialect,
            auto_create_tables,
        })
    }
}

impl<P: ConnectionProvider> std::fmt::Debug for Session<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("transaction", &self.transaction_state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Statement execution and cascades
// ============================================================================

/// Borrowed live connection plus the settings operations need.
struct Executor<'a, C: Connection> {
    connection: &'a mut C,
    dialect: Dialect,
    auto_create_tables: bool,
}

impl<C: Connection> Executor<'_, C> {
    fn execute(&mut self, statement: &Statement) -> Result<u64> {
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "Executing");
        self.connection.execute(&statement.sql, &statement.params)
    }

    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>> {
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "Querying");
        let rows = self.connection.query(&statement.sql, &statement.params)?;
        tracing::debug!(rows = rows.len(), "Query returned");
        Ok(rows)
    }

    fn table_exists(&mut self, meta: &EntityMeta) -> Result<bool> {
        self.connection
            .table_exists(meta.table.schema.as_deref(), meta.table_name())
    }

    /// Create the table of `meta` and of every entity a create or read of it
    /// touches, when missing.
    ///
    /// Owning-side targets are created before `meta`, since its foreign key
    /// references them. Inverse targets whose cascade includes `ADD` or `GET`
    /// come after, since they reference `meta`.
    fn ensure_table(&mut self, meta: &EntityMeta, visited: &mut HashSet<TypeId>) -> Result<()> {
        if !visited.insert(meta.type_id) {
            return Ok(());
        }
        for rel in meta.owning() {
            let target = rel.target_meta()?;
            self.ensure_table(&target, visited)?;
        }
        if !self.table_exists(meta)? {
            let sql = create_table_sql(meta, self.dialect)?;
            tracing::info!(table = %meta.qualified_table(), "Creating missing table");
            self.execute(&Statement::new(sql, Vec::new()))?;
        }
        for rel in meta.inverse().filter(|r| {
            r.cascade.propagates(CascadeType::Add) || r.cascade.propagates(CascadeType::Get)
        }) {
            let target = rel.target_meta()?;
            self.ensure_table(&target, visited)?;
        }
        Ok(())
    }

    fn create(&mut self, entity: &mut dyn DynEntity) -> Result<()> {
        let meta = resolve_mapping(entity.entity_mapping())?;
        if self.auto_create_tables {
            self.ensure_table(&meta, &mut HashSet::new())?;
        }

        let statement = InsertBuilder::new(&meta, entity).build(self.dialect)?;
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "Inserting");
        let generated = self.connection.insert(&statement.sql, &statement.params)?;
        if let (Some(id), PrimaryKey::Identity { .. }) = (generated, &meta.primary_key) {
            meta.set_identity(entity, id)?;
            tracing::debug!(entity = meta.type_name, id, "Captured generated key");
        }

        for rel in meta
            .inverse()
            .filter(|r| r.cascade.propagates(CascadeType::Add))
        {
            let Role::Inverse {
                mapped_by,
                referenced_column,
                ..
            } = &rel.role
            else {
                continue;
            };
            let has_child = entity
                .association(rel.field)
                .is_some_and(|association| association.target().is_some());
            if !has_child {
                continue;
            }
            let key = referenced_key(&meta, entity, referenced_column)?;
            let Some(child) = entity
                .association_mut(rel.field)
                .and_then(|association| association.target_mut())
            else {
                continue;
            };
            link_back_reference(child, mapped_by, &meta, referenced_column, key)?;
            tracing::info!(
                parent = meta.type_name,
                child = rel.target_name,
                field = rel.field,
                "Cascading create"
            );
            self.create(child)?;
        }
        Ok(())
    }

    fn delete(&mut self, entity: &dyn DynEntity) -> Result<u64> {
        let meta = resolve_mapping(entity.entity_mapping())?;
        let statement = DeleteBuilder::new(&meta, entity).build(self.dialect)?;

        // children first: the root DELETE does not wait for missing children
        for rel in meta
            .inverse()
            .filter(|r| r.cascade.propagates(CascadeType::Remove))
        {
            let Some(child) = entity
                .association(rel.field)
                .and_then(|association| association.target())
            else {
                continue;
            };
            tracing::info!(
                parent = meta.type_name,
                child = rel.target_name,
                field = rel.field,
                "Cascading delete"
            );
            self.delete(child)?;
        }
        self.execute(&statement)
    }
}

/// Key a child's foreign key must hold to reference `entity`.
fn referenced_key(meta: &EntityMeta, entity: &dyn DynEntity, column: &str) -> Result<i64> {
    let field = meta
        .columns
        .iter()
        .find(|c| c.name == column)
        .map(|c| c.field)
        .ok_or_else(|| Error::mapping(meta.type_name, format!("no column `{column}` to reference")))?;
    entity
        .read(field)
        .and_then(|v| v.as_i64())
        .filter(|key| *key != 0)
        .ok_or(Error::MissingIdentity {
            entity: meta.type_name,
        })
}

/// Point the child's owning field `mapped_by` at the parent.
fn link_back_reference(
    child: &mut dyn DynEntity,
    mapped_by: &str,
    parent: &EntityMeta,
    referenced_column: &str,
    key: i64,
) -> Result<()> {
    let child_type = child.entity_mapping().type_name;
    let back = child.association_mut(mapped_by).ok_or_else(|| {
        Error::mapping(
            child_type,
            format!("`{mapped_by}` is not writable as an association"),
        )
    })?;
    match back.target_mut() {
        Some(loaded) => {
            let field = parent
                .columns
                .iter()
                .find(|c| c.name == referenced_column)
                .map(|c| c.field)
                .ok_or_else(|| {
                    Error::mapping(
                        parent.type_name,
                        format!("no column `{referenced_column}` to reference"),
                    )
                })?;
            loaded.write(field, Value::BigInt(key))
        }
        None => {
            back.link_key(key);
            Ok(())
        }
    }
}
