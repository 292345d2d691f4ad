//! Builders for INSERT, UPDATE and DELETE.
//!
//! Each builder reads one instance through its resolved metadata and renders a
//! [`Statement`]. A builder refuses to produce a statement it cannot make safe:
//! no INSERT without columns, no UPDATE or DELETE without an identity.

use relmap_core::{Dialect, DynEntity, EntityMeta, Error, Result, Value};

use crate::marshal::{insert_values, update_values};
use crate::statement::Statement;

/// INSERT builder.
///
/// ```ignore
/// let stmt = InsertBuilder::new(&meta, &profile).build(Dialect::Sqlite)?;
/// assert_eq!(stmt.sql, "INSERT INTO profile (user_id, passport) VALUES (?, ?)");
/// ```
#[derive(Clone, Copy)]
pub struct InsertBuilder<'a> {
    meta: &'a EntityMeta,
    entity: &'a dyn DynEntity,
}

impl<'a> InsertBuilder<'a> {
    pub fn new(meta: &'a EntityMeta, entity: &'a dyn DynEntity) -> Self {
        Self { meta, entity }
    }

    pub fn build(&self, dialect: Dialect) -> Result<Statement> {
        let values = insert_values(self.meta, self.entity)?;
        if values.is_empty() {
            return Err(Error::InvalidStatement(format!(
                "{} has no insertable columns",
                self.meta.type_name
            )));
        }
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.meta.qualified_table(),
            values.column_list(),
            values.placeholders(dialect, 1)
        );
        Ok(Statement::new(sql, values.into_params()))
    }
}

/// Partial UPDATE builder keyed by the instance identity.
///
/// Fields that are NULL on the instance are left out of the SET list.
#[derive(Clone, Copy)]
pub struct UpdateBuilder<'a> {
    meta: &'a EntityMeta,
    entity: &'a dyn DynEntity,
}

impl<'a> UpdateBuilder<'a> {
    pub fn new(meta: &'a EntityMeta, entity: &'a dyn DynEntity) -> Self {
        Self { meta, entity }
    }

    pub fn build(&self, dialect: Dialect) -> Result<Statement> {
        let meta = self.meta;
        let pk = meta.primary_key_column()?;
        let id = meta.identity(self.entity)?.ok_or_else(|| {
            Error::InvalidStatement(format!("cannot update {} without an identity", meta.type_name))
        })?;
        let values = update_values(meta, self.entity);
        if values.is_empty() {
            return Err(Error::InvalidStatement(format!(
                "no fields set on {} to update",
                meta.type_name
            )));
        }
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = {}",
            meta.qualified_table(),
            values.assignments(dialect, 1),
            pk,
            dialect.placeholder(values.len() + 1)
        );
        let mut params = values.into_params();
        params.push(Value::BigInt(id));
        Ok(Statement::new(sql, params))
    }
}

/// DELETE builder keyed by the instance identity.
#[derive(Clone, Copy)]
pub struct DeleteBuilder<'a> {
    meta: &'a EntityMeta,
    entity: &'a dyn DynEntity,
}

impl<'a> DeleteBuilder<'a> {
    pub fn new(meta: &'a EntityMeta, entity: &'a dyn DynEntity) -> Self {
        Self { meta, entity }
    }

    pub fn build(&self, dialect: Dialect) -> Result<Statement> {
        let meta = self.meta;
        let pk = meta.primary_key_column()?;
        let id = meta.identity(self.entity)?.ok_or_else(|| {
            Error::InvalidStatement(format!("cannot delete {} without an identity", meta.type_name))
        })?;
        let sql = format!(
            "DELETE FROM {} WHERE {} = {}",
            meta.qualified_table(),
            pk,
            dialect.placeholder(1)
        );
        Ok(Statement::new(sql, vec![Value::BigInt(id)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_entities::{Profile, User};
    use relmap_core::{Reference, resolve};

    fn stepan() -> User {
        User {
            id: Some(1),
            firstname: Some("Stepan".to_string()),
            lastname: Some("Bandera".to_string()),
            birth_date: chrono::NaiveDate::from_ymd_opt(1921, 1, 20),
            age: Some(600),
            profile: None,
        }
    }

    #[test]
    fn test_insert_skips_identity() {
        let meta = resolve::<User>().unwrap();
        let stmt = InsertBuilder::new(&meta, &stepan()).build(Dialect::Generic).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO users (firstname, lastname, birthdate, age) VALUES (?, ?, ?, ?)"
        );
        assert_eq!(stmt.params.len(), 4);
        assert_eq!(stmt.params[3], Value::Int(600));
    }

    #[test]
    fn test_insert_postgres_placeholders() {
        let meta = resolve::<Profile>().unwrap();
        let profile = Profile {
            user: Reference::Key(1),
            passport: Some("BC254125".to_string()),
            ..Profile::default()
        };
        let stmt = InsertBuilder::new(&meta, &profile)
            .build(Dialect::Postgres)
            .unwrap();
        assert_eq!(stmt.sql, "INSERT INTO profile (user_id, passport) VALUES ($1, $2)");
    }

    #[test]
    fn test_partial_update() {
        let meta = resolve::<User>().unwrap();
        let user = User {
            id: Some(1),
            age: Some(601),
            ..User::default()
        };
        let stmt = UpdateBuilder::new(&meta, &user).build(Dialect::Postgres).unwrap();
        assert_eq!(stmt.sql, "UPDATE users SET age = $1 WHERE id = $2");
        assert_eq!(stmt.params, vec![Value::Int(601), Value::BigInt(1)]);
    }

    #[test]
    fn test_update_and_delete_need_identity() {
        let meta = resolve::<User>().unwrap();
        let mut user = stepan();
        user.id = None;
        assert!(matches!(
            UpdateBuilder::new(&meta, &user).build(Dialect::Generic),
            Err(Error::InvalidStatement(_))
        ));
        assert!(matches!(
            DeleteBuilder::new(&meta, &user).build(Dialect::Generic),
            Err(Error::InvalidStatement(_))
        ));

        let empty = User {
            id: Some(1),
            ..User::default()
        };
        assert!(matches!(
            UpdateBuilder::new(&meta, &empty).build(Dialect::Generic),
            Err(Error::InvalidStatement(_))
        ));
    }

    #[test]
    fn test_delete_by_identity() {
        let meta = resolve::<User>().unwrap();
        let stmt = DeleteBuilder::new(&meta, &stepan()).build(Dialect::Generic).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM users WHERE id = ?");
        assert_eq!(stmt.params, vec![Value::BigInt(1)]);
    }
}
