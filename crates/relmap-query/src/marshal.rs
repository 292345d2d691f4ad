//! Row↔object marshaling.
//!
//! Binding reads an instance's fields into [`ColumnValues`] in declared column
//! order. Filling walks a [`SelectPlan`] and writes a fresh instance (and the
//! joined associates) from one result row.

use std::any::TypeId;

use relmap_core::{
    Association, DynEntity, Entity, EntityMeta, Error, PrimaryKey, Result, Role, Row, Value,
    resolve_mapping,
};

use crate::select::{JoinSide, PlanNode, SelectPlan};
use crate::statement::ColumnValues;

/// Value an owning field binds: the referenced entity's key, not the object.
pub fn referenced_value(association: &dyn Association, referenced_column: &str) -> Result<Value> {
    if let Some(target) = association.target() {
        let meta = resolve_mapping(target.entity_mapping())?;
        let column = meta
            .columns
            .iter()
            .find(|c| c.name == referenced_column)
            .ok_or_else(|| {
                Error::mapping(
                    meta.type_name,
                    format!("no column `{referenced_column}` to reference"),
                )
            })?;
        let value = target.read(column.field).unwrap_or_default();
        return Ok(match value.as_i64() {
            Some(0) if column.identity => Value::Null,
            _ => value,
        });
    }
    Ok(association
        .stored_key()
        .map_or(Value::Null, Value::BigInt))
}

/// Values for an INSERT: every column except the identity.
pub fn insert_values(meta: &EntityMeta, entity: &dyn DynEntity) -> Result<ColumnValues> {
    let mut values = ColumnValues::new();
    for column in meta.columns.iter().filter(|c| !c.identity) {
        let value = if column.owning {
            let Some(Role::Owning {
                referenced_column, ..
            }) = meta.relationship(column.field).map(|r| &r.role)
            else {
                return Err(Error::mapping(
                    meta.type_name,
                    format!("`{}` has no owning relationship", column.field),
                ));
            };
            let association = entity.association(column.field).ok_or_else(|| {
                Error::mapping(
                    meta.type_name,
                    format!("`{}` is not readable as an association", column.field),
                )
            })?;
            referenced_value(association, referenced_column)?
        } else {
            entity.read(column.field).unwrap_or_default()
        };
        values.push(column.name.clone(), value);
    }
    Ok(values)
}

/// Values for a partial UPDATE: set, non-identity, non-relationship columns.
pub fn update_values(meta: &EntityMeta, entity: &dyn DynEntity) -> ColumnValues {
    let mut values = ColumnValues::new();
    for column in meta.columns.iter().filter(|c| !c.identity && !c.owning) {
        match entity.read(column.field) {
            Some(value) if !value.is_null() => values.push(column.name.clone(), value),
            _ => {}
        }
    }
    values
}

/// An in-progress ancestor of the node being filled.
struct Ancestor {
    type_id: TypeId,
    identity: Option<i64>,
}

/// Fill a fresh root instance from `row`.
pub fn fill(plan: &SelectPlan, row: &Row) -> Result<Box<dyn DynEntity>> {
    let mut ancestors = Vec::new();
    fill_node(&plan.root, row, &mut ancestors)
}

/// Fill a fresh `E` from `row`.
pub fn fill_entity<E: Entity>(plan: &SelectPlan, row: &Row) -> Result<E> {
    let filled = fill(plan, row)?;
    let found = filled.entity_mapping().type_name;
    filled
        .into_any()
        .downcast::<E>()
        .map(|boxed| *boxed)
        .map_err(|_| {
            Error::mapping(
                E::mapping().type_name,
                format!("plan rooted at `{found}` cannot fill this type"),
            )
        })
}

fn fill_node(
    node: &PlanNode,
    row: &Row,
    ancestors: &mut Vec<Ancestor>,
) -> Result<Box<dyn DynEntity>> {
    let meta = &node.meta;
    let mut entity = (meta.mapping().instantiate)();

    for column in meta.columns.iter().filter(|c| !c.owning) {
        let value = row.get_named(&node.alias(column)).cloned().unwrap_or_default();
        entity.write(column.field, value)?;
    }

    let identity = match meta.primary_key {
        PrimaryKey::Identity { .. } => meta.identity(entity.as_ref())?,
        _ => None,
    };

    for rel in meta.owning() {
        let Role::Owning { column, .. } = &rel.role else {
            continue;
        };
        let fk = row
            .get_named(&crate::select::column_alias(meta, column))
            .and_then(Value::as_i64);
        let ancestor = ancestors
            .iter()
            .rev()
            .find(|a| a.type_id == rel.target_type)
            .map(|a| a.identity);

        let association = entity.association_mut(rel.field).ok_or_else(|| {
            Error::mapping(
                meta.type_name,
                format!("`{}` is not writable as an association", rel.field),
            )
        })?;

        if let Some(ancestor_id) = ancestor {
            // back-reference to an object already being built further up
            if let Some(key) = ancestor_id.or(fk) {
                association.link_key(key);
            }
            continue;
        }
        if let Some(child) = node.child(rel.field).filter(|c| c.side == Some(JoinSide::Owning)) {
            if fk.is_some() && joined_row_present(child, row) {
                ancestors.push(Ancestor {
                    type_id: meta.type_id,
                    identity,
                });
                let target = fill_node(child, row, ancestors);
                ancestors.pop();
                association.attach(target?)?;
                continue;
            }
        }
        if let Some(key) = fk {
            association.link_key(key);
        }
    }

    for rel in meta.inverse() {
        let Some(child) = node.child(rel.field).filter(|c| c.side == Some(JoinSide::Inverse)) else {
            continue;
        };
        if !joined_row_present(child, row) {
            continue;
        }
        ancestors.push(Ancestor {
            type_id: meta.type_id,
            identity,
        });
        let target = fill_node(child, row, ancestors);
        ancestors.pop();
        let target = target?;
        entity
            .association_mut(rel.field)
            .ok_or_else(|| {
                Error::mapping(
                    meta.type_name,
                    format!("`{}` is not writable as an association", rel.field),
                )
            })?
            .attach(target)?;
    }

    Ok(entity)
}

/// Whether a LEFT JOIN matched: the joined key (or any joined column) is non-null.
fn joined_row_present(node: &PlanNode, row: &Row) -> bool {
    let meta = &node.meta;
    let key_columns = meta.primary_key_columns();
    let probe: Vec<&str> = if key_columns.is_empty() {
        meta.columns.iter().map(|c| c.name.as_str()).collect()
    } else {
        key_columns
    };
    probe.iter().any(|column| {
        row.get_named(&crate::select::column_alias(meta, column))
            .is_some_and(|v| !v.is_null())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_entities::{Profile, User};
    use chrono::NaiveDate;
    use relmap_core::{Reference, resolve};
    use std::sync::Arc;

    fn user_row(values: Vec<Value>) -> Row {
        let columns: Arc<[String]> = [
            "users_id",
            "users_firstname",
            "users_lastname",
            "users_birthdate",
            "users_age",
            "profile_id",
            "profile_user_id",
            "profile_passport",
        ]
        .iter()
        .map(|s| (*s).to_string())
        .collect::<Vec<_>>()
        .into();
        Row::new(columns, values)
    }

    #[test]
    fn test_insert_binds_referenced_identity() {
        let meta = resolve::<Profile>().unwrap();
        let user = User {
            id: Some(9),
            ..User::default()
        };
        let profile = Profile {
            id: None,
            user: Reference::loaded(user),
            passport: Some("BC254125".to_string()),
        };
        let values = insert_values(&meta, &profile).unwrap();
        assert_eq!(values.column_list(), "user_id, passport");
        assert_eq!(
            values.into_params(),
            vec![Value::BigInt(9), Value::Text("BC254125".to_string())]
        );

        let profile = Profile {
            user: Reference::Key(4),
            ..Profile::default()
        };
        let values = insert_values(&meta, &profile).unwrap();
        assert_eq!(values.get("user_id"), Some(&Value::BigInt(4)));

        let values = insert_values(&meta, &Profile::default()).unwrap();
        assert_eq!(values.get("user_id"), Some(&Value::Null));
    }

    #[test]
    fn test_update_values_skip_unset_fields() {
        let meta = resolve::<User>().unwrap();
        let user = User {
            id: Some(1),
            age: Some(601),
            ..User::default()
        };
        let values = update_values(&meta, &user);
        assert_eq!(values.column_list(), "age");
    }

    #[test]
    fn test_fill_cycle_uses_ancestor_key() {
        let plan = SelectPlan::for_entity::<User>().unwrap();
        let birth = NaiveDate::from_ymd_opt(1921, 1, 20).unwrap();
        let row = user_row(vec![
            Value::BigInt(1),
            Value::from("Stepan"),
            Value::from("Bandera"),
            Value::Text("1921-01-20".to_string()),
            Value::BigInt(600),
            Value::BigInt(3),
            Value::BigInt(1),
            Value::from("BC254125"),
        ]);

        let user: User = fill_entity(&plan, &row).unwrap();
        assert_eq!(user.id, Some(1));
        assert_eq!(user.firstname.as_deref(), Some("Stepan"));
        assert_eq!(user.birth_date, Some(birth));
        assert_eq!(user.age, Some(600));

        let profile = user.profile.as_deref().unwrap();
        assert_eq!(profile.id, Some(3));
        assert_eq!(profile.passport.as_deref(), Some("BC254125"));
        assert_eq!(profile.user, Reference::Key(1));
    }

    #[test]
    fn test_fill_left_join_miss_leaves_inverse_empty() {
        let plan = SelectPlan::for_entity::<User>().unwrap();
        let row = user_row(vec![
            Value::BigInt(2),
            Value::from("Ivan"),
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
        ]);
        let user: User = fill_entity(&plan, &row).unwrap();
        assert_eq!(user.id, Some(2));
        assert!(user.profile.is_none());
        assert_eq!(user.lastname, None);
    }

    #[test]
    fn test_fill_owning_side_loads_target() {
        let plan = SelectPlan::for_entity::<Profile>().unwrap();
        let columns: Arc<[String]> = [
            "profile_id",
            "profile_user_id",
            "profile_passport",
            "users_id",
            "users_firstname",
            "users_lastname",
            "users_birthdate",
            "users_age",
        ]
        .iter()
        .map(|s| (*s).to_string())
        .collect::<Vec<_>>()
        .into();
        let row = Row::new(
            columns,
            vec![
                Value::BigInt(3),
                Value::BigInt(1),
                Value::from("BC254125"),
                Value::BigInt(1),
                Value::from("Stepan"),
                Value::from("Bandera"),
                Value::Null,
                Value::Int(600),
            ],
        );
        let profile: Profile = fill_entity(&plan, &row).unwrap();
        let user = profile.user.get().unwrap();
        assert_eq!(user.id, Some(1));
        assert_eq!(user.lastname.as_deref(), Some("Bandera"));
        assert!(user.profile.is_none());
    }

    #[test]
    fn test_fill_entity_rejects_wrong_type() {
        let plan = SelectPlan::for_entity::<Profile>().unwrap();
        let row = Row::new(Arc::from(Vec::<String>::new()), Vec::new());
        assert!(fill_entity::<User>(&plan, &row).is_err());
    }
}
