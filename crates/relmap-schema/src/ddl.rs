//! CREATE TABLE generation.
//!
//! A table definition lists every plain column and every owning foreign-key
//! column, then a named primary-key constraint, then one named foreign-key
//! constraint per owning relationship:
//!
//! ```text
//! CREATE TABLE IF NOT EXISTS profile (id SERIAL, user_id BIGINT, passport VARCHAR,
//!     CONSTRAINT pk_profile PRIMARY KEY (id),
//!     CONSTRAINT fk_users_profile FOREIGN KEY (user_id) REFERENCES users(id))
//! ```

use relmap_core::{ColumnMeta, Dialect, Entity, EntityMeta, Error, Result, resolve};

/// Render one column definition: `name TYPE [NOT NULL] [UNIQUE]`.
pub fn column_definition(column: &ColumnMeta, dialect: Dialect) -> String {
    let mut def = format!("{} {}", column.name, column.sql_type.sql_name(dialect));
    if !column.nullable && !column.identity {
        def.push_str(" NOT NULL");
    }
    if column.unique {
        def.push_str(" UNIQUE");
    }
    def
}

/// Render the CREATE TABLE statement for resolved metadata.
pub fn create_table_sql(meta: &EntityMeta, dialect: Dialect) -> Result<String> {
    if meta.columns.is_empty() {
        return Err(Error::InvalidStatement(format!(
            "{} maps no columns; cannot create table {}",
            meta.type_name,
            meta.qualified_table()
        )));
    }

    let mut parts: Vec<String> = meta
        .columns
        .iter()
        .map(|c| column_definition(c, dialect))
        .collect();

    let key_columns = meta.primary_key_columns();
    if !key_columns.is_empty() {
        parts.push(format!(
            "CONSTRAINT pk_{} PRIMARY KEY ({})",
            meta.table_name(),
            key_columns.join(", ")
        ));
    }

    for fk in meta.foreign_keys()? {
        parts.push(format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({})",
            fk.name, fk.column, fk.referenced_table, fk.referenced_column
        ));
    }

    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        meta.qualified_table(),
        parts.join(", ")
    );
    tracing::debug!(entity = meta.type_name, sql = %sql, "Generated DDL");
    Ok(sql)
}

/// Resolve `E` and render its CREATE TABLE statement.
pub fn create_table<E: Entity>(dialect: Dialect) -> Result<String> {
    let meta = resolve::<E>()?;
    create_table_sql(&meta, dialect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmap_core::{
        ColumnDirective, EntityMapping, FieldMapping, JoinColumnDirective, RelationDirective,
        TableDirective, ValueKind, instantiate, resolve_mapping,
    };
    use std::any::TypeId;

    // Raw mappings stand in for derived entities; only metadata is exercised here.

    #[derive(Default)]
    struct Person;
    #[derive(Default)]
    struct Passport;
    #[derive(Default)]
    struct Coupon;
    #[derive(Default)]
    struct Ticket;

    macro_rules! placeholder_entity {
        ($ty:ty, $mapping:ident) => {
            impl relmap_core::DynEntity for $ty {
                fn entity_mapping(&self) -> &'static EntityMapping {
                    $mapping()
                }
                fn read(&self, _field: &str) -> Option<relmap_core::Value> {
                    None
                }
                fn write(&mut self, field: &str, _value: relmap_core::Value) -> Result<()> {
                    Err(Error::mapping("placeholder", field.to_string()))
                }
                fn association(&self, _field: &str) -> Option<&dyn relmap_core::Association> {
                    None
                }
                fn association_mut(
                    &mut self,
                    _field: &str,
                ) -> Option<&mut dyn relmap_core::Association> {
                    None
                }
                fn as_any(&self) -> &dyn std::any::Any {
                    self
                }
                fn into_any(self: Box<Self>) -> Box<dyn std::any::Any> {
                    self
                }
            }
            impl Entity for $ty {
                fn mapping() -> &'static EntityMapping {
                    $mapping()
                }
            }
        };
    }

    fn person() -> &'static EntityMapping {
        static M: EntityMapping = EntityMapping {
            type_name: "Person",
            table: TableDirective::new().name("people").schema("public"),
            fields: &[
                FieldMapping::new("id", ValueKind::BigInt).id(),
                FieldMapping::new("name", ValueKind::Text)
                    .column(ColumnDirective::new().nullable(false).unique(true)),
                FieldMapping::new("born", ValueKind::Date)
                    .column(ColumnDirective::new().name("birthdate")),
                FieldMapping::entity("passport", passport).relation(RelationDirective::one_to_one()),
            ],
            type_id: TypeId::of::<Person>,
            instantiate: instantiate::<Person>,
        };
        &M
    }

    fn passport() -> &'static EntityMapping {
        static M: EntityMapping = EntityMapping {
            type_name: "Passport",
            table: TableDirective::new(),
            fields: &[
                FieldMapping::new("id", ValueKind::BigInt).id(),
                FieldMapping::entity("holder", person)
                    .join_column(JoinColumnDirective::new().name("person_id")),
                FieldMapping::new("number", ValueKind::Text)
                    .column(ColumnDirective::new().sql_type("VARCHAR(16)")),
            ],
            type_id: TypeId::of::<Passport>,
            instantiate: instantiate::<Passport>,
        };
        &M
    }

    fn coupon() -> &'static EntityMapping {
        static M: EntityMapping = EntityMapping {
            type_name: "Coupon",
            table: TableDirective::new(),
            fields: &[
                FieldMapping::new("code", ValueKind::Text).composite_key(1),
                FieldMapping::new("shop", ValueKind::Int).composite_key(0),
                FieldMapping::new("flag", ValueKind::Bool),
            ],
            type_id: TypeId::of::<Coupon>,
            instantiate: instantiate::<Coupon>,
        };
        &M
    }

    placeholder_entity!(Person, person);
    placeholder_entity!(Passport, passport);
    fn ticket() -> &'static EntityMapping {
        static M: EntityMapping = EntityMapping {
            type_name: "Ticket",
            table: TableDirective::new(),
            fields: &[
                FieldMapping::new("id", ValueKind::BigInt).id().nullable(false),
                FieldMapping::new("seat", ValueKind::Int).nullable(false),
                FieldMapping::new("remark", ValueKind::Text),
                FieldMapping::new("gate", ValueKind::Text)
                    .nullable(false)
                    .column(ColumnDirective::new().nullable(true)),
            ],
            type_id: TypeId::of::<Ticket>,
            instantiate: instantiate::<Ticket>,
        };
        &M
    }

    placeholder_entity!(Coupon, coupon);
    placeholder_entity!(Ticket, ticket);

    #[test]
    fn test_create_table_with_constraints() {
        let meta = resolve_mapping(person()).unwrap();
        let sql = create_table_sql(&meta, Dialect::Generic).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS public.people (id SERIAL, name VARCHAR NOT NULL UNIQUE, \
             birthdate DATE, CONSTRAINT pk_people PRIMARY KEY (id))"
        );
    }

    #[test]
    fn test_not_null_follows_field_type_unless_overridden() {
        let sql = create_table::<Ticket>(Dialect::Generic).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS ticket (id SERIAL, seat INTEGER NOT NULL, \
             remark VARCHAR, gate VARCHAR, CONSTRAINT pk_ticket PRIMARY KEY (id))"
        );
    }

    #[test]
    fn test_create_table_with_foreign_key() {
        let sql = create_table::<Passport>(Dialect::Generic).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS passport (id SERIAL, person_id BIGINT, \
             number VARCHAR(16), CONSTRAINT pk_passport PRIMARY KEY (id), \
             CONSTRAINT fk_people_passport FOREIGN KEY (person_id) REFERENCES public.people(id))"
        );
    }

    #[test]
    fn test_sqlite_identity_aliases_rowid() {
        let sql = create_table::<Passport>(Dialect::Sqlite).unwrap();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS passport (id INTEGER, person_id BIGINT"));
    }

    #[test]
    fn test_composite_primary_key_order() {
        let sql = create_table::<Coupon>(Dialect::Generic).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS coupon (code VARCHAR, shop INTEGER, flag BOOLEAN, \
             CONSTRAINT pk_coupon PRIMARY KEY (shop, code))"
        );
    }
}
