//! Mapping metadata resolution.
//!
//! [`resolve`] turns an entity's static [`EntityMapping`] into an immutable
//! [`EntityMeta`]: the table descriptor, ordered column descriptors, primary
//! key and relationship descriptors. Resolution is pure, validated, and
//! performed at most once per type; the result is shared through a
//! process-wide read-mostly cache.
//!
//! Resolving one type never resolves another. Facts about an associated type
//! that a descriptor needs (its table, its identity column, the owning field
//! that points back) are read directly from the associated type's raw mapping,
//! so a bidirectional pair can be resolved in either order without recursion.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::entity::{DynEntity, Entity, EntityMapping};
use crate::error::{Error, Result};
use crate::field::FieldMapping;
use crate::identifiers::is_valid_identifier;
use crate::relationship::{CascadeSet, RelationDirective, RelationshipKind};
use crate::types::SqlType;
use crate::value::{Value, ValueKind};

/// Resolved table name and schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMeta {
    pub name: String,
    pub schema: Option<String>,
}

impl TableMeta {
    /// `schema.name`, or just `name` without a schema.
    pub fn qualified(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{schema}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// A resolved column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    /// Rust field the column is read from and written to.
    pub field: &'static str,
    pub name: String,
    pub sql_type: SqlType,
    pub nullable: bool,
    pub unique: bool,
    pub identity: bool,
    pub composite_key: Option<u16>,
    /// The column stores a referenced entity's identity.
    pub owning: bool,
}

/// One member of a composite key, in key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPart {
    pub field: &'static str,
    pub column: String,
}

/// The primary key of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryKey {
    /// A single auto-incrementing identity field.
    Identity { field: &'static str, column: String },
    /// An ordered composite key.
    Composite(Vec<KeyPart>),
    /// No key declared. Reported when an operation needs one.
    None,
}

/// Which side of a relationship a field is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// The field stores the referenced identity in `column`.
    Owning {
        column: String,
        referenced_column: String,
    },
    /// The field is described by the owning field `mapped_by` on the target.
    Inverse {
        mapped_by: &'static str,
        /// Foreign-key column on the target table.
        owner_column: String,
        /// Column of this table the foreign key references.
        referenced_column: String,
    },
}

/// A resolved relationship field.
#[derive(Debug, Clone)]
pub struct RelationshipMeta {
    pub field: &'static str,
    pub kind: RelationshipKind,
    pub role: Role,
    pub cascade: CascadeSet,
    pub target: fn() -> &'static EntityMapping,
    pub target_type: TypeId,
    pub target_name: &'static str,
    pub target_table: TableMeta,
}

impl RelationshipMeta {
    pub fn is_owning(&self) -> bool {
        matches!(self.role, Role::Owning { .. })
    }

    pub fn is_inverse(&self) -> bool {
        matches!(self.role, Role::Inverse { .. })
    }

    /// Resolved metadata of the associated type.
    pub fn target_meta(&self) -> Result<Arc<EntityMeta>> {
        resolve_mapping((self.target)())
    }
}

impl PartialEq for RelationshipMeta {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field
            && self.kind == other.kind
            && self.role == other.role
            && self.cascade == other.cascade
            && self.target_type == other.target_type
            && self.target_table == other.target_table
    }
}

/// A named FOREIGN KEY constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyMeta {
    /// `fk_<referencedTable>_<owningTable>`.
    pub name: String,
    pub column: String,
    /// Schema-qualified referenced table.
    pub referenced_table: String,
    pub referenced_column: String,
}

/// Resolved storage descriptor of an entity type.
#[derive(Debug)]
pub struct EntityMeta {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub table: TableMeta,
    /// Directly-owned columns in declaration order, owning foreign keys included.
    pub columns: Vec<ColumnMeta>,
    pub primary_key: PrimaryKey,
    pub relationships: Vec<RelationshipMeta>,
    mapping: &'static EntityMapping,
}

impl PartialEq for EntityMeta {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
            && self.table == other.table
            && self.columns == other.columns
            && self.primary_key == other.primary_key
            && self.relationships == other.relationships
    }
}

impl EntityMeta {
    /// The raw mapping this descriptor was resolved from.
    pub fn mapping(&self) -> &'static EntityMapping {
        self.mapping
    }

    /// Unqualified table name, used for column references and aliases.
    pub fn table_name(&self) -> &str {
        &self.table.name
    }

    /// Schema-qualified table name, used in DDL and FROM/JOIN clauses.
    pub fn qualified_table(&self) -> String {
        self.table.qualified()
    }

    /// Column of the single identity field.
    pub fn primary_key_column(&self) -> Result<&str> {
        match &self.primary_key {
            PrimaryKey::Identity { column, .. } => Ok(column),
            PrimaryKey::Composite(_) => Err(Error::mapping(
                self.type_name,
                "a composite primary key has no single identity column",
            )),
            PrimaryKey::None => Err(Error::MissingIdentity {
                entity: self.type_name,
            }),
        }
    }

    /// Field holding the single identity.
    pub fn identity_field(&self) -> Result<&'static str> {
        match &self.primary_key {
            PrimaryKey::Identity { field, .. } => Ok(field),
            PrimaryKey::Composite(_) => Err(Error::mapping(
                self.type_name,
                "a composite primary key has no single identity field",
            )),
            PrimaryKey::None => Err(Error::MissingIdentity {
                entity: self.type_name,
            }),
        }
    }

    /// Every primary-key column, in key order.
    pub fn primary_key_columns(&self) -> Vec<&str> {
        match &self.primary_key {
            PrimaryKey::Identity { column, .. } => vec![column.as_str()],
            PrimaryKey::Composite(parts) => parts.iter().map(|p| p.column.as_str()).collect(),
            PrimaryKey::None => Vec::new(),
        }
    }

    /// Identity value of `entity`. Null and zero both count as absent.
    pub fn identity(&self, entity: &dyn DynEntity) -> Result<Option<i64>> {
        let field = self.identity_field()?;
        Ok(entity
            .read(field)
            .and_then(|v| v.as_i64())
            .filter(|id| *id != 0))
    }

    /// Assign a generated identity onto `entity`.
    pub fn set_identity(&self, entity: &mut dyn DynEntity, id: i64) -> Result<()> {
        let field = self.identity_field()?;
        entity.write(field, Value::BigInt(id))
    }

    pub fn column(&self, field: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.field == field)
    }

    pub fn relationship(&self, field: &str) -> Option<&RelationshipMeta> {
        self.relationships.iter().find(|r| r.field == field)
    }

    /// Owning relationships, in declaration order.
    pub fn owning(&self) -> impl Iterator<Item = &RelationshipMeta> {
        self.relationships.iter().filter(|r| r.is_owning())
    }

    /// Inverse relationships, in declaration order.
    pub fn inverse(&self) -> impl Iterator<Item = &RelationshipMeta> {
        self.relationships.iter().filter(|r| r.is_inverse())
    }

    /// Foreign-key constraint of the owning field `field`.
    pub fn foreign_key(&self, field: &str) -> Result<ForeignKeyMeta> {
        let rel = self.relationship(field).ok_or_else(|| {
            Error::mapping(self.type_name, format!("`{field}` is not a relationship field"))
        })?;
        match &rel.role {
            Role::Owning {
                column,
                referenced_column,
            } => Ok(ForeignKeyMeta {
                name: format!("fk_{}_{}", rel.target_table.name, self.table.name),
                column: column.clone(),
                referenced_table: rel.target_table.qualified(),
                referenced_column: referenced_column.clone(),
            }),
            Role::Inverse { .. } => Err(Error::mapping(
                self.type_name,
                format!("`{field}` is an inverse relationship and has no foreign key"),
            )),
        }
    }

    /// Foreign-key constraints of every owning field.
    pub fn foreign_keys(&self) -> Result<Vec<ForeignKeyMeta>> {
        self.owning().map(|r| self.foreign_key(r.field)).collect()
    }
}

type MetaCache = RwLock<HashMap<TypeId, Arc<EntityMeta>>>;

fn meta_cache() -> &'static MetaCache {
    static CACHE: OnceLock<MetaCache> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Resolve (or fetch the cached) metadata of `E`.
pub fn resolve<E: Entity>() -> Result<Arc<EntityMeta>> {
    resolve_mapping(E::mapping())
}

/// Resolve (or fetch the cached) metadata of a raw mapping.
///
/// Failed resolutions are not cached; the error is returned on every call.
pub fn resolve_mapping(mapping: &'static EntityMapping) -> Result<Arc<EntityMeta>> {
    let key = (mapping.type_id)();

    // Fast path
    {
        let cache = meta_cache().read().unwrap_or_else(PoisonError::into_inner);
        if let Some(meta) = cache.get(&key) {
            return Ok(Arc::clone(meta));
        }
    }

    // Slow path: racing resolvers compute identical descriptors; the first insert wins
    let meta = Arc::new(build(mapping)?);
    let mut cache = meta_cache().write().unwrap_or_else(PoisonError::into_inner);
    let entry = cache.entry(key).or_insert_with(|| {
        tracing::debug!(
            entity = mapping.type_name,
            table = %meta.table.qualified(),
            columns = meta.columns.len(),
            relationships = meta.relationships.len(),
            "Resolved entity metadata"
        );
        Arc::clone(&meta)
    });
    Ok(Arc::clone(entry))
}

fn table_of(mapping: &EntityMapping) -> TableMeta {
    TableMeta {
        name: mapping
            .table
            .name
            .map_or_else(|| mapping.type_name.to_lowercase(), str::to_string),
        schema: mapping.table.schema.map(str::to_string),
    }
}

fn plain_column_name(field: &FieldMapping) -> &'static str {
    field.column.and_then(|c| c.name).unwrap_or(field.name)
}

fn identity_column_of(mapping: &EntityMapping) -> Option<&'static str> {
    mapping
        .fields
        .iter()
        .find(|f| f.id)
        .map(plain_column_name)
}

fn target_type_of(field: &FieldMapping) -> Option<TypeId> {
    field.target.map(|target| (target().type_id)())
}

/// Column name of an owning field: join-column name, then column name, then
/// `<referenced type>_id`.
fn owning_column_name(field: &FieldMapping) -> String {
    if let Some(name) = field.join_column.and_then(|j| j.name) {
        return name.to_string();
    }
    if let Some(name) = field.column.and_then(|c| c.name) {
        return name.to_string();
    }
    match field.target {
        Some(target) => format!("{}_id", target().type_name.to_lowercase()),
        None => field.name.to_string(),
    }
}

fn check_identifier(entity: &'static str, what: &str, name: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(Error::mapping(entity, format!("invalid {what} name `{name}`")))
    }
}

fn build(mapping: &'static EntityMapping) -> Result<EntityMeta> {
    let entity = mapping.type_name;
    let type_id = (mapping.type_id)();
    let table = table_of(mapping);
    check_identifier(entity, "table", &table.name)?;
    if let Some(schema) = &table.schema {
        check_identifier(entity, "schema", schema)?;
    }

    let mut columns = Vec::new();
    let mut relationships = Vec::new();

    for field in mapping.fields {
        if field.is_relationship() {
            let Some(rel) = relationship_of(mapping, type_id, field)? else {
                continue;
            };
            if let Role::Owning { column, .. } = &rel.role {
                let directive = field.column.unwrap_or_default();
                columns.push(ColumnMeta {
                    field: field.name,
                    name: column.clone(),
                    sql_type: directive
                        .sql_type
                        .map_or(SqlType::from_kind(ValueKind::Entity), SqlType::Custom),
                    nullable: directive.nullable.unwrap_or(true),
                    unique: directive.unique,
                    identity: false,
                    composite_key: None,
                    owning: true,
                });
            }
            relationships.push(rel);
            continue;
        }

        let directive = field.column.unwrap_or_default();
        if field.id && !matches!(field.kind, ValueKind::BigInt | ValueKind::Int | ValueKind::SmallInt) {
            return Err(Error::mapping(
                entity,
                format!("identity field `{}` must hold an integer", field.name),
            ));
        }
        // explicit override > identity > type table
        let sql_type = match (directive.sql_type, field.id) {
            (Some(text), _) => SqlType::Custom(text),
            (None, true) => SqlType::Serial,
            (None, false) => SqlType::from_kind(field.kind),
        };
        columns.push(ColumnMeta {
            field: field.name,
            name: plain_column_name(field).to_string(),
            sql_type,
            nullable: directive.nullable.unwrap_or(field.nullable) && !field.id,
            unique: directive.unique,
            identity: field.id,
            composite_key: field.composite_key,
            owning: false,
        });
    }

    let mut seen = HashSet::new();
    for column in &columns {
        check_identifier(entity, "column", &column.name)?;
        if !seen.insert(column.name.to_ascii_lowercase()) {
            return Err(Error::mapping(
                entity,
                format!("column `{}` is mapped more than once", column.name),
            ));
        }
    }

    let primary_key = primary_key_of(entity, &columns)?;

    Ok(EntityMeta {
        type_id,
        type_name: entity,
        table,
        columns,
        primary_key,
        relationships,
        mapping,
    })
}

fn primary_key_of(entity: &'static str, columns: &[ColumnMeta]) -> Result<PrimaryKey> {
    let identities: Vec<&ColumnMeta> = columns.iter().filter(|c| c.identity).collect();
    let mut composite: Vec<(u16, usize, &ColumnMeta)> = columns
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.composite_key.map(|order| (order, i, c)))
        .collect();

    match (identities.as_slice(), composite.is_empty()) {
        ([], true) => Ok(PrimaryKey::None),
        ([id], true) => Ok(PrimaryKey::Identity {
            field: id.field,
            column: id.name.clone(),
        }),
        ([], false) => {
            composite.sort_by_key(|(order, index, _)| (*order, *index));
            Ok(PrimaryKey::Composite(
                composite
                    .into_iter()
                    .map(|(_, _, c)| KeyPart {
                        field: c.field,
                        column: c.name.clone(),
                    })
                    .collect(),
            ))
        }
        (_, true) => Err(Error::mapping(entity, "more than one identity field declared")),
        (_, false) => Err(Error::mapping(
            entity,
            "identity and composite-key fields cannot be mixed",
        )),
    }
}

fn relationship_of(
    mapping: &'static EntityMapping,
    this_type: TypeId,
    field: &'static FieldMapping,
) -> Result<Option<RelationshipMeta>> {
    let entity = mapping.type_name;
    let Some(target_fn) = field.target else {
        let what = if field.is_owning() {
            "a join column"
        } else {
            "a relationship directive"
        };
        return Err(Error::mapping(
            entity,
            format!("`{}` carries {what} but is not typed as an entity", field.name),
        ));
    };
    if field.id || field.composite_key.is_some() {
        return Err(Error::mapping(
            entity,
            format!("relationship field `{}` cannot be part of the primary key", field.name),
        ));
    }

    let target = target_fn();
    let target_type = (target.type_id)();
    let directive = field.relation.unwrap_or(RelationDirective::one_to_one());

    let role = if let Some(join) = field.join_column {
        if directive.mapped_by.is_some() {
            return Err(Error::mapping(
                entity,
                format!("owning field `{}` cannot also declare mapped_by", field.name),
            ));
        }
        if !directive.cascade.is_empty() {
            tracing::warn!(
                entity,
                field = field.name,
                "Cascade set on an owning field is ignored"
            );
        }
        if let Some(back) = target.fields.iter().find(|f| {
            f.is_owning()
                && target_type_of(f) == Some(this_type)
                && !(target_type == this_type && f.name == field.name)
        }) {
            return Err(Error::mapping(
                entity,
                format!(
                    "both `{}.{}` and `{}.{}` carry join columns; exactly one side may own the relationship",
                    entity, field.name, target.type_name, back.name
                ),
            ));
        }
        let column = owning_column_name(field);
        let referenced_column = match join.referenced_column.or_else(|| identity_column_of(target)) {
            Some(column) => column.to_string(),
            None => {
                return Err(Error::mapping(
                    entity,
                    format!(
                        "`{}` references `{}`, which declares no identity column",
                        field.name, target.type_name
                    ),
                ));
            }
        };
        check_identifier(entity, "referenced column", &referenced_column)?;
        Role::Owning {
            column,
            referenced_column,
        }
    } else {
        if directive.kind != RelationshipKind::OneToOne {
            tracing::warn!(
                entity,
                field = field.name,
                kind = directive.kind.as_str(),
                "Skipping unsupported relationship kind"
            );
            return Ok(None);
        }
        let owner = inverse_owner(entity, this_type, field, directive, target)?;
        let owner_column = owning_column_name(owner);
        check_identifier(entity, "column", &owner_column)?;
        let referenced_column = match owner
            .join_column
            .and_then(|j| j.referenced_column)
            .or_else(|| identity_column_of(mapping))
        {
            Some(column) => column.to_string(),
            None => {
                return Err(Error::MissingIdentity { entity });
            }
        };
        Role::Inverse {
            mapped_by: owner.name,
            owner_column,
            referenced_column,
        }
    };

    Ok(Some(RelationshipMeta {
        field: field.name,
        kind: directive.kind,
        role,
        cascade: directive.cascade,
        target: target_fn,
        target_type,
        target_name: target.type_name,
        target_table: table_of(target),
    }))
}

/// Find the owning field on `target` that an inverse field is mapped by.
fn inverse_owner(
    entity: &'static str,
    this_type: TypeId,
    field: &FieldMapping,
    directive: RelationDirective,
    target: &'static EntityMapping,
) -> Result<&'static FieldMapping> {
    if let Some(mapped_by) = directive.mapped_by {
        let owner = target.field(mapped_by).ok_or_else(|| {
            Error::mapping(
                entity,
                format!(
                    "`{}` is mapped by `{}.{}`, which does not exist",
                    field.name, target.type_name, mapped_by
                ),
            )
        })?;
        if !owner.is_owning() {
            return Err(Error::mapping(
                entity,
                format!(
                    "`{}` is mapped by `{}.{}`, which has no join column",
                    field.name, target.type_name, mapped_by
                ),
            ));
        }
        if target_type_of(owner) != Some(this_type) {
            return Err(Error::mapping(
                entity,
                format!(
                    "`{}` is mapped by `{}.{}`, which refers to a different type",
                    field.name, target.type_name, mapped_by
                ),
            ));
        }
        return Ok(owner);
    }

    let mut candidates = target
        .fields
        .iter()
        .filter(|f| f.is_owning() && target_type_of(f) == Some(this_type));
    match (candidates.next(), candidates.next()) {
        (Some(owner), None) => Ok(owner),
        (None, _) => Err(Error::mapping(
            entity,
            format!(
                "`{}` has no owning side: `{}` carries no join column back to {}",
                field.name, target.type_name, entity
            ),
        )),
        (Some(_), Some(_)) => Err(Error::mapping(
            entity,
            format!(
                "`{}` is ambiguous: `{}` has several join columns back to {}; set mapped_by",
                field.name, target.type_name, entity
            ),
        )),
    }
}
