//! Field-level mapping directives.
//!
//! These are the raw, unresolved facts an entity declares about each of its
//! fields. `#[derive(Entity)]` emits them as `const` builder chains into a
//! `static` table; the resolver in [`crate::metadata`] turns them into column
//! and relationship descriptors.

use crate::entity::EntityMapping;
use crate::relationship::RelationDirective;
use crate::value::ValueKind;

/// Explicit column directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDirective {
    /// Column name override.
    pub name: Option<&'static str>,
    /// SQL type override, rendered verbatim.
    pub sql_type: Option<&'static str>,
    /// Whether the column accepts NULL. Unset follows the field's type.
    pub nullable: Option<bool>,
    /// Whether the column carries a UNIQUE constraint. Defaults to `false`.
    pub unique: bool,
}

impl ColumnDirective {
    /// A directive with every option at its default.
    pub const fn new() -> Self {
        Self {
            name: None,
            sql_type: None,
            nullable: None,
            unique: false,
        }
    }

    /// Set the column name.
    pub const fn name(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    /// Set an explicit SQL type (e.g. `"VARCHAR(64)"`).
    pub const fn sql_type(mut self, sql_type: &'static str) -> Self {
        self.sql_type = Some(sql_type);
        self
    }

    /// Set nullability, overriding the field's type.
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = Some(value);
        self
    }

    /// Set uniqueness.
    pub const fn unique(mut self, value: bool) -> Self {
        self.unique = value;
        self
    }
}

impl Default for ColumnDirective {
    fn default() -> Self {
        Self::new()
    }
}

/// Join-column directive: marks the owning side of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JoinColumnDirective {
    /// Foreign-key column name. Defaults to `<referenced type>_id`.
    pub name: Option<&'static str>,
    /// Referenced column on the target table. Defaults to its identity column.
    pub referenced_column: Option<&'static str>,
}

impl JoinColumnDirective {
    pub const fn new() -> Self {
        Self {
            name: None,
            referenced_column: None,
        }
    }

    pub const fn name(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    pub const fn referenced_column(mut self, column: &'static str) -> Self {
        self.referenced_column = Some(column);
        self
    }
}

/// Everything an entity declares about one field.
#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    /// Rust field name.
    pub name: &'static str,
    /// Declared value kind; `ValueKind::Entity` for relationship fields.
    pub kind: ValueKind,
    /// Whether the field's type can hold an absent value.
    pub nullable: bool,
    /// Explicit column directive, if any.
    pub column: Option<ColumnDirective>,
    /// Whether this field is the identity.
    pub id: bool,
    /// Position in a composite key, if the field participates in one.
    pub composite_key: Option<u16>,
    /// Join-column directive (owning side).
    pub join_column: Option<JoinColumnDirective>,
    /// Relationship directive (kind, `mapped_by`, cascade set).
    pub relation: Option<RelationDirective>,
    /// Mapping of the associated entity type, for relationship fields.
    pub target: Option<fn() -> &'static EntityMapping>,
}

impl FieldMapping {
    /// Create a plain column field.
    pub const fn new(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            kind,
            nullable: true,
            column: None,
            id: false,
            composite_key: None,
            join_column: None,
            relation: None,
            target: None,
        }
    }

    /// Create a relationship field pointing at `target`.
    pub const fn entity(name: &'static str, target: fn() -> &'static EntityMapping) -> Self {
        let mut field = Self::new(name, ValueKind::Entity);
        field.target = Some(target);
        field
    }

    /// Record whether the field's type can hold an absent value.
    pub const fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Attach a column directive.
    pub const fn column(mut self, directive: ColumnDirective) -> Self {
        self.column = Some(directive);
        self
    }

    /// Mark as the identity field.
    pub const fn id(mut self) -> Self {
        self.id = true;
        self
    }

    /// Mark as a composite-key participant at `order`.
    pub const fn composite_key(mut self, order: u16) -> Self {
        self.composite_key = Some(order);
        self
    }

    /// Mark as the owning side of a relationship.
    pub const fn join_column(mut self, directive: JoinColumnDirective) -> Self {
        self.join_column = Some(directive);
        self
    }

    /// Attach a relationship directive.
    pub const fn relation(mut self, directive: RelationDirective) -> Self {
        self.relation = Some(directive);
        self
    }

    /// Whether the field refers to another entity.
    pub const fn is_relationship(&self) -> bool {
        self.target.is_some() || self.join_column.is_some() || self.relation.is_some()
    }

    /// Whether the field owns a foreign-key column.
    pub const fn is_owning(&self) -> bool {
        self.join_column.is_some()
    }
}
