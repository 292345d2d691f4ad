//! Entity traits and the type-level mapping table.
//!
//! [`Entity`] is implemented by `#[derive(Entity)]`. It is split from the
//! object-safe [`DynEntity`] so that the engine can walk an object graph of
//! mixed entity types (a `User` holding a `Profile` holding a key back to the
//! `User`) through `&mut dyn DynEntity` without knowing the concrete types.

use std::any::{Any, TypeId};

use crate::association::Association;
use crate::error::Result;
use crate::field::FieldMapping;
use crate::value::Value;

/// Table directive on an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableDirective {
    /// Table name. Defaults to the lowercase type name.
    pub name: Option<&'static str>,
    /// Schema the table lives in.
    pub schema: Option<&'static str>,
}

impl TableDirective {
    pub const fn new() -> Self {
        Self {
            name: None,
            schema: None,
        }
    }

    pub const fn name(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    pub const fn schema(mut self, schema: &'static str) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// The static mapping table of one entity type.
#[derive(Debug)]
pub struct EntityMapping {
    /// Simple type name, e.g. `"User"`.
    pub type_name: &'static str,
    pub table: TableDirective,
    /// Fields in declaration order.
    pub fields: &'static [FieldMapping],
    /// Identity of the Rust type.
    pub type_id: fn() -> TypeId,
    /// Construct a fresh, default instance.
    pub instantiate: fn() -> Box<dyn DynEntity>,
}

impl EntityMapping {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&'static FieldMapping> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Object-safe view of an entity instance.
///
/// Column fields are accessed as [`Value`]s by field name; relationship fields
/// through [`Association`].
pub trait DynEntity: Any + Send {
    /// The static mapping of the concrete type.
    fn entity_mapping(&self) -> &'static EntityMapping;

    /// Current value of a column field. `None` for unknown or relationship fields.
    fn read(&self, field: &str) -> Option<Value>;

    /// Assign a column field from a row value.
    fn write(&mut self, field: &str, value: Value) -> Result<()>;

    /// Shared access to a relationship field.
    fn association(&self, field: &str) -> Option<&dyn Association>;

    /// Mutable access to a relationship field.
    fn association_mut(&mut self, field: &str) -> Option<&mut dyn Association>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// A domain type mapped to a table.
pub trait Entity: DynEntity + Default {
    /// The static mapping table of this type.
    fn mapping() -> &'static EntityMapping;
}

/// Default-construct `E` behind a `DynEntity` box.
pub fn instantiate<E: Entity>() -> Box<dyn DynEntity> {
    Box::new(E::default())
}

impl dyn DynEntity {
    /// Whether the concrete type is `E`.
    pub fn is<E: Entity>(&self) -> bool {
        self.as_any().type_id() == TypeId::of::<E>()
    }

    /// Downcast to a concrete entity type.
    pub fn downcast_ref<E: Entity>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }
}
