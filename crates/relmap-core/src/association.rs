//! Object-graph links between entities.
//!
//! The owning side of a relationship is a [`Reference<T>`]: it always knows the
//! referenced identity and may additionally hold the loaded object. The inverse
//! side is an `Option<Box<T>>`: it holds the object or nothing, and has no
//! column of its own.

use std::fmt;

use crate::entity::{DynEntity, Entity, EntityMapping};
use crate::error::{Error, Result};

/// Owning-side link to another entity.
#[derive(Clone, PartialEq)]
pub enum Reference<T> {
    /// No target.
    Unset,
    /// Identity of a target that was not loaded.
    Key(i64),
    /// The loaded target.
    Loaded(Box<T>),
}

impl<T> Default for Reference<T> {
    fn default() -> Self {
        Reference::Unset
    }
}

impl<T: fmt::Debug> fmt::Debug for Reference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Unset => f.write_str("Unset"),
            Reference::Key(key) => f.debug_tuple("Key").field(key).finish(),
            Reference::Loaded(target) => f.debug_tuple("Loaded").field(target).finish(),
        }
    }
}

impl<T> Reference<T> {
    /// Wrap a loaded target.
    pub fn loaded(target: T) -> Self {
        Reference::Loaded(Box::new(target))
    }

    /// The loaded target, if any.
    pub fn get(&self) -> Option<&T> {
        match self {
            Reference::Loaded(target) => Some(target),
            _ => None,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Reference::Unset)
    }
}

/// Type-erased access to a relationship field.
pub trait Association: Send {
    /// Mapping of the associated entity type.
    fn target_mapping(&self) -> &'static EntityMapping;

    /// The associated object, if one is held.
    fn target(&self) -> Option<&dyn DynEntity>;

    fn target_mut(&mut self) -> Option<&mut dyn DynEntity>;

    /// Identity stored without an object (`Reference::Key`).
    fn stored_key(&self) -> Option<i64>;

    /// Store a bare identity. Returns `false` if this side cannot hold one.
    fn link_key(&mut self, key: i64) -> bool;

    /// Hold `entity`, which must be of the associated type.
    fn attach(&mut self, entity: Box<dyn DynEntity>) -> Result<()>;

    /// Drop whatever is held.
    fn detach(&mut self);
}

fn downcast_target<T: Entity>(entity: Box<dyn DynEntity>) -> Result<Box<T>> {
    let found = entity.entity_mapping().type_name;
    entity.into_any().downcast::<T>().map_err(|_| {
        Error::mapping(
            T::mapping().type_name,
            format!("cannot attach a `{found}` to this association"),
        )
    })
}

impl<T: Entity> Association for Reference<T> {
    fn target_mapping(&self) -> &'static EntityMapping {
        T::mapping()
    }

    fn target(&self) -> Option<&dyn DynEntity> {
        match self {
            Reference::Loaded(target) => Some(target.as_ref()),
            _ => None,
        }
    }

    fn target_mut(&mut self) -> Option<&mut dyn DynEntity> {
        match self {
            Reference::Loaded(target) => Some(target.as_mut()),
            _ => None,
        }
    }

    fn stored_key(&self) -> Option<i64> {
        match self {
            Reference::Key(key) => Some(*key),
            _ => None,
        }
    }

    fn link_key(&mut self, key: i64) -> bool {
        *self = Reference::Key(key);
        true
    }

    fn attach(&mut self, entity: Box<dyn DynEntity>) -> Result<()> {
        *self = Reference::Loaded(downcast_target::<T>(entity)?);
        Ok(())
    }

    fn detach(&mut self) {
        *self = Reference::Unset;
    }
}

impl<T: Entity> Association for Option<Box<T>> {
    fn target_mapping(&self) -> &'static EntityMapping {
        T::mapping()
    }

    fn target(&self) -> Option<&dyn DynEntity> {
        self.as_deref().map(|t| t as &dyn DynEntity)
    }

    fn target_mut(&mut self) -> Option<&mut dyn DynEntity> {
        self.as_deref_mut().map(|t| t as &mut dyn DynEntity)
    }

    fn stored_key(&self) -> Option<i64> {
        None
    }

    fn link_key(&mut self, _key: i64) -> bool {
        false
    }

    fn attach(&mut self, entity: Box<dyn DynEntity>) -> Result<()> {
        *self = Some(downcast_target::<T>(entity)?);
        Ok(())
    }

    fn detach(&mut self) {
        *self = None;
    }
}
