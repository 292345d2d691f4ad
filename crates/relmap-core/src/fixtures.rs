//! Hand-written entities for unit tests.

use std::any::{Any, TypeId};

use chrono::NaiveDate;

use crate::association::{Association, Reference};
use crate::entity::{DynEntity, Entity, EntityMapping, TableDirective, instantiate};
use crate::error::{Error, Result};
use crate::field::{ColumnDirective, FieldMapping, JoinColumnDirective};
use crate::relationship::{CascadeType, RelationDirective};
use crate::value::{ColumnValue, Value, ValueKind};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct User {
    pub id: Option<i64>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub age: Option<i32>,
    pub profile: Option<Box<Profile>>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Profile {
    pub id: Option<i64>,
    pub user: Reference<User>,
    pub passport: Option<String>,
}

static USER_MAPPING: EntityMapping = EntityMapping {
    type_name: "User",
    table: TableDirective::new().name("users").schema("public"),
    fields: &[
        FieldMapping::new("id", ValueKind::BigInt).id(),
        FieldMapping::new("firstname", ValueKind::Text),
        FieldMapping::new("lastname", ValueKind::Text),
        FieldMapping::new("birth_date", ValueKind::Date)
            .column(ColumnDirective::new().name("birthdate").nullable(false)),
        FieldMapping::new("age", ValueKind::Int),
        FieldMapping::entity("profile", <Profile as Entity>::mapping).relation(
            RelationDirective::one_to_one()
                .mapped_by("user")
                .cascade(CascadeType::All),
        ),
    ],
    type_id: TypeId::of::<User>,
    instantiate: instantiate::<User>,
};

static PROFILE_MAPPING: EntityMapping = EntityMapping {
    type_name: "Profile",
    table: TableDirective::new(),
    fields: &[
        FieldMapping::new("id", ValueKind::BigInt).id(),
        FieldMapping::entity("user", <User as Entity>::mapping)
            .join_column(JoinColumnDirective::new().name("user_id")),
        FieldMapping::new("passport", ValueKind::Text),
    ],
    type_id: TypeId::of::<Profile>,
    instantiate: instantiate::<Profile>,
};

fn assign<T: ColumnValue>(slot: &mut T, field: &str, value: Value) -> Result<()> {
    *slot = T::from_value(value).map_err(|e| Error::conversion(field, e))?;
    Ok(())
}

fn unknown(entity: &'static str, field: &str) -> Error {
    Error::mapping(entity, format!("no column field `{field}`"))
}

impl DynEntity for User {
    fn entity_mapping(&self) -> &'static EntityMapping {
        &USER_MAPPING
    }

    fn read(&self, field: &str) -> Option<Value> {
        match field {
            "id" => Some(self.id.to_value()),
            "firstname" => Some(self.firstname.to_value()),
            "lastname" => Some(self.lastname.to_value()),
            "birth_date" => Some(self.birth_date.to_value()),
            "age" => Some(self.age.to_value()),
            _ => None,
        }
    }

    fn write(&mut self, field: &str, value: Value) -> Result<()> {
        match field {
            "id" => assign(&mut self.id, field, value),
            "firstname" => assign(&mut self.firstname, field, value),
            "lastname" => assign(&mut self.lastname, field, value),
            "birth_date" => assign(&mut self.birth_date, field, value),
            "age" => assign(&mut self.age, field, value),
            _ => Err(unknown("User", field)),
        }
    }

    fn association(&self, field: &str) -> Option<&dyn Association> {
        match field {
            "profile" => Some(&self.profile),
            _ => None,
        }
    }

    fn association_mut(&mut self, field: &str) -> Option<&mut dyn Association> {
        match field {
            "profile" => Some(&mut self.profile),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl Entity for User {
    fn mapping() -> &'static EntityMapping {
        &USER_MAPPING
    }
}

impl DynEntity for Profile {
    fn entity_mapping(&self) -> &'static EntityMapping {
        &PROFILE_MAPPING
    }

    fn read(&self, field: &str) -> Option<Value> {
        match field {
            "id" => Some(self.id.to_value()),
            "passport" => Some(self.passport.to_value()),
            _ => None,
        }
    }

    fn write(&mut self, field: &str, value: Value) -> Result<()> {
        match field {
            "id" => assign(&mut self.id, field, value),
            "passport" => assign(&mut self.passport, field, value),
            _ => Err(unknown("Profile", field)),
        }
    }

    fn association(&self, field: &str) -> Option<&dyn Association> {
        match field {
            "user" => Some(&self.user),
            _ => None,
        }
    }

    fn association_mut(&mut self, field: &str) -> Option<&mut dyn Association> {
        match field {
            "user" => Some(&mut self.user),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl Entity for Profile {
    fn mapping() -> &'static EntityMapping {
        &PROFILE_MAPPING
    }
}
