//! Derived entities shared by this crate's unit tests.

use chrono::NaiveDate;
use relmap_core::Reference;
use relmap_macros::Entity;

#[derive(Debug, Default, Clone, PartialEq, Entity)]
#[orm(table = "users")]
pub struct User {
    #[orm(id)]
    pub id: Option<i64>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    #[orm(column(name = "birthdate", sql_type = "DATE"))]
    pub birth_date: Option<NaiveDate>,
    pub age: Option<i32>,
    #[orm(one_to_one(mapped_by = "user", cascade(all)))]
    pub profile: Option<Box<Profile>>,
}

#[derive(Debug, Default, Clone, PartialEq, Entity)]
pub struct Profile {
    #[orm(id)]
    pub id: Option<i64>,
    #[orm(join_column(name = "user_id"))]
    pub user: Reference<User>,
    pub passport: Option<String>,
}

/// Inverse side that cascades on create only.
#[derive(Debug, Default, Clone, PartialEq, Entity)]
pub struct Note {
    #[orm(id)]
    pub id: Option<i64>,
    pub body: Option<String>,
    #[orm(one_to_one(cascade(add)))]
    pub attachment: Option<Box<Attachment>>,
}

#[derive(Debug, Default, Clone, PartialEq, Entity)]
pub struct Attachment {
    #[orm(id)]
    pub id: Option<i64>,
    #[orm(join_column)]
    pub note: Reference<Note>,
    pub size: Option<i64>,
}
