#![allow(dead_code)]

use chrono::NaiveDate;
use relmap::prelude::*;
use tempfile::TempDir;

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

/// Cascades on create only.
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

pub fn stepan() -> User {
    User {
        id: None,
        firstname: Some("Stepan".to_string()),
        lastname: Some("Bandera".to_string()),
        birth_date: NaiveDate::from_ymd_opt(1921, 1, 20),
        age: Some(600),
        profile: Some(Box::new(Profile {
            passport: Some("BC254125".to_string()),
            ..Profile::default()
        })),
    }
}

/// A session over a fresh database file. Keep the `TempDir` alive.
pub fn session() -> (TempDir, Session<SqliteConfig>) {
    let dir = tempfile::tempdir().unwrap();
    let config = SqliteConfig::file(dir.path().join("relmap.db"));
    (dir, Session::new(config))
}

/// Create `user` in its own committed transaction.
pub fn persist(session: &mut Session<SqliteConfig>, user: &mut User) {
    session.begin_transaction().unwrap();
    session.create(user).unwrap();
    session.commit().unwrap();
}
