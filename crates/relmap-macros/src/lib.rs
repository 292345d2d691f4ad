//! Procedural macros for relmap.
//!
//! `#[derive(Entity)]` reads `#[orm(...)]` attributes and emits the static
//! mapping table plus the `DynEntity`/`Entity` implementations the engine uses
//! to read, write and link fields.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod entity_derive;

/// Derive the `Entity` trait.
///
/// # Type attributes
///
/// - `#[orm(table = "users")]`: table name (default: lowercase struct name)
/// - `#[orm(schema = "public")]`: schema the table lives in
///
/// # Field attributes
///
/// - `#[orm(id)]`: auto-incrementing identity
/// - `#[orm(column(name = "...", sql_type = "...", nullable = false, unique))]`
/// - `#[orm(composite_key)]` / `#[orm(composite_key = 2)]`
/// - `#[orm(join_column(name = "user_id", referenced_column = "id"))]`: owning side,
///   on a `Reference<T>` field
/// - `#[orm(one_to_one(mapped_by = "user", cascade(all)))]`: inverse side, on an
///   `Option<Box<T>>` field
/// - `#[orm(one_to_many)]`, `#[orm(many_to_one)]`, `#[orm(many_to_many)]`
/// - `#[orm(skip)]`: not mapped
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Default, Entity)]
/// #[orm(table = "users")]
/// struct User {
///     #[orm(id)]
///     id: Option<i64>,
///     firstname: Option<String>,
///     #[orm(one_to_one(mapped_by = "user", cascade(all)))]
///     profile: Option<Box<Profile>>,
/// }
///
/// #[derive(Debug, Default, Entity)]
/// struct Profile {
///     #[orm(id)]
///     id: Option<i64>,
///     #[orm(join_column(name = "user_id"))]
///     user: Reference<User>,
///     passport: Option<String>,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(orm))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match entity_derive::parse_entity(&input) {
        Ok(def) => entity_derive::generate_entity_impl(&def).into(),
        Err(err) => err.to_compile_error().into(),
    }
}
