//! Statement building and row marshaling for relmap.
//!
//! - [`statement`]: rendered statements and ordered column/value lists
//! - [`select`]: the join tree behind `find_by_id`/`find_all`
//! - [`builder`]: INSERT, partial UPDATE and DELETE
//! - [`marshal`]: binding instances to parameters and filling instances from rows
//!
//! Everything here is pure: nothing touches a connection.

pub mod builder;
pub mod marshal;
pub mod select;
pub mod statement;

#[cfg(test)]
mod test_entities;

pub use builder::{DeleteBuilder, InsertBuilder, UpdateBuilder};
pub use marshal::{fill, fill_entity, insert_values, referenced_value, update_values};
pub use select::{JoinSide, PlanNode, SelectPlan, column_alias};
pub use statement::{ColumnValues, Statement};
