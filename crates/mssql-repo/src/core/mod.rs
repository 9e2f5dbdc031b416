//! Core abstractions shared by the unit of work and the migration engine.
//!
//! - [`identifier`]: identifier validation, quoting, and constraint naming
//! - [`value`]: bindable SQL values and column default values
//! - [`traits`]: the [`Connection`] seam and the [`Entity`] contract
//!
//! Everything here is database-shape-agnostic: drivers implement the traits,
//! the schema and migration modules consume the value and identifier helpers.

pub mod identifier;
pub mod traits;
pub mod value;

pub use traits::{Connection, Entity};
pub use value::{DefaultValue, SqlValue};
