//! Desired-schema modeling: storage types, the column type mapper, and the
//! declarative table models that produce `TableSchema` values for diffing.

pub mod column;
pub mod model;
pub mod types;

pub use column::ColumnBuilder;
pub use model::{ColumnModel, LogicalType, PropertyType, TableModel};
pub use types::{ColumnSchema, SqlType, TableSchema, UniqueGroup};
