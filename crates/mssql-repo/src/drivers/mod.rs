//! Database driver implementations.
//!
//! [`mssql`] carries the tiberius-backed [`crate::core::Connection`]
//! implementation and the live catalog reader.

pub mod mssql;

pub use mssql::{MssqlCatalog, MssqlConnection};
