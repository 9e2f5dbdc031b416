//! Core traits: the database connection seam and the entity contract.
//!
//! The unit of work and the migrator are written against [`Connection`], not
//! against tiberius directly. Tests substitute scripted mock connections;
//! production code uses the driver in `drivers::mssql`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::value::SqlValue;
use crate::error::Result;

/// A live database connection capable of parameterized statements and
/// explicit transaction control.
#[async_trait]
pub trait Connection: Send {
    /// Execute a parameterized statement, returning the affected row count.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    /// Run a parameterized query, returning decoded rows.
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Vec<SqlValue>>>;

    /// Execute a multi-statement batch with no parameters (DDL scripts).
    async fn batch(&mut self, sql: &str) -> Result<()>;

    /// Begin a transaction at SERIALIZABLE isolation.
    async fn begin_serializable(&mut self) -> Result<()>;

    /// Commit the current transaction.
    async fn commit_tx(&mut self) -> Result<()>;

    /// Roll back the current transaction.
    async fn rollback_tx(&mut self) -> Result<()>;
}

/// The contract an entity type fulfils to be tracked and persisted.
///
/// An entity is identified by a UUID stored in an `Id` column that is never
/// part of the writable column list; the unit of work binds it separately
/// for UPDATE and DELETE predicates. `columns()` and `values()` must agree
/// in order and length, and `from_values` receives row cells in
/// `[Id] + columns()` order.
pub trait Entity: Clone + Send {
    /// The entity's identity.
    fn entity_id(&self) -> Uuid;

    /// Writable column names, excluding `Id`, in binding order.
    fn columns() -> &'static [&'static str];

    /// Current values for `columns()`, in the same order.
    fn values(&self) -> Vec<SqlValue>;

    /// Decode an entity from a result row laid out as `[Id] + columns()`.
    fn from_values(row: &[SqlValue]) -> Result<Self>;
}
