//! # mssql-repo
//!
//! SQL Server persistence toolkit: a change-tracked unit of work and a
//! model-driven schema migration engine, both built on tiberius.
//!
//! - **Unit of work**: track entities through add/modify/delete, then commit
//!   the queued changes in one SERIALIZABLE transaction.
//! - **Migrations**: declare tables as fluent models, diff them against the
//!   live catalog, and emit timestamped T-SQL scripts wrapped in a
//!   transactional TRY/CATCH frame.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mssql_repo::config::RepoConfig;
//! use mssql_repo::migrate::{MigrateArgs, Migrator};
//! use mssql_repo::schema::model::{ColumnModel, PropertyType, TableModel};
//!
//! #[tokio::main]
//! async fn main() -> mssql_repo::Result<()> {
//!     let config = RepoConfig::load("config.yaml")?;
//!     let person = TableModel::new("PersonModel")
//!         .column(ColumnModel::new("Name", PropertyType::Text).size(100).primary_key())
//!         .column(ColumnModel::new("Age", PropertyType::U8));
//!
//!     let migrator = Migrator::new(config).with_model(person);
//!     migrator.run(&MigrateArgs::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod migrate;
pub mod schema;
pub mod uow;

// Re-exports for convenient access
pub use catalog::CatalogReader;
pub use config::RepoConfig;
pub use core::{Connection, DefaultValue, Entity, SqlValue};
pub use drivers::{MssqlCatalog, MssqlConnection};
pub use error::{RepoError, Result};
pub use migrate::{MigrateArgs, Migrator};
pub use schema::model::{ColumnModel, PropertyType, TableModel};
pub use uow::{ChangeTracker, RecordState, UnitOfWork};
