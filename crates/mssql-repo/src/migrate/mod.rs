//! Schema migration engine: catalog diffing, T-SQL script emission, and
//! the orchestration that ties them to a live database.

pub mod diff;
pub mod migrator;
pub mod script;

pub use diff::{plan_table, DescriptionScope, DiffOp, TablePlan};
pub use migrator::{plan_database, MigrateArgs, Migrator};
pub use script::{latest_script, render_script, write_script};
