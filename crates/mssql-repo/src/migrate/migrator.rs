//! Migration orchestration: database creation, script generation from the
//! model set, and script application.

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{info, warn};

use crate::catalog::CatalogReader;
use crate::config::RepoConfig;
use crate::core::identifier::validate_identifier;
use crate::core::traits::Connection;
use crate::core::value::SqlValue;
use crate::drivers::mssql::{MssqlCatalog, MssqlConnection};
use crate::error::{RepoError, Result};
use crate::migrate::diff::{plan_table, TablePlan};
use crate::migrate::script;
use crate::schema::model::TableModel;
use crate::schema::types::TableSchema;

/// Command-line arguments of the migration workflow.
#[derive(Debug, Default, Parser)]
#[command(name = "migrate", about = "Generate and apply schema migration scripts")]
pub struct MigrateArgs {
    /// Title used in the generated script's file name.
    #[arg(short, long)]
    pub title: Option<String>,

    /// Migrations directory, overriding the configured one.
    #[arg(short, long)]
    pub path: Option<PathBuf>,

    /// Recreate the database even if it already exists.
    #[arg(long)]
    pub remove_old_db: bool,

    /// Generate the script but do not apply it.
    #[arg(long)]
    pub generate_only: bool,

    /// Apply the latest existing script without generating a new one.
    #[arg(long)]
    pub update_database: bool,
}

/// Plan the whole model set against the live catalog. Ignored models are
/// skipped; every other model is built and diffed.
pub fn plan_database(
    models: &[TableModel],
    schemas: &[String],
    live: &[TableSchema],
) -> Result<Vec<TablePlan>> {
    let mut plans = Vec::new();
    for model in models {
        if model.is_ignored() {
            continue;
        }
        let desired = model.build()?;
        let live_table = live.iter().find(|t| {
            t.schema.eq_ignore_ascii_case(&desired.schema)
                && t.name.eq_ignore_ascii_case(&desired.name)
        });
        plans.push(plan_table(&desired, live_table, schemas));
    }
    Ok(plans)
}

/// Drives the migration workflow for one configured database.
pub struct Migrator {
    config: RepoConfig,
    models: Vec<TableModel>,
}

impl Migrator {
    pub fn new(config: RepoConfig) -> Self {
        Self {
            config,
            models: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: TableModel) -> Self {
        self.models.push(model);
        self
    }

    pub fn with_models(mut self, models: impl IntoIterator<Item = TableModel>) -> Self {
        self.models.extend(models);
        self
    }

    /// Create the configured database if missing; with `remove_old` an
    /// existing database is dropped and recreated.
    pub async fn create_database(&self, remove_old: bool) -> Result<()> {
        let database = &self.config.database;
        validate_identifier(database)?;

        let mut server =
            MssqlConnection::connect(&self.config.server_connection_string()).await?;
        let rows = server
            .query(
                "SELECT 1 FROM sys.databases WHERE name = @P1;",
                &[SqlValue::String(database.clone())],
            )
            .await?;
        let exists = !rows.is_empty();

        if exists && remove_old {
            warn!(%database, "dropping existing database");
            server
                .batch(&format!("DROP DATABASE [{}];", database))
                .await?;
        }

        if !exists || remove_old {
            server
                .batch(&format!("CREATE DATABASE [{}];", database))
                .await?;
            info!(%database, "database created");
        }
        Ok(())
    }

    /// Diff the model set against the live catalog and write a new script.
    pub async fn generate_migration(
        &self,
        title: Option<&str>,
        path: Option<&Path>,
    ) -> Result<PathBuf> {
        if let Some(title) = title {
            validate_title(title)?;
        }

        let mut catalog = MssqlCatalog::connect(&self.config.connection_string()).await?;
        let schemas = catalog.schema_names().await?;
        let live = catalog.tables().await?;

        let plans = plan_database(&self.models, &schemas, &live)?;
        let pending = plans.iter().filter(|p| !p.is_empty()).count();
        info!(tables = self.models.len(), pending, "migration planned");

        let content = script::render_script(plans);
        script::write_script(&self.migrations_dir(path), title, &content)
    }

    /// Execute the most recent script as a single batch.
    pub async fn apply_migration(&self, path: Option<&Path>) -> Result<()> {
        let latest = script::latest_script(&self.migrations_dir(path))?
            .ok_or_else(|| RepoError::Migration("migration file not found".to_string()))?;
        let content = std::fs::read_to_string(&latest)?;

        let mut connection = MssqlConnection::connect(&self.config.connection_string()).await?;
        connection.batch(&content).await?;
        info!(file = %latest.display(), "migration applied");
        Ok(())
    }

    /// The full workflow: ensure the database exists, then generate and/or
    /// apply according to the flags.
    pub async fn run(&self, args: &MigrateArgs) -> Result<()> {
        self.create_database(args.remove_old_db).await?;

        if !args.update_database {
            self.generate_migration(args.title.as_deref(), args.path.as_deref())
                .await?;
        }

        if !args.generate_only {
            self.apply_migration(args.path.as_deref()).await?;
        }
        Ok(())
    }

    fn migrations_dir(&self, path: Option<&Path>) -> PathBuf {
        path.map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(&self.config.migrations_dir))
    }
}

fn validate_title(title: &str) -> Result<()> {
    let mut chars = title.chars();
    let valid = match chars.next() {
        Some(first) => {
            first.is_ascii_alphabetic()
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(RepoError::Migration(format!(
            "invalid migration title {:?}: expected a letter followed by letters, digits or underscores",
            title
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::diff::DiffOp;
    use crate::schema::model::{ColumnModel, PropertyType};

    fn person_model() -> TableModel {
        TableModel::new("PersonModel")
            .column(ColumnModel::new("Name", PropertyType::Text).size(100).primary_key())
            .column(ColumnModel::new("Age", PropertyType::U8))
    }

    #[test]
    fn test_plan_database_creates_missing_table() {
        let plans =
            plan_database(&[person_model()], &["dbo".to_string()], &[]).unwrap();
        assert_eq!(plans.len(), 1);
        let ops = plans.into_iter().next().unwrap().into_ops();
        assert!(matches!(&ops[0], DiffOp::CreateTable { table } if table.name == "Person"));
    }

    #[test]
    fn test_plan_database_skips_ignored_models() {
        let plans = plan_database(
            &[person_model().ignore()],
            &["dbo".to_string()],
            &[],
        )
        .unwrap();
        assert!(plans.is_empty());
    }

    #[test]
    fn test_plan_database_matches_live_case_insensitively() {
        let live = person_model().build().map(|mut t| {
            t.name = "PERSON".to_string();
            t
        })
        .unwrap();
        let plans =
            plan_database(&[person_model()], &["dbo".to_string()], &[live]).unwrap();
        assert!(plans[0].is_empty());
    }

    #[test]
    fn test_title_validation() {
        assert!(validate_title("add_person").is_ok());
        assert!(validate_title("AddPerson2").is_ok());
        assert!(validate_title("2fast").is_err());
        assert!(validate_title("bad title").is_err());
        assert!(validate_title("").is_err());
    }

    #[test]
    fn test_args_parse_flags() {
        let args = MigrateArgs::parse_from([
            "migrate",
            "--title",
            "add_person",
            "--remove-old-db",
            "--generate-only",
        ]);
        assert_eq!(args.title.as_deref(), Some("add_person"));
        assert!(args.remove_old_db);
        assert!(args.generate_only);
        assert!(!args.update_database);
        assert!(args.path.is_none());
    }
}
