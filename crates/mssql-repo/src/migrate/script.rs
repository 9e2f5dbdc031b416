//! Migration script rendering and file management.
//!
//! Operations are serialized into a single transactional T-SQL script:
//! a TRY block opens the transaction, every operation is written with a
//! comment header, and the CATCH block rolls back and re-raises. Scripts are
//! written as `<yyyyMMddHHmmss>_<title>.sql`, so lexicographic file order is
//! chronological order.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::core::identifier::{default_constraint_key, primary_key_key, quote_ident, qualify, unique_key};
use crate::error::Result;
use crate::migrate::diff::{DescriptionScope, DiffOp, TablePlan};
use crate::schema::types::{ColumnSchema, TableSchema};

const DEFAULT_TITLE: &str = "migration";

fn escape_literal(text: &str) -> String {
    text.replace('\'', "''")
}

/// `[name] TYPE NULL|NOT NULL` with an inline default constraint when the
/// column carries one. Used for CREATE TABLE bodies and ADD column clauses.
fn column_clause(schema: &str, table: &str, column: &ColumnSchema, with_default: bool) -> String {
    let mut clause = format!(
        "{} {} {}",
        quote_ident(&column.name),
        column.type_text,
        if column.nullable { "NULL" } else { "NOT NULL" }
    );
    if with_default {
        if let Some(default_text) = &column.default_text {
            clause.push_str(&format!(
                " CONSTRAINT {} DEFAULT {}",
                default_constraint_key(schema, table, &column.name),
                default_text
            ));
        }
    }
    clause
}

fn create_table_sql(table: &TableSchema) -> String {
    let mut lines: Vec<String> = table
        .columns
        .iter()
        .map(|c| column_clause(&table.schema, &table.name, c, true))
        .collect();

    let pk_columns = table
        .primary_key
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    lines.push(format!(
        "CONSTRAINT {} PRIMARY KEY CLUSTERED ({})",
        primary_key_key(&table.schema, &table.name),
        pk_columns
    ));

    for group in &table.uniques {
        let members = group
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!(
            "CONSTRAINT {} UNIQUE NONCLUSTERED ({})",
            unique_key(&table.schema, &table.name, &group.name),
            members
        ));
    }

    format!(
        "CREATE TABLE {} (\n\t{}\n);",
        qualify(&table.schema, &table.name),
        lines.join(",\n\t")
    )
}

fn description_sql(scope: &DescriptionScope, text: &str) -> String {
    let value = escape_literal(text);
    match scope {
        DescriptionScope::Schema { schema } => format!(
            "EXEC sys.sp_addextendedproperty @name=N'Description', @value=N'{}', \
             @level0type=N'SCHEMA',@level0name=N'{}';",
            value, schema
        ),
        DescriptionScope::Table { schema, table } => format!(
            "EXEC sys.sp_addextendedproperty @name=N'Description', @value=N'{}', \
             @level0type=N'SCHEMA',@level0name=N'{}', @level1type=N'TABLE',@level1name=N'{}';",
            value, schema, table
        ),
        DescriptionScope::Column {
            schema,
            table,
            column,
        } => format!(
            "EXEC sys.sp_addextendedproperty @name=N'Description', @value=N'{}', \
             @level0type=N'SCHEMA',@level0name=N'{}', @level1type=N'TABLE',@level1name=N'{}', \
             @level2type=N'COLUMN',@level2name=N'{}';",
            value, schema, table, column
        ),
    }
}

/// Render one operation as (comment, statement).
pub fn render_op(op: &DiffOp) -> (String, String) {
    match op {
        DiffOp::CreateSchema { schema } => (
            "Create Schema command".to_string(),
            format!("CREATE SCHEMA {};", quote_ident(schema)),
        ),
        DiffOp::CreateTable { table } => (
            format!("Create {} Table command", qualify(&table.schema, &table.name)),
            create_table_sql(table),
        ),
        DiffOp::AddColumn {
            schema,
            table,
            column,
        } => (
            "Update Column command".to_string(),
            format!(
                "ALTER TABLE {} ADD {};",
                qualify(schema, table),
                column_clause(schema, table, column, true)
            ),
        ),
        DiffOp::AlterColumnType {
            schema,
            table,
            column,
        } => (
            "Update Column command".to_string(),
            format!(
                "ALTER TABLE {} ALTER COLUMN {};",
                qualify(schema, table),
                column_clause(schema, table, column, false)
            ),
        ),
        DiffOp::DropDefaultConstraint {
            schema,
            table,
            column,
        } => (
            "Drop Constraints command".to_string(),
            format!(
                "ALTER TABLE {} DROP CONSTRAINT {};",
                qualify(schema, table),
                default_constraint_key(schema, table, column)
            ),
        ),
        DiffOp::AddDefaultConstraint {
            schema,
            table,
            column,
            default_text,
        } => (
            "Update Constraint command".to_string(),
            format!(
                "ALTER TABLE {} ADD CONSTRAINT {} DEFAULT ({}) FOR {};",
                qualify(schema, table),
                default_constraint_key(schema, table, column),
                default_text,
                quote_ident(column)
            ),
        ),
        DiffOp::SetDescription { scope, text } => (
            "Set description command".to_string(),
            description_sql(scope, text),
        ),
    }
}

/// Render the full transactional script for a set of table plans.
pub fn render_script(plans: Vec<TablePlan>) -> String {
    let mut out = String::new();
    out.push_str("BEGIN TRY\n");
    out.push_str("\nBEGIN TRAN;\n");

    out.push_str("\nSET ANSI_NULLS ON;\n");
    out.push_str("\nSET QUOTED_IDENTIFIER ON;\n");

    for plan in plans {
        for op in plan.into_ops() {
            let (comment, sql) = render_op(&op);
            out.push_str(&format!("\n-- {}\n{}\n", comment, sql));
        }
    }

    out.push_str("\nCOMMIT TRAN;\n");
    out.push_str("\nEND TRY\n");
    out.push_str("\nBEGIN CATCH\n");
    out.push_str("\nIF @@TRANCOUNT > 0\nBEGIN\n\tROLLBACK TRAN;\nEND;\n");
    out.push_str("\nTHROW\n");
    out.push_str("\nEND CATCH\n");
    out
}

/// Write a rendered script into the migrations directory, creating it if
/// needed. Returns the path of the new file.
pub fn write_script(dir: &Path, title: Option<&str>, content: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let stamp = Local::now().format("%Y%m%d%H%M%S");
    let file_name = format!("{}_{}.sql", stamp, title.unwrap_or(DEFAULT_TITLE));
    let path = dir.join(file_name);
    fs::write(&path, content)?;
    info!(file = %path.display(), "migration script created");
    Ok(path)
}

/// The most recent migration script: lexicographically last `.sql` file.
/// Other files in the directory (editor backups, notes) are ignored.
pub fn latest_script(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.exists() {
        return Ok(None);
    }
    let mut names: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case("sql"))
        })
        .collect();
    names.sort();
    Ok(names.pop())
}
