//! Live-schema access: the `CatalogReader` seam and the reconstruction of
//! `TableSchema` values from SQL Server catalog metadata.
//!
//! The driver queries `sys.objects`/`sys.columns`/`sys.indexes` with nested
//! `FOR JSON PATH` projections; this module deserializes those payloads and
//! re-renders each live column's type text in the same dialect form the
//! model builder produces, so the diff engine compares like with like.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{RepoError, Result};
use crate::schema::types::{ColumnSchema, SqlType, TableSchema, UniqueGroup};

/// Read access to the live database catalog.
#[async_trait]
pub trait CatalogReader: Send {
    /// All schema names known to the database.
    async fn schema_names(&mut self) -> Result<Vec<String>>;

    /// All user tables, reconstructed as `TableSchema` values.
    async fn tables(&mut self) -> Result<Vec<TableSchema>>;
}

/// One column row of the nested `FOR JSON PATH` column projection.
#[derive(Debug, Deserialize)]
pub struct CatalogColumnRow {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(rename = "def")]
    pub default_text: Option<String>,
    #[serde(default)]
    pub is_nullable: bool,
    pub max_length: i32,
    pub precision: u32,
    pub scale: u32,
    #[serde(default)]
    pub is_identity: bool,
    pub seed_value: Option<serde_json::Value>,
    pub increment_value: Option<serde_json::Value>,
    pub description: Option<String>,
}

/// One row of the nested unique-index projection.
#[derive(Debug, Deserialize)]
pub struct CatalogIndexRow {
    pub key: String,
    #[serde(default)]
    pub is_primary_key: bool,
    pub column: String,
}

/// `sys.identity_columns` exposes seed and increment as `sql_variant`, which
/// FOR JSON may serialize as a number or a string.
fn variant_i64(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Re-render a live column's dialect type text from its catalog fields.
///
/// `sys.columns.max_length` is in bytes, so unicode character lengths are
/// halved; `-1` means a (MAX) type. The IDENTITY suffix is appended so the
/// text matches what the model builder renders for identity columns.
pub fn render_live_type_text(row: &CatalogColumnRow) -> Result<String> {
    let kind = SqlType::from_catalog_name(&row.type_name)?;
    let mut text = match kind {
        SqlType::Char | SqlType::VarChar | SqlType::Binary | SqlType::VarBinary => {
            if row.max_length < 0 {
                format!("{}(MAX)", kind.keyword())
            } else {
                format!("{}({})", kind.keyword(), row.max_length)
            }
        }
        SqlType::NChar | SqlType::NVarChar => {
            if row.max_length < 0 {
                format!("{}(MAX)", kind.keyword())
            } else {
                format!("{}({})", kind.keyword(), row.max_length / 2)
            }
        }
        SqlType::Decimal => format!("DECIMAL({},{})", row.precision, row.scale),
        SqlType::DateTime2 | SqlType::Time | SqlType::DateTimeOffset => {
            format!("{}({})", kind.keyword(), row.scale)
        }
        _ => kind.keyword().to_string(),
    };

    if row.is_identity {
        let seed = row.seed_value.as_ref().and_then(variant_i64).unwrap_or(1);
        let increment = row.increment_value.as_ref().and_then(variant_i64).unwrap_or(1);
        text.push_str(&format!(" IDENTITY({},{})", seed, increment));
    }

    Ok(text)
}

/// Rebuild one live table from the outer query row and its JSON projections.
///
/// The column projection is mandatory (a user table always has columns); the
/// index projection is absent when the table carries no unique indexes. Rows
/// flagged `is_primary_key` form the primary key in index order; the
/// remaining unique-index rows are grouped by index name.
pub fn table_from_catalog(
    schema: String,
    name: String,
    description: Option<String>,
    col_json: Option<&str>,
    ix_json: Option<&str>,
) -> Result<TableSchema> {
    let col_rows: Vec<CatalogColumnRow> = match col_json {
        Some(json) => serde_json::from_str(json)?,
        None => {
            return Err(RepoError::catalog(format!(
                "table [{}].[{}] returned no column metadata",
                schema, name
            )))
        }
    };

    let mut columns = Vec::with_capacity(col_rows.len());
    for row in &col_rows {
        columns.push(ColumnSchema {
            name: row.name.clone(),
            sql_type: SqlType::from_catalog_name(&row.type_name)?,
            type_text: render_live_type_text(row)?,
            nullable: row.is_nullable,
            default_text: row.default_text.clone(),
            description: row.description.clone(),
        });
    }

    let ix_rows: Vec<CatalogIndexRow> = match ix_json {
        Some(json) => serde_json::from_str(json)?,
        None => Vec::new(),
    };

    let mut primary_key = Vec::new();
    let mut uniques: Vec<UniqueGroup> = Vec::new();
    for row in &ix_rows {
        if row.is_primary_key {
            primary_key.push(row.column.clone());
        } else {
            match uniques.iter_mut().find(|u| u.name == row.key) {
                Some(existing) => existing.columns.push(row.column.clone()),
                None => uniques.push(UniqueGroup {
                    name: row.key.clone(),
                    columns: vec![row.column.clone()],
                }),
            }
        }
    }

    Ok(TableSchema {
        schema,
        name,
        columns,
        primary_key,
        uniques,
        description,
    })
}
