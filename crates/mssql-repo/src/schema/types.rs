//! Schema metadata types: the shape both the model builder (desired) and the
//! catalog reader (live) produce, so the diff engine compares like with like.

use serde::{Deserialize, Serialize};

use crate::error::{RepoError, Result};

/// SQL Server storage type kinds the toolkit can produce and recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    BigInt,
    Binary,
    Bit,
    Char,
    Date,
    DateTime,
    DateTime2,
    DateTimeOffset,
    Decimal,
    Float,
    Int,
    Money,
    NChar,
    NVarChar,
    Real,
    SmallDateTime,
    SmallInt,
    SmallMoney,
    Time,
    Timestamp,
    TinyInt,
    UniqueIdentifier,
    VarBinary,
    VarChar,
}

impl SqlType {
    /// Uppercase DDL keyword for this type.
    pub fn keyword(&self) -> &'static str {
        match self {
            SqlType::BigInt => "BIGINT",
            SqlType::Binary => "BINARY",
            SqlType::Bit => "BIT",
            SqlType::Char => "CHAR",
            SqlType::Date => "DATE",
            SqlType::DateTime => "DATETIME",
            SqlType::DateTime2 => "DATETIME2",
            SqlType::DateTimeOffset => "DATETIMEOFFSET",
            SqlType::Decimal => "DECIMAL",
            SqlType::Float => "FLOAT",
            SqlType::Int => "INT",
            SqlType::Money => "MONEY",
            SqlType::NChar => "NCHAR",
            SqlType::NVarChar => "NVARCHAR",
            SqlType::Real => "REAL",
            SqlType::SmallDateTime => "SMALLDATETIME",
            SqlType::SmallInt => "SMALLINT",
            SqlType::SmallMoney => "SMALLMONEY",
            SqlType::Time => "TIME",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::TinyInt => "TINYINT",
            SqlType::UniqueIdentifier => "UNIQUEIDENTIFIER",
            SqlType::VarBinary => "VARBINARY",
            SqlType::VarChar => "VARCHAR",
        }
    }

    /// Parse a catalog type name (`sys.types.name`, lowercase) back into a kind.
    pub fn from_catalog_name(name: &str) -> Result<Self> {
        let kind = match name.to_ascii_lowercase().as_str() {
            "bigint" => SqlType::BigInt,
            "binary" => SqlType::Binary,
            "bit" => SqlType::Bit,
            "char" => SqlType::Char,
            "date" => SqlType::Date,
            "datetime" => SqlType::DateTime,
            "datetime2" => SqlType::DateTime2,
            "datetimeoffset" => SqlType::DateTimeOffset,
            "decimal" | "numeric" => SqlType::Decimal,
            "float" => SqlType::Float,
            "int" => SqlType::Int,
            "money" => SqlType::Money,
            "nchar" => SqlType::NChar,
            "nvarchar" => SqlType::NVarChar,
            "real" => SqlType::Real,
            "smalldatetime" => SqlType::SmallDateTime,
            "smallint" => SqlType::SmallInt,
            "smallmoney" => SqlType::SmallMoney,
            "time" => SqlType::Time,
            "timestamp" | "rowversion" => SqlType::Timestamp,
            "tinyint" => SqlType::TinyInt,
            "uniqueidentifier" => SqlType::UniqueIdentifier,
            "varbinary" => SqlType::VarBinary,
            "varchar" => SqlType::VarChar,
            other => {
                return Err(RepoError::catalog(format!(
                    "unsupported SQL Server type in catalog: {}",
                    other
                )))
            }
        };
        Ok(kind)
    }

    /// Whether this kind belongs to the date family that `with_time` refines.
    pub fn is_date_family(&self) -> bool {
        matches!(
            self,
            SqlType::Date
                | SqlType::DateTime
                | SqlType::DateTime2
                | SqlType::DateTimeOffset
                | SqlType::SmallDateTime
        )
    }
}

/// One column of a table, desired or live.
///
/// `type_text` is the full DDL type rendering, including any
/// ` IDENTITY(seed,increment)` suffix; the diff engine compares it
/// case-insensitively together with `nullable`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub sql_type: SqlType,
    pub type_text: String,
    pub nullable: bool,
    /// Default expression text; live side carries the catalog's
    /// parenthesized form, desired side the rendered model default.
    pub default_text: Option<String>,
    pub description: Option<String>,
}

/// A group of columns covered by a single UNIQUE constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueGroup {
    /// Group name; empty for the table's anonymous group.
    pub name: String,
    pub columns: Vec<String>,
}

/// One table, desired or live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    pub primary_key: Vec<String>,
    pub uniques: Vec<UniqueGroup>,
    pub description: Option<String>,
}

impl TableSchema {
    /// Find a column by name, case-insensitively.
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}
