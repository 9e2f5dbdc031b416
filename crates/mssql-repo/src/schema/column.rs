//! `ColumnBuilder`: maps logical type requests onto SQL Server storage types.
//!
//! Each `is_*` method picks a storage kind from its parameters, validating
//! them against SQL Server's documented ranges; `with_*` methods refine an
//! already chosen kind. Out-of-range parameters fail immediately with
//! `RepoError::ColumnBuilder` naming the column, so a bad model never
//! reaches DDL generation.

use crate::core::value::DefaultValue;
use crate::error::{RepoError, Result};
use crate::schema::types::{ColumnSchema, SqlType};

/// Fluent builder for a single column's storage type.
///
/// Fresh builders default to `NVARCHAR`, length 25, nullable, with no
/// rendered type text; `build` falls back to the kind's bare keyword when
/// no sized rendering was produced.
#[derive(Debug, Clone)]
pub struct ColumnBuilder {
    name: String,
    sql_type: SqlType,
    length: u32,
    precision: u32,
    scale: u32,
    nullable: bool,
    text: Option<String>,
    identity: Option<(i64, i64)>,
    default: Option<DefaultValue>,
    description: Option<String>,
}

impl ColumnBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: SqlType::NVarChar,
            length: 25,
            precision: 0,
            scale: 0,
            nullable: true,
            text: None,
            identity: None,
            default: None,
            description: None,
        }
    }

    fn fail(&self, message: impl Into<String>) -> RepoError {
        RepoError::column(&self.name, message)
    }

    /// Character data. Unicode types carry up to 4000 characters, non-unicode
    /// up to 8000; `variable` selects VARCHAR-style over CHAR-style padding.
    pub fn is_string(mut self, unicode: bool, variable: bool, size: u32) -> Result<Self> {
        if size < 1 {
            return Err(self.fail("string size must be at least 1"));
        }
        let (max, kind) = if unicode {
            (4000, if variable { SqlType::NVarChar } else { SqlType::NChar })
        } else {
            (8000, if variable { SqlType::VarChar } else { SqlType::Char })
        };
        if size > max {
            return Err(self.fail(format!(
                "string size {} exceeds the maximum of {} for {}",
                size,
                max,
                kind.keyword()
            )));
        }
        self.sql_type = kind;
        self.length = size;
        self.text = Some(format!("{}({})", kind.keyword(), size));
        Ok(self)
    }

    /// Binary data, 1 to 8000 bytes.
    pub fn is_binary(mut self, variable: bool, size: u32) -> Result<Self> {
        if !(1..=8000).contains(&size) {
            return Err(self.fail(format!(
                "binary size {} is outside the supported range 1..=8000",
                size
            )));
        }
        let kind = if variable { SqlType::VarBinary } else { SqlType::Binary };
        self.sql_type = kind;
        self.length = size;
        self.text = Some(format!("{}({})", kind.keyword(), size));
        Ok(self)
    }

    /// Exact numeric. Precision 1..=38; the maximum scale shrinks as
    /// precision grows past each 9.6-digit storage step.
    pub fn is_decimal(mut self, precision: u32, scale: u32) -> Result<Self> {
        if !(1..=38).contains(&precision) {
            return Err(self.fail(format!(
                "decimal precision {} is outside the supported range 1..=38",
                precision
            )));
        }
        let max_scale = 5 + 4 * (precision as f64 / 9.6).floor() as u32;
        if scale > max_scale {
            return Err(self.fail(format!(
                "decimal scale {} exceeds the maximum of {} for precision {}",
                scale, max_scale, precision
            )));
        }
        self.sql_type = SqlType::Decimal;
        self.precision = precision;
        self.scale = scale;
        self.text = Some(format!("DECIMAL({},{})", precision, scale));
        Ok(self)
    }

    /// Approximate numeric. Mantissa bits 1..=53; below 25 fits REAL.
    pub fn is_floating_point(mut self, mantissa: u32) -> Result<Self> {
        if !(1..=53).contains(&mantissa) {
            return Err(self.fail(format!(
                "float mantissa {} is outside the supported range 1..=53",
                mantissa
            )));
        }
        self.sql_type = if mantissa < 25 { SqlType::Real } else { SqlType::Float };
        self.text = None;
        Ok(self)
    }

    /// Integer of the given byte width (1, 2, 4 or 8).
    pub fn is_integer(mut self, size: u32) -> Result<Self> {
        if !(1..=8).contains(&size) {
            return Err(self.fail(format!(
                "integer byte width {} is outside the supported range 1..=8",
                size
            )));
        }
        self.sql_type = if size > 4 {
            SqlType::BigInt
        } else if size > 2 {
            SqlType::Int
        } else if size > 1 {
            SqlType::SmallInt
        } else {
            SqlType::TinyInt
        };
        self.text = None;
        Ok(self)
    }

    pub fn is_boolean(mut self) -> Self {
        self.sql_type = SqlType::Bit;
        self.text = None;
        self
    }

    pub fn is_money(mut self, small: bool) -> Self {
        self.sql_type = if small { SqlType::SmallMoney } else { SqlType::Money };
        self.text = None;
        self
    }

    pub fn is_date(mut self) -> Self {
        self.sql_type = SqlType::Date;
        self.text = None;
        self
    }

    /// Identity value: an auto-generated row version, or a plain GUID column.
    pub fn is_uid(mut self, auto_generated: bool) -> Self {
        self.sql_type = if auto_generated {
            SqlType::Timestamp
        } else {
            SqlType::UniqueIdentifier
        };
        self.text = None;
        self
    }

    /// Add a time component. On a date-family base this picks the datetime
    /// type matching the requested fractional-second scale; on any other
    /// base it produces a standalone TIME column.
    pub fn with_time(mut self, fractional_seconds: u32) -> Result<Self> {
        if self.sql_type.is_date_family() {
            if fractional_seconds > 7 {
                return Err(self.fail(format!(
                    "fractional-second scale {} is outside the supported range 0..=7",
                    fractional_seconds
                )));
            }
            if fractional_seconds > 3 {
                self.sql_type = SqlType::DateTime2;
                self.scale = fractional_seconds;
                self.text = Some(format!("DATETIME2({})", fractional_seconds));
            } else if fractional_seconds > 0 {
                self.sql_type = SqlType::DateTime;
                self.scale = fractional_seconds;
                self.text = None;
            } else {
                self.sql_type = SqlType::SmallDateTime;
                self.scale = 0;
                self.text = None;
            }
        } else {
            if !(1..=7).contains(&fractional_seconds) {
                return Err(self.fail(format!(
                    "fractional-second scale {} is outside the supported range 1..=7",
                    fractional_seconds
                )));
            }
            self.sql_type = SqlType::Time;
            self.scale = fractional_seconds;
            self.text = Some(format!("TIME({})", fractional_seconds));
        }
        Ok(self)
    }

    /// Make the column time-zone aware.
    pub fn with_time_zone(mut self) -> Self {
        self.sql_type = SqlType::DateTimeOffset;
        self.text = Some(format!("DATETIMEOFFSET({})", self.scale));
        self
    }

    /// Widen the column to the largest capacity its family supports.
    ///
    /// Integers widen to BIGINT, character and binary types to their (MAX)
    /// forms, DECIMAL to (38,10), REAL to FLOAT, SMALLMONEY to MONEY, the
    /// datetime family to DATETIME2(7) and TIME to TIME(7). Kinds with no
    /// larger form are left untouched.
    pub fn with_max_size(mut self) -> Self {
        match self.sql_type {
            SqlType::TinyInt | SqlType::SmallInt | SqlType::Int | SqlType::BigInt => {
                self.sql_type = SqlType::BigInt;
                self.text = None;
            }
            SqlType::Binary | SqlType::Char | SqlType::VarBinary | SqlType::VarChar => {
                self.length = 8000;
                self.text = Some(format!("{}(MAX)", self.sql_type.keyword()));
            }
            SqlType::NChar | SqlType::NVarChar => {
                self.length = 4000;
                self.text = Some(format!("{}(MAX)", self.sql_type.keyword()));
            }
            SqlType::Decimal => {
                self.precision = 38;
                self.scale = 10;
                self.text = Some("DECIMAL(38,10)".to_string());
            }
            SqlType::Float | SqlType::Real => {
                self.sql_type = SqlType::Float;
                self.text = None;
            }
            SqlType::SmallMoney | SqlType::Money => {
                self.sql_type = SqlType::Money;
                self.text = None;
            }
            SqlType::Date | SqlType::SmallDateTime | SqlType::DateTime | SqlType::DateTime2 => {
                self.sql_type = SqlType::DateTime2;
                self.scale = 7;
                self.text = Some("DATETIME2(7)".to_string());
            }
            SqlType::Time => {
                self.scale = 7;
                self.text = Some("TIME(7)".to_string());
            }
            SqlType::Bit
            | SqlType::DateTimeOffset
            | SqlType::Timestamp
            | SqlType::UniqueIdentifier => {}
        }
        self
    }

    /// Mark the column as an IDENTITY column. The suffix survives later
    /// refinements and is appended when the type text is rendered.
    pub fn with_identity(mut self, seed: i64, increment: i64) -> Self {
        self.identity = Some((seed, increment));
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn default_value(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Render the final column schema.
    pub fn build(self) -> ColumnSchema {
        let mut type_text = self
            .text
            .unwrap_or_else(|| self.sql_type.keyword().to_string());
        if let Some((seed, increment)) = self.identity {
            type_text.push_str(&format!(" IDENTITY({},{})", seed, increment));
        }
        ColumnSchema {
            name: self.name,
            sql_type: self.sql_type,
            type_text,
            nullable: self.nullable,
            default_text: self.default.as_ref().map(DefaultValue::render),
            description: self.description,
        }
    }
}
