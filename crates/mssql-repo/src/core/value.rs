//! SQL value types: bindable parameter values and column default values.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A value bound to a SQL parameter or decoded from a result row.
///
/// Covers the storage types the schema model can produce. Entities hand
/// these to the unit of work for INSERT/UPDATE parameter binding, and the
/// driver decodes result rows back into them.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    U8(u8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    String(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<Utc>),
}

impl SqlValue {
    /// Whether this value is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl From<Option<SqlValue>> for SqlValue {
    fn from(v: Option<SqlValue>) -> Self {
        v.unwrap_or(SqlValue::Null)
    }
}

/// A column default value carried by the schema model.
///
/// Rendering is total: every variant has a DDL representation, so default
/// emission can never fail after the model has been built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DefaultValue {
    /// String literal, rendered as an escaped unicode literal.
    Text(String),
    /// Bit default, rendered as 1 or 0.
    Bool(bool),
    /// Integer default.
    Int(i64),
    /// Floating-point default.
    Float(f64),
    /// Exact-numeric default.
    Decimal(Decimal),
    /// Raw T-SQL expression, e.g. `getdate()` or `newid()`. Emitted verbatim.
    Raw(String),
}

impl DefaultValue {
    /// Render as the expression inside `DEFAULT (...)`.
    pub fn render(&self) -> String {
        match self {
            DefaultValue::Text(s) => format!("N'{}'", s.replace('\'', "''")),
            DefaultValue::Bool(true) => "1".to_string(),
            DefaultValue::Bool(false) => "0".to_string(),
            DefaultValue::Int(v) => v.to_string(),
            DefaultValue::Float(v) => v.to_string(),
            DefaultValue::Decimal(v) => v.to_string(),
            DefaultValue::Raw(expr) => expr.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_value_null() {
        assert!(SqlValue::Null.is_null());
        assert!(!SqlValue::I32(0).is_null());
        assert_eq!(SqlValue::from(None::<SqlValue>), SqlValue::Null);
    }

    #[test]
    fn test_default_render_text_escapes_quotes() {
        let d = DefaultValue::Text("O'Brien".to_string());
        assert_eq!(d.render(), "N'O''Brien'");
    }

    #[test]
    fn test_default_render_scalars() {
        assert_eq!(DefaultValue::Bool(true).render(), "1");
        assert_eq!(DefaultValue::Bool(false).render(), "0");
        assert_eq!(DefaultValue::Int(42).render(), "42");
        assert_eq!(DefaultValue::Raw("getdate()".to_string()).render(), "getdate()");
    }
}
