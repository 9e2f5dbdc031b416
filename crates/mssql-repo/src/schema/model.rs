//! Declarative table models: the desired-schema side of the diff.
//!
//! A `TableModel` describes one entity table: property types plus per-column
//! descriptors (rename, nullability override, primary key, unique groups,
//! defaults, sizing). `build` runs every column through [`ColumnBuilder`]
//! with the per-kind defaults and produces the `TableSchema` the diff engine
//! compares against the live catalog.

use crate::core::identifier::{strip_model_suffix, validate_identifier};
use crate::core::value::DefaultValue;
use crate::error::{RepoError, Result};
use crate::schema::column::ColumnBuilder;
use crate::schema::types::{TableSchema, UniqueGroup};

/// Language-level property types a model column can declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyType {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Decimal,
    Text,
    Char,
    Bytes,
    DateTime,
    DateTimeOffset,
    Duration,
    Uuid,
    /// A type with no storage mapping. Always a build-time error, so an
    /// unsupported property can never silently default to NVARCHAR.
    Other(String),
}

/// Storage kinds the property types map onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalType {
    BigInt,
    Int,
    SmallInt,
    TinyInt,
    Bit,
    Binary,
    Decimal,
    Float,
    Real,
    Numeric20,
    String,
    String1,
    DateTime,
    DateTimeOffset,
    Time,
    Uid,
}

impl LogicalType {
    /// The fixed property-to-storage mapping. Unsigned integers widen by one
    /// step so their full range fits; `u64` lands on DECIMAL(20,0).
    pub fn of(property: &PropertyType) -> Result<Self> {
        let kind = match property {
            PropertyType::Bool => LogicalType::Bit,
            PropertyType::I8 | PropertyType::I16 => LogicalType::SmallInt,
            PropertyType::U8 => LogicalType::TinyInt,
            PropertyType::U16 | PropertyType::I32 => LogicalType::Int,
            PropertyType::U32 | PropertyType::I64 => LogicalType::BigInt,
            PropertyType::U64 => LogicalType::Numeric20,
            PropertyType::F32 => LogicalType::Real,
            PropertyType::F64 => LogicalType::Float,
            PropertyType::Decimal => LogicalType::Decimal,
            PropertyType::Text => LogicalType::String,
            PropertyType::Char => LogicalType::String1,
            PropertyType::Bytes => LogicalType::Binary,
            PropertyType::DateTime => LogicalType::DateTime,
            PropertyType::DateTimeOffset => LogicalType::DateTimeOffset,
            PropertyType::Duration => LogicalType::Time,
            PropertyType::Uuid => LogicalType::Uid,
            PropertyType::Other(name) => {
                return Err(RepoError::Schema(format!(
                    "property type '{}' has no SQL Server storage mapping",
                    name
                )))
            }
        };
        Ok(kind)
    }

    /// Whether an IDENTITY specification is allowed on this kind.
    fn supports_identity(&self) -> bool {
        matches!(
            self,
            LogicalType::SmallInt | LogicalType::Int | LogicalType::BigInt
        )
    }
}

/// One model column: a property plus its descriptors.
#[derive(Debug, Clone)]
pub struct ColumnModel {
    name: String,
    property: PropertyType,
    ignore: bool,
    rename: Option<String>,
    description: Option<String>,
    nullable: Option<bool>,
    primary_key: bool,
    unique_group: Option<String>,
    default: Option<DefaultValue>,
    variable: Option<bool>,
    size: Option<u32>,
    date_only: bool,
    fractional_seconds: Option<u32>,
    precision: Option<u32>,
    scale: Option<u32>,
    unicode: Option<bool>,
    auto_generated: Option<bool>,
    money: bool,
    small_money: bool,
    max_size: bool,
    identity: Option<(i64, i64)>,
}

impl ColumnModel {
    pub fn new(name: impl Into<String>, property: PropertyType) -> Self {
        Self {
            name: name.into(),
            property,
            ignore: false,
            rename: None,
            description: None,
            nullable: None,
            primary_key: false,
            unique_group: None,
            default: None,
            variable: None,
            size: None,
            date_only: false,
            fractional_seconds: None,
            precision: None,
            scale: None,
            unicode: None,
            auto_generated: None,
            money: false,
            small_money: false,
            max_size: false,
            identity: None,
        }
    }

    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.rename = Some(name.into());
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = Some(true);
        self
    }

    pub fn not_nullable(mut self) -> Self {
        self.nullable = Some(false);
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Join the table's anonymous unique group.
    pub fn unique(mut self) -> Self {
        self.unique_group = Some(String::new());
        self
    }

    /// Join a named unique group.
    pub fn unique_group(mut self, group: impl Into<String>) -> Self {
        self.unique_group = Some(group.into());
        self
    }

    pub fn default_value(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Variable-length storage (VARCHAR over CHAR, VARBINARY over BINARY).
    pub fn variable_length(mut self, variable: bool) -> Self {
        self.variable = Some(variable);
        self
    }

    /// Storage size for strings and binary data.
    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Store only the date part of a DateTime property.
    pub fn date_only(mut self) -> Self {
        self.date_only = true;
        self
    }

    pub fn fractional_seconds(mut self, scale: u32) -> Self {
        self.fractional_seconds = Some(scale);
        self
    }

    pub fn precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn unicode(mut self, unicode: bool) -> Self {
        self.unicode = Some(unicode);
        self
    }

    /// Auto-generated identity value: a ROWVERSION column.
    pub fn auto_generated(mut self) -> Self {
        self.auto_generated = Some(true);
        self
    }

    pub fn money(mut self) -> Self {
        self.money = true;
        self
    }

    pub fn small_money(mut self) -> Self {
        self.small_money = true;
        self
    }

    pub fn max_size(mut self) -> Self {
        self.max_size = true;
        self
    }

    pub fn identity(mut self, seed: i64, increment: i64) -> Self {
        self.identity = Some((seed, increment));
        self
    }
}

/// One model table.
#[derive(Debug, Clone)]
pub struct TableModel {
    type_name: String,
    schema: String,
    table: Option<String>,
    ignore: bool,
    description: Option<String>,
    primary_key: Vec<String>,
    columns: Vec<ColumnModel>,
}

impl TableModel {
    /// Start a model for a named entity type. The table name defaults to the
    /// type name with common model suffixes stripped.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            schema: "dbo".to_string(),
            table: None,
            ignore: false,
            description: None,
            primary_key: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table = Some(name.into());
        self
    }

    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Declare the primary key at table level, in order.
    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn column(mut self, column: ColumnModel) -> Self {
        self.columns.push(column);
        self
    }

    /// Whether the model is excluded from migration generation.
    pub fn is_ignored(&self) -> bool {
        self.ignore
    }

    /// Build the desired table schema.
    pub fn build(&self) -> Result<TableSchema> {
        let table_name = self
            .table
            .clone()
            .unwrap_or_else(|| strip_model_suffix(&self.type_name).to_string());
        validate_identifier(&self.schema)?;
        validate_identifier(&table_name)?;

        let mut columns = Vec::new();
        let mut primary_key = self.primary_key.clone();
        let mut uniques: Vec<UniqueGroup> = Vec::new();

        for model in &self.columns {
            // The structural Id column is managed by the unit of work, not
            // declared through the model.
            if model.ignore || model.name.eq_ignore_ascii_case("Id") {
                continue;
            }

            let column_name = model.rename.clone().unwrap_or_else(|| model.name.clone());
            validate_identifier(&column_name)?;

            let kind = LogicalType::of(&model.property)?;
            let mut builder = ColumnBuilder::new(&column_name);

            builder = match kind {
                LogicalType::BigInt => builder.is_integer(8)?.nullable(false),
                LogicalType::Binary => builder
                    .is_binary(model.variable.unwrap_or(true), model.size.unwrap_or(30))?
                    .nullable(true),
                LogicalType::Bit => builder.is_boolean().nullable(false),
                LogicalType::DateTime => {
                    let mut b = builder.is_date();
                    if !model.date_only {
                        b = b.with_time(model.fractional_seconds.unwrap_or(3))?;
                    }
                    b.nullable(false)
                }
                LogicalType::DateTimeOffset => builder
                    .is_date()
                    .with_time(model.fractional_seconds.unwrap_or(7))?
                    .with_time_zone()
                    .nullable(false),
                LogicalType::Decimal => builder
                    .is_decimal(model.precision.unwrap_or(19), model.scale.unwrap_or(5))?
                    .nullable(false),
                LogicalType::Float => builder.is_floating_point(53)?.nullable(false),
                LogicalType::Int => builder.is_integer(4)?.nullable(false),
                LogicalType::Numeric20 => builder.is_decimal(20, 0)?.nullable(false),
                LogicalType::Real => builder.is_floating_point(24)?.nullable(false),
                LogicalType::SmallInt => builder.is_integer(2)?.nullable(false),
                LogicalType::String => builder
                    .is_string(
                        model.unicode.unwrap_or(true),
                        model.variable.unwrap_or(true),
                        model.size.unwrap_or(30),
                    )?
                    .nullable(true),
                LogicalType::String1 => builder
                    .is_string(model.unicode.unwrap_or(true), false, 1)?
                    .nullable(false),
                LogicalType::Time => builder
                    .with_time(model.fractional_seconds.unwrap_or(7))?
                    .nullable(false),
                LogicalType::TinyInt => builder.is_integer(1)?.nullable(false),
                LogicalType::Uid => {
                    let auto = model.auto_generated.unwrap_or(false);
                    builder.is_uid(auto).nullable(!auto)
                }
            };

            if model.small_money {
                builder = builder.is_money(true);
            }
            if model.money {
                builder = builder.is_money(false);
            }
            if model.max_size {
                builder = builder.with_max_size();
            }

            if let Some((seed, increment)) = model.identity {
                if !kind.supports_identity() {
                    return Err(RepoError::column(
                        &column_name,
                        "IDENTITY is only supported on SMALLINT, INT and BIGINT columns",
                    ));
                }
                builder = builder.with_identity(seed, increment);
            }

            if let Some(nullable) = model.nullable {
                builder = builder.nullable(nullable);
            }

            if model.primary_key {
                // A key column can never be nullable, whatever was asked.
                builder = builder.nullable(false);
                primary_key.push(column_name.clone());
            }

            if let Some(group) = &model.unique_group {
                match uniques.iter_mut().find(|u| u.name == *group) {
                    Some(existing) => existing.columns.push(column_name.clone()),
                    None => uniques.push(UniqueGroup {
                        name: group.clone(),
                        columns: vec![column_name.clone()],
                    }),
                }
            }

            if let Some(default) = &model.default {
                builder = builder.default_value(default.clone());
            }
            if let Some(text) = &model.description {
                builder = builder.description(text);
            }

            columns.push(builder.build());
        }

        if columns.is_empty() {
            return Err(RepoError::Schema(format!(
                "table model '{}' produced no columns",
                self.type_name
            )));
        }
        if primary_key.is_empty() {
            return Err(RepoError::Schema(format!(
                "table model '{}' declares no primary key",
                self.type_name
            )));
        }
        for key in primary_key.iter().chain(uniques.iter().flat_map(|u| u.columns.iter())) {
            if !columns.iter().any(|c| c.name.eq_ignore_ascii_case(key)) {
                return Err(RepoError::Schema(format!(
                    "constraint column '{}' does not exist on table '{}'",
                    key, table_name
                )));
            }
        }

        Ok(TableSchema {
            schema: self.schema.clone(),
            name: table_name,
            columns,
            primary_key,
            uniques,
            description: self.description.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::SqlType;

    fn person() -> TableModel {
        TableModel::new("PersonModel")
            .description("People known to the system")
            .column(
                ColumnModel::new("Name", PropertyType::Text)
                    .size(100)
                    .primary_key(),
            )
            .column(ColumnModel::new("Age", PropertyType::U8))
            .column(
                ColumnModel::new("Email", PropertyType::Text)
                    .size(320)
                    .unique(),
            )
    }

    #[test]
    fn test_table_name_strips_model_suffix() {
        let table = person().build().unwrap();
        assert_eq!(table.name, "Person");
        assert_eq!(table.schema, "dbo");
    }

    #[test]
    fn test_explicit_table_name_wins() {
        let table = person().table_name("Folks").schema("hr").build().unwrap();
        assert_eq!(table.name, "Folks");
        assert_eq!(table.schema, "hr");
    }

    #[test]
    fn test_per_kind_defaults() {
        let table = TableModel::new("T")
            .column(ColumnModel::new("K", PropertyType::I32).primary_key())
            .column(ColumnModel::new("Name", PropertyType::Text))
            .column(ColumnModel::new("Flag", PropertyType::Bool))
            .column(ColumnModel::new("When", PropertyType::DateTime))
            .column(ColumnModel::new("Tag", PropertyType::Uuid))
            .build()
            .unwrap();

        let name = table.column("Name").unwrap();
        assert_eq!(name.type_text, "NVARCHAR(30)");
        assert!(name.nullable);

        let flag = table.column("Flag").unwrap();
        assert_eq!(flag.sql_type, SqlType::Bit);
        assert!(!flag.nullable);

        let when = table.column("When").unwrap();
        assert_eq!(when.sql_type, SqlType::DateTime);
        assert!(!when.nullable);

        let tag = table.column("Tag").unwrap();
        assert_eq!(tag.sql_type, SqlType::UniqueIdentifier);
        assert!(tag.nullable);
    }

    #[test]
    fn test_date_only_and_offset() {
        let table = TableModel::new("T")
            .column(ColumnModel::new("K", PropertyType::I32).primary_key())
            .column(ColumnModel::new("Born", PropertyType::DateTime).date_only())
            .column(ColumnModel::new("Seen", PropertyType::DateTimeOffset))
            .build()
            .unwrap();
        assert_eq!(table.column("Born").unwrap().sql_type, SqlType::Date);
        assert_eq!(table.column("Seen").unwrap().type_text, "DATETIMEOFFSET(7)");
    }

    #[test]
    fn test_unsigned_widening_and_numeric20() {
        let table = TableModel::new("T")
            .column(ColumnModel::new("K", PropertyType::I32).primary_key())
            .column(ColumnModel::new("A", PropertyType::U32))
            .column(ColumnModel::new("B", PropertyType::U64))
            .build()
            .unwrap();
        assert_eq!(table.column("A").unwrap().sql_type, SqlType::BigInt);
        assert_eq!(table.column("B").unwrap().type_text, "DECIMAL(20,0)");
    }

    #[test]
    fn test_id_column_is_excluded() {
        let table = TableModel::new("T")
            .column(ColumnModel::new("Id", PropertyType::Uuid))
            .column(ColumnModel::new("K", PropertyType::I32).primary_key())
            .build()
            .unwrap();
        assert!(table.column("Id").is_none());
        assert_eq!(table.columns.len(), 1);
    }

    #[test]
    fn test_primary_key_forces_not_null_and_accumulates() {
        let table = person().build().unwrap();
        assert_eq!(table.primary_key, vec!["Name"]);
        assert!(!table.column("Name").unwrap().nullable);
    }

    #[test]
    fn test_unique_groups_preserved() {
        let table = TableModel::new("T")
            .column(ColumnModel::new("K", PropertyType::I32).primary_key())
            .column(ColumnModel::new("A", PropertyType::Text).unique_group("AB"))
            .column(ColumnModel::new("B", PropertyType::Text).unique_group("AB"))
            .column(ColumnModel::new("C", PropertyType::Text).unique())
            .build()
            .unwrap();
        assert_eq!(table.uniques.len(), 2);
        assert_eq!(table.uniques[0].name, "AB");
        assert_eq!(table.uniques[0].columns, vec!["A", "B"]);
        assert_eq!(table.uniques[1].name, "");
        assert_eq!(table.uniques[1].columns, vec!["C"]);
    }

    #[test]
    fn test_unmapped_property_is_an_error() {
        let err = TableModel::new("T")
            .column(ColumnModel::new("K", PropertyType::I32).primary_key())
            .column(ColumnModel::new("Geo", PropertyType::Other("Point".into())))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Point"));
    }

    #[test]
    fn test_identity_only_on_suitable_kinds() {
        let ok = TableModel::new("T")
            .column(ColumnModel::new("Seq", PropertyType::I64).identity(100, 5).primary_key())
            .build()
            .unwrap();
        assert_eq!(ok.column("Seq").unwrap().type_text, "BIGINT IDENTITY(100,5)");

        let err = TableModel::new("T")
            .column(ColumnModel::new("K", PropertyType::I32).primary_key())
            .column(ColumnModel::new("Flag", PropertyType::Bool).identity(1, 1))
            .build()
            .unwrap_err();
        assert!(matches!(err, RepoError::ColumnBuilder { .. }));
    }

    #[test]
    fn test_empty_tables_rejected() {
        assert!(TableModel::new("Empty").build().is_err());

        let no_pk = TableModel::new("T")
            .column(ColumnModel::new("A", PropertyType::Text))
            .build();
        assert!(no_pk.is_err());
    }

    #[test]
    fn test_constraint_member_must_exist() {
        let err = TableModel::new("T")
            .primary_key(&["Missing"])
            .column(ColumnModel::new("A", PropertyType::Text))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Missing"));
    }

    #[test]
    fn test_ignored_column_skipped() {
        let table = TableModel::new("T")
            .column(ColumnModel::new("K", PropertyType::I32).primary_key())
            .column(ColumnModel::new("Scratch", PropertyType::Text).ignore())
            .build()
            .unwrap();
        assert!(table.column("Scratch").is_none());
    }

    #[test]
    fn test_rename_and_default() {
        let table = TableModel::new("T")
            .column(ColumnModel::new("K", PropertyType::I32).primary_key())
            .column(
                ColumnModel::new("count", PropertyType::I32)
                    .rename("RetryCount")
                    .default_value(DefaultValue::Int(0)),
            )
            .build()
            .unwrap();
        let col = table.column("RetryCount").unwrap();
        assert_eq!(col.default_text.as_deref(), Some("0"));
    }
}
