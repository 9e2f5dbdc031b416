//! SQL Server driver: a tiberius-backed [`Connection`] and the catalog
//! reader the migrator diffs against.

use std::borrow::Cow;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use tiberius::{Client, ColumnData, Config, FromSql, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::catalog::{self, CatalogReader};
use crate::core::traits::Connection;
use crate::core::value::SqlValue;
use crate::error::{RepoError, Result};
use crate::schema::types::TableSchema;

/// One user-table row per result; columns and unique indexes come back as
/// nested JSON so a single round trip covers the whole database.
const TABLE_INFOS_SQL: &str = "\
select s.[name] [schema], o.[name] [table], cast(e.[value] as nvarchar(max)) [description], \
(select c.[name], t.[name] [type], object_definition(c.default_object_id) [def], \
c.is_nullable, c.max_length, c.[precision], c.scale, c.is_identity, \
ic.seed_value, ic.increment_value, cast(e.[value] as nvarchar(max)) [description] \
from [sys].[columns] c \
join [sys].[types] t on c.user_type_id = t.user_type_id \
left join [sys].[identity_columns] ic on c.[object_id] = ic.[object_id] and c.column_id = ic.column_id \
left join [sys].[extended_properties] e on e.major_id = c.[object_id] and e.minor_id = c.column_id and e.[name] = 'Description' \
where c.[object_id] = o.[object_id] \
for json path) colJson, \
(select i.[name] [key], i.is_primary_key, c.[name] [column] \
from [sys].[indexes] i \
join [sys].[index_columns] ic on i.[object_id] = ic.[object_id] and i.index_id = ic.index_id \
join [sys].[columns] c on ic.[object_id] = c.[object_id] and ic.column_id = c.column_id \
where i.is_unique = 1 and i.[object_id] = o.[object_id] \
for json path) ixJson \
from [sys].[objects] o \
join [sys].[schemas] s on o.[schema_id] = s.[schema_id] \
left join [sys].[extended_properties] e on e.major_id = o.[object_id] and e.minor_id = 0 and e.[name] = 'Description' \
where o.[type] = 'U';";

const SCHEMA_NAMES_SQL: &str = "select [name] from [sys].[schemas];";

/// A tiberius client speaking the [`Connection`] contract.
pub struct MssqlConnection {
    client: Client<Compat<TcpStream>>,
}

impl MssqlConnection {
    /// Connect using an ADO.NET-style connection string.
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let config = Config::from_ado_string(connection_string)?;
        let tcp = TcpStream::connect(config.get_addr()).await?;
        tcp.set_nodelay(true)?;

        let client = Client::connect(config, tcp.compat_write()).await?;
        info!("connected to SQL Server");
        Ok(Self { client })
    }
}

/// Collect parameters as trait objects for tiberius's by-reference binding.
fn param_refs(params: &[SqlValue]) -> Vec<&dyn ToSql> {
    params.iter().map(|p| p as &dyn ToSql).collect()
}

#[async_trait]
impl Connection for MssqlConnection {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let result = self.client.execute(sql, &param_refs(params)).await?;
        Ok(result.total())
    }

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Vec<SqlValue>>> {
        let stream = self.client.query(sql, &param_refs(params)).await?;
        let rows = stream.into_first_result().await?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let mut cells = Vec::new();
            for data in row.into_iter() {
                cells.push(decode_cell(data)?);
            }
            result.push(cells);
        }
        Ok(result)
    }

    async fn batch(&mut self, sql: &str) -> Result<()> {
        debug!(statements = sql.matches(';').count(), "executing batch");
        self.client.simple_query(sql).await?.into_results().await?;
        Ok(())
    }

    async fn begin_serializable(&mut self) -> Result<()> {
        self.client
            .simple_query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE; BEGIN TRANSACTION;")
            .await?
            .into_results()
            .await?;
        Ok(())
    }

    async fn commit_tx(&mut self) -> Result<()> {
        self.client
            .simple_query("COMMIT TRANSACTION;")
            .await?
            .into_results()
            .await?;
        Ok(())
    }

    async fn rollback_tx(&mut self) -> Result<()> {
        self.client
            .simple_query("ROLLBACK TRANSACTION;")
            .await?
            .into_results()
            .await?;
        Ok(())
    }
}

/// Parameter encoding onto the TDS wire types. Scalar variants build their
/// `ColumnData` directly; DECIMAL and the temporal variants delegate to
/// tiberius's own reference conversions.
impl ToSql for SqlValue {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            SqlValue::Null => ColumnData::String(None),
            SqlValue::Bool(v) => ColumnData::Bit(Some(*v)),
            SqlValue::U8(v) => ColumnData::U8(Some(*v)),
            SqlValue::I16(v) => ColumnData::I16(Some(*v)),
            SqlValue::I32(v) => ColumnData::I32(Some(*v)),
            SqlValue::I64(v) => ColumnData::I64(Some(*v)),
            SqlValue::F32(v) => ColumnData::F32(Some(*v)),
            SqlValue::F64(v) => ColumnData::F64(Some(*v)),
            SqlValue::Decimal(v) => v.to_sql(),
            SqlValue::String(v) => ColumnData::String(Some(Cow::from(v.as_str()))),
            SqlValue::Bytes(v) => ColumnData::Binary(Some(Cow::from(v.as_slice()))),
            SqlValue::Uuid(v) => ColumnData::Guid(Some(*v)),
            SqlValue::Date(v) => v.to_sql(),
            SqlValue::Time(v) => v.to_sql(),
            SqlValue::DateTime(v) => v.to_sql(),
            SqlValue::DateTimeOffset(v) => v.to_sql(),
        }
    }
}

fn decode_cell(data: ColumnData<'static>) -> Result<SqlValue> {
    let value = match data {
        ColumnData::Bit(v) => v.map(SqlValue::Bool),
        ColumnData::U8(v) => v.map(SqlValue::U8),
        ColumnData::I16(v) => v.map(SqlValue::I16),
        ColumnData::I32(v) => v.map(SqlValue::I32),
        ColumnData::I64(v) => v.map(SqlValue::I64),
        ColumnData::F32(v) => v.map(SqlValue::F32),
        ColumnData::F64(v) => v.map(SqlValue::F64),
        ColumnData::String(v) => v.map(|s| SqlValue::String(s.into_owned())),
        ColumnData::Guid(v) => v.map(SqlValue::Uuid),
        ColumnData::Binary(v) => v.map(|b| SqlValue::Bytes(b.into_owned())),
        d @ ColumnData::Numeric(_) => Decimal::from_sql(&d)?.map(SqlValue::Decimal),
        d @ ColumnData::Date(_) => NaiveDate::from_sql(&d)?.map(SqlValue::Date),
        d @ ColumnData::Time(_) => NaiveTime::from_sql(&d)?.map(SqlValue::Time),
        d @ (ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_)) => {
            NaiveDateTime::from_sql(&d)?.map(SqlValue::DateTime)
        }
        d @ ColumnData::DateTimeOffset(_) => {
            DateTime::<Utc>::from_sql(&d)?.map(SqlValue::DateTimeOffset)
        }
        ColumnData::Xml(_) => {
            return Err(RepoError::Connection(
                "unsupported column data in result row: xml".to_string(),
            ))
        }
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

/// Catalog access over a dedicated connection.
pub struct MssqlCatalog {
    connection: MssqlConnection,
}

impl MssqlCatalog {
    pub async fn connect(connection_string: &str) -> Result<Self> {
        Ok(Self {
            connection: MssqlConnection::connect(connection_string).await?,
        })
    }

    pub fn new(connection: MssqlConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl CatalogReader for MssqlCatalog {
    async fn schema_names(&mut self) -> Result<Vec<String>> {
        let rows = self.connection.query(SCHEMA_NAMES_SQL, &[]).await?;
        let mut names = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_iter().next() {
                Some(SqlValue::String(name)) => names.push(name),
                _ => {
                    return Err(RepoError::catalog(
                        "schema name query returned a non-string row",
                    ))
                }
            }
        }
        Ok(names)
    }

    async fn tables(&mut self) -> Result<Vec<TableSchema>> {
        let rows = self.connection.query(TABLE_INFOS_SQL, &[]).await?;
        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            let mut cells = row.into_iter();
            let schema = string_cell(cells.next(), "schema")?;
            let name = string_cell(cells.next(), "table")?;
            let description = optional_string_cell(cells.next());
            let col_json = optional_string_cell(cells.next());
            let ix_json = optional_string_cell(cells.next());

            tables.push(catalog::table_from_catalog(
                schema,
                name,
                description,
                col_json.as_deref(),
                ix_json.as_deref(),
            )?);
        }
        debug!(tables = tables.len(), "catalog loaded");
        Ok(tables)
    }
}

fn string_cell(cell: Option<SqlValue>, field: &str) -> Result<String> {
    match cell {
        Some(SqlValue::String(s)) => Ok(s),
        _ => Err(RepoError::catalog(format!(
            "catalog query returned no {} value",
            field
        ))),
    }
}

fn optional_string_cell(cell: Option<SqlValue>) -> Option<String> {
    match cell {
        Some(SqlValue::String(s)) => Some(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_params_encode_as_numeric() {
        let value = SqlValue::Decimal(Decimal::new(12345, 2));
        match value.to_sql() {
            ColumnData::Numeric(Some(numeric)) => {
                assert_eq!(numeric.value(), 12345);
                assert_eq!(numeric.scale(), 2);
            }
            other => panic!("expected a numeric wire value, got {:?}", other),
        }
    }

    #[test]
    fn test_scalar_params_encode_directly() {
        assert!(matches!(SqlValue::Null.to_sql(), ColumnData::String(None)));
        assert!(matches!(
            SqlValue::Bool(true).to_sql(),
            ColumnData::Bit(Some(true))
        ));
        assert!(matches!(
            SqlValue::I64(7).to_sql(),
            ColumnData::I64(Some(7))
        ));

        let id = uuid::Uuid::new_v4();
        assert!(matches!(
            SqlValue::Uuid(id).to_sql(),
            ColumnData::Guid(Some(v)) if v == id
        ));
    }

    #[test]
    fn test_string_and_bytes_params_borrow() {
        let text = SqlValue::String("O'Brien".to_string());
        match text.to_sql() {
            ColumnData::String(Some(s)) => assert_eq!(s.as_ref(), "O'Brien"),
            other => panic!("expected a string wire value, got {:?}", other),
        }

        let blob = SqlValue::Bytes(vec![1, 2, 3]);
        match blob.to_sql() {
            ColumnData::Binary(Some(b)) => assert_eq!(b.as_ref(), &[1, 2, 3]),
            other => panic!("expected a binary wire value, got {:?}", other),
        }
    }

    #[test]
    fn test_param_refs_preserve_order() {
        let params = vec![SqlValue::I32(1), SqlValue::Null, SqlValue::Bool(false)];
        let refs = param_refs(&params);
        assert_eq!(refs.len(), 3);
        assert!(matches!(refs[0].to_sql(), ColumnData::I32(Some(1))));
        assert!(matches!(refs[1].to_sql(), ColumnData::String(None)));
        assert!(matches!(refs[2].to_sql(), ColumnData::Bit(Some(false))));
    }
}
