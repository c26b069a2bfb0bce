//! SQL Server backend over tiberius.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use tiberius::{Client, ColumnType, Config, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use uuid::Uuid;

use crate::client::{SqlConnector, SqlSession};
use crate::error::{CopyError, Result};
use crate::value::{Row, SqlNullType, SqlValue};

/// Opens SQL Server sessions from ADO-style connection strings
/// (`Server=tcp:host,1433;Database=db;User Id=u;Password=p;...`).
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlConnector;

impl MssqlConnector {
    pub fn new() -> Self {
        MssqlConnector
    }
}

/// One open SQL Server connection.
pub struct MssqlSession {
    client: Client<Compat<TcpStream>>,
}

#[async_trait]
impl SqlConnector for MssqlConnector {
    type Session = MssqlSession;

    async fn connect(&self, connection_string: &str) -> Result<MssqlSession> {
        let config = Config::from_ado_string(connection_string).map_err(|e| {
            CopyError::connection_with("invalid SQL Server connection string", e)
        })?;

        let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
            CopyError::connection_with("failed to reach SQL Server host", e)
        })?;
        tcp.set_nodelay(true).ok();

        let client = Client::connect(config, tcp.compat_write()).await.map_err(|e| {
            CopyError::connection_with("failed to open SQL Server connection", e)
        })?;

        Ok(MssqlSession { client })
    }
}

#[async_trait]
impl SqlSession for MssqlSession {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let boxed: Vec<Box<dyn ToSql>> = params.iter().map(param_for).collect();
        let refs: Vec<&dyn ToSql> = boxed.iter().map(|p| p.as_ref()).collect();

        let result = self
            .client
            .execute(sql, &refs)
            .await
            .map_err(|e| CopyError::statement_with(format!("statement failed: [{}]", sql), e))?;

        Ok(result.total())
    }

    async fn execute_batch(&mut self, sql: &str, rows: &[Row]) -> Result<u64> {
        let mut affected = 0u64;

        for row in rows {
            let boxed: Vec<Box<dyn ToSql>> = row.iter().map(param_for).collect();
            let refs: Vec<&dyn ToSql> = boxed.iter().map(|p| p.as_ref()).collect();

            let result = self
                .client
                .execute(sql, &refs)
                .await
                .map_err(|e| CopyError::statement_with(format!("insert failed: [{}]", sql), e))?;
            affected += result.total();
        }

        Ok(affected)
    }

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let boxed: Vec<Box<dyn ToSql>> = params.iter().map(param_for).collect();
        let refs: Vec<&dyn ToSql> = boxed.iter().map(|p| p.as_ref()).collect();

        let rows = self
            .client
            .query(sql, &refs)
            .await
            .map_err(|e| CopyError::statement_with(format!("query failed: [{}]", sql), e))?
            .into_first_result()
            .await
            .map_err(|e| CopyError::statement_with(format!("query failed: [{}]", sql), e))?;

        Ok(rows.iter().map(decode_row).collect())
    }

    async fn begin(&mut self) -> Result<()> {
        self.control("BEGIN TRANSACTION").await
    }

    async fn commit(&mut self) -> Result<()> {
        self.control("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.control("ROLLBACK").await
    }

    async fn close(self) -> Result<()> {
        self.client
            .close()
            .await
            .map_err(|e| CopyError::connection_with("failed to close SQL Server connection", e))
    }
}

impl MssqlSession {
    /// Transaction control statements run as an ad-hoc batch so they apply
    /// to the connection, not to an `sp_executesql` scope.
    async fn control(&mut self, sql: &str) -> Result<()> {
        self.client
            .simple_query(sql)
            .await
            .map_err(|e| CopyError::statement_with(format!("statement failed: [{}]", sql), e))?
            .into_results()
            .await
            .map_err(|e| CopyError::statement_with(format!("statement failed: [{}]", sql), e))?;
        Ok(())
    }
}

/// Bind one value as a tiberius parameter, with typed NULLs.
fn param_for(value: &SqlValue) -> Box<dyn ToSql> {
    match value {
        SqlValue::Null(null_type) => match null_type {
            SqlNullType::Bool => Box::new(Option::<bool>::None),
            SqlNullType::I16 => Box::new(Option::<i16>::None),
            SqlNullType::I32 => Box::new(Option::<i32>::None),
            SqlNullType::I64 => Box::new(Option::<i64>::None),
            SqlNullType::F32 => Box::new(Option::<f32>::None),
            SqlNullType::F64 => Box::new(Option::<f64>::None),
            SqlNullType::Text => Box::new(Option::<String>::None),
            SqlNullType::Bytes => Box::new(Option::<Vec<u8>>::None),
            SqlNullType::Uuid => Box::new(Option::<Uuid>::None),
            SqlNullType::Decimal => Box::new(Option::<Decimal>::None),
            SqlNullType::DateTime => Box::new(Option::<NaiveDateTime>::None),
            SqlNullType::DateTimeOffset => Box::new(Option::<DateTime<FixedOffset>>::None),
            SqlNullType::Date => Box::new(Option::<NaiveDate>::None),
            SqlNullType::Time => Box::new(Option::<NaiveTime>::None),
        },
        SqlValue::Bool(v) => Box::new(*v),
        SqlValue::I16(v) => Box::new(*v),
        SqlValue::I32(v) => Box::new(*v),
        SqlValue::I64(v) => Box::new(*v),
        SqlValue::F32(v) => Box::new(*v),
        SqlValue::F64(v) => Box::new(*v),
        SqlValue::Text(v) => Box::new(v.clone()),
        SqlValue::Bytes(v) => Box::new(v.clone()),
        SqlValue::Uuid(v) => Box::new(*v),
        SqlValue::Decimal(v) => Box::new(*v),
        SqlValue::DateTime(v) => Box::new(*v),
        SqlValue::DateTimeOffset(v) => Box::new(*v),
        SqlValue::Date(v) => Box::new(*v),
        SqlValue::Time(v) => Box::new(*v),
    }
}

fn decode_row(row: &tiberius::Row) -> Row {
    let types: Vec<ColumnType> = row.columns().iter().map(|c| c.column_type()).collect();
    types
        .iter()
        .enumerate()
        .map(|(idx, ty)| decode_cell(row, idx, *ty))
        .collect()
}

/// Convert one cell by column type. Decoding is forgiving: an unreadable or
/// unexpected cell becomes a typed NULL rather than failing the whole row.
fn decode_cell(row: &tiberius::Row, idx: usize, ty: ColumnType) -> SqlValue {
    match ty {
        ColumnType::Bit | ColumnType::Bitn => row
            .try_get::<bool, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Bool)
            .unwrap_or(SqlValue::Null(SqlNullType::Bool)),
        ColumnType::Int1 => row
            .try_get::<u8, _>(idx)
            .ok()
            .flatten()
            .map(|v| SqlValue::I16(v as i16))
            .unwrap_or(SqlValue::Null(SqlNullType::I16)),
        ColumnType::Int2 => row
            .try_get::<i16, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::I16)
            .unwrap_or(SqlValue::Null(SqlNullType::I16)),
        ColumnType::Int4 => row
            .try_get::<i32, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::I32)
            .unwrap_or(SqlValue::Null(SqlNullType::I32)),
        ColumnType::Int8 => row
            .try_get::<i64, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::I64)
            .unwrap_or(SqlValue::Null(SqlNullType::I64)),
        // Nullable integer columns arrive as Intn with the width erased;
        // widest first.
        ColumnType::Intn => row
            .try_get::<i64, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::I64)
            .or_else(|| {
                row.try_get::<i32, _>(idx)
                    .ok()
                    .flatten()
                    .map(SqlValue::I32)
            })
            .or_else(|| {
                row.try_get::<i16, _>(idx)
                    .ok()
                    .flatten()
                    .map(SqlValue::I16)
            })
            .or_else(|| {
                row.try_get::<u8, _>(idx)
                    .ok()
                    .flatten()
                    .map(|v| SqlValue::I16(v as i16))
            })
            .unwrap_or(SqlValue::Null(SqlNullType::I64)),
        ColumnType::Float4 => row
            .try_get::<f32, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::F32)
            .unwrap_or(SqlValue::Null(SqlNullType::F32)),
        ColumnType::Float8 | ColumnType::Money | ColumnType::Money4 => row
            .try_get::<f64, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::F64)
            .unwrap_or(SqlValue::Null(SqlNullType::F64)),
        ColumnType::Floatn => row
            .try_get::<f64, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::F64)
            .or_else(|| {
                row.try_get::<f32, _>(idx)
                    .ok()
                    .flatten()
                    .map(SqlValue::F32)
            })
            .unwrap_or(SqlValue::Null(SqlNullType::F64)),
        ColumnType::Guid => row
            .try_get::<Uuid, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Uuid)
            .unwrap_or(SqlValue::Null(SqlNullType::Uuid)),
        ColumnType::Decimaln | ColumnType::Numericn => row
            .try_get::<Decimal, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Decimal)
            .unwrap_or(SqlValue::Null(SqlNullType::Decimal)),
        ColumnType::Datetime
        | ColumnType::Datetime4
        | ColumnType::Datetimen
        | ColumnType::Datetime2 => row
            .try_get::<NaiveDateTime, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::DateTime)
            .unwrap_or(SqlValue::Null(SqlNullType::DateTime)),
        ColumnType::DatetimeOffsetn => row
            .try_get::<DateTime<FixedOffset>, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::DateTimeOffset)
            .or_else(|| {
                row.try_get::<DateTime<Utc>, _>(idx)
                    .ok()
                    .flatten()
                    .map(|dt| SqlValue::DateTimeOffset(dt.fixed_offset()))
            })
            .unwrap_or(SqlValue::Null(SqlNullType::DateTimeOffset)),
        ColumnType::Daten => row
            .try_get::<NaiveDate, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Date)
            .unwrap_or(SqlValue::Null(SqlNullType::Date)),
        ColumnType::Timen => row
            .try_get::<NaiveTime, _>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Time)
            .unwrap_or(SqlValue::Null(SqlNullType::Time)),
        ColumnType::BigBinary | ColumnType::BigVarBin | ColumnType::Image => row
            .try_get::<&[u8], _>(idx)
            .ok()
            .flatten()
            .map(|v| SqlValue::Bytes(v.to_vec()))
            .unwrap_or(SqlValue::Null(SqlNullType::Bytes)),
        // Everything else decodes as text.
        _ => row
            .try_get::<&str, _>(idx)
            .ok()
            .flatten()
            .map(|s| SqlValue::Text(s.to_string()))
            .unwrap_or(SqlValue::Null(SqlNullType::Text)),
    }
}
