//! PostgreSQL backend over tokio-postgres.

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::task::JoinHandle;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::{Client, NoTls};
use tracing::debug;

use crate::client::{SqlConnector, SqlSession};
use crate::error::{CopyError, Result};
use crate::value::{Row, SqlNullType, SqlValue};

/// Opens PostgreSQL sessions from `host=... user=...` connection strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

impl PgConnector {
    pub fn new() -> Self {
        PgConnector
    }
}

/// One open PostgreSQL connection.
pub struct PgSession {
    client: Client,
    driver: JoinHandle<()>,
}

#[async_trait]
impl SqlConnector for PgConnector {
    type Session = PgSession;

    async fn connect(&self, connection_string: &str) -> Result<PgSession> {
        let (client, connection) = tokio_postgres::connect(connection_string, NoTls)
            .await
            .map_err(|e| {
                CopyError::connection_with("failed to open PostgreSQL connection", e)
            })?;

        // The connection object drives the socket; it resolves once the
        // client half is dropped.
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!("postgres connection closed with error: {}", e);
            }
        });

        Ok(PgSession { client, driver })
    }
}

#[async_trait]
impl SqlSession for PgSession {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let refs = param_refs(params);
        self.client
            .execute(sql, &refs)
            .await
            .map_err(|e| CopyError::statement_with(format!("statement failed: [{}]", sql), e))
    }

    async fn execute_batch(&mut self, sql: &str, rows: &[Row]) -> Result<u64> {
        let statement = self
            .client
            .prepare(sql)
            .await
            .map_err(|e| CopyError::statement_with(format!("prepare failed: [{}]", sql), e))?;

        let mut affected = 0u64;
        for row in rows {
            let refs = param_refs(row);
            affected += self
                .client
                .execute(&statement, &refs)
                .await
                .map_err(|e| CopyError::statement_with(format!("insert failed: [{}]", sql), e))?;
        }

        Ok(affected)
    }

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let refs = param_refs(params);
        let rows = self
            .client
            .query(sql, &refs)
            .await
            .map_err(|e| CopyError::statement_with(format!("query failed: [{}]", sql), e))?;

        rows.iter().map(decode_row).collect()
    }

    async fn begin(&mut self) -> Result<()> {
        self.client
            .batch_execute("BEGIN")
            .await
            .map_err(|e| CopyError::statement_with("failed to begin transaction", e))
    }

    async fn commit(&mut self) -> Result<()> {
        self.client
            .batch_execute("COMMIT")
            .await
            .map_err(|e| CopyError::statement_with("failed to commit transaction", e))
    }

    async fn rollback(&mut self) -> Result<()> {
        self.client
            .batch_execute("ROLLBACK")
            .await
            .map_err(|e| CopyError::statement_with("failed to roll back transaction", e))
    }

    async fn close(self) -> Result<()> {
        drop(self.client);
        let _ = self.driver.await;
        Ok(())
    }
}

fn param_refs(params: &[SqlValue]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

/// Decode one result row into owned values, by declared column type.
fn decode_row(row: &tokio_postgres::Row) -> Result<Row> {
    (0..row.columns().len())
        .map(|idx| decode_cell(row, idx))
        .collect()
}

fn decode_cell(row: &tokio_postgres::Row, idx: usize) -> Result<SqlValue> {
    let column = &row.columns()[idx];

    match column.type_().name() {
        "bool" => typed(row, idx, SqlNullType::Bool, SqlValue::Bool),
        "int2" => typed(row, idx, SqlNullType::I16, SqlValue::I16),
        "int4" => typed(row, idx, SqlNullType::I32, SqlValue::I32),
        "int8" => typed(row, idx, SqlNullType::I64, SqlValue::I64),
        "float4" => typed(row, idx, SqlNullType::F32, SqlValue::F32),
        "float8" => typed(row, idx, SqlNullType::F64, SqlValue::F64),
        "text" | "varchar" | "bpchar" | "name" => {
            typed(row, idx, SqlNullType::Text, SqlValue::Text)
        }
        "bytea" => typed(row, idx, SqlNullType::Bytes, SqlValue::Bytes),
        "uuid" => typed(row, idx, SqlNullType::Uuid, SqlValue::Uuid),
        "numeric" => typed(row, idx, SqlNullType::Decimal, SqlValue::Decimal),
        "timestamp" => typed(row, idx, SqlNullType::DateTime, SqlValue::DateTime),
        "timestamptz" => typed(
            row,
            idx,
            SqlNullType::DateTimeOffset,
            SqlValue::DateTimeOffset,
        ),
        "date" => typed(row, idx, SqlNullType::Date, SqlValue::Date),
        "time" => typed(row, idx, SqlNullType::Time, SqlValue::Time),
        other => Err(CopyError::statement(format!(
            "unsupported column type {} for column {}",
            other,
            column.name()
        ))),
    }
}

fn typed<'r, T>(
    row: &'r tokio_postgres::Row,
    idx: usize,
    null: SqlNullType,
    wrap: fn(T) -> SqlValue,
) -> Result<SqlValue>
where
    T: tokio_postgres::types::FromSql<'r>,
{
    let value: Option<T> = row.try_get(idx).map_err(|e| {
        CopyError::statement_with(format!("failed to decode column {}", idx), e)
    })?;
    Ok(value.map(wrap).unwrap_or(SqlValue::Null(null)))
}

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            SqlValue::Null(_) => Ok(IsNull::Yes),
            SqlValue::Bool(v) => v.to_sql(ty, out),
            // Integers widen to the declared column width so a source's
            // narrower type binds cleanly into a wider target column.
            SqlValue::I16(v) => {
                if *ty == Type::INT8 {
                    (*v as i64).to_sql(ty, out)
                } else if *ty == Type::INT4 {
                    (*v as i32).to_sql(ty, out)
                } else {
                    v.to_sql(ty, out)
                }
            }
            SqlValue::I32(v) => {
                if *ty == Type::INT8 {
                    (*v as i64).to_sql(ty, out)
                } else {
                    v.to_sql(ty, out)
                }
            }
            SqlValue::I64(v) => v.to_sql(ty, out),
            SqlValue::F32(v) => {
                if *ty == Type::FLOAT8 {
                    (*v as f64).to_sql(ty, out)
                } else {
                    v.to_sql(ty, out)
                }
            }
            SqlValue::F64(v) => v.to_sql(ty, out),
            SqlValue::Text(v) => v.as_str().to_sql(ty, out),
            SqlValue::Bytes(v) => v.as_slice().to_sql(ty, out),
            SqlValue::Uuid(v) => v.to_sql(ty, out),
            SqlValue::Decimal(v) => v.to_sql(ty, out),
            SqlValue::DateTime(v) => v.to_sql(ty, out),
            SqlValue::DateTimeOffset(v) => v.to_sql(ty, out),
            SqlValue::Date(v) => v.to_sql(ty, out),
            SqlValue::Time(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // Values are dynamically typed; a genuine mismatch surfaces as a
        // statement fault from the server.
        true
    }

    to_sql_checked!();
}
