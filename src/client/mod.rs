//! Database client seams.
//!
//! The engine never talks to a driver directly: it goes through
//! [`SqlConnector`] (open a connection) and [`SqlSession`] (execute
//! statements on one open connection). Two backends are provided:
//!
//! - [`MssqlConnector`]: SQL Server over tiberius
//! - [`PgConnector`]: PostgreSQL over tokio-postgres
//!
//! A session is exclusively owned for the duration of one operation and is
//! released when the owning scope ends; see [`crate::scope`].

mod mssql;
mod postgres;

pub use mssql::{MssqlConnector, MssqlSession};
pub use postgres::{PgConnector, PgSession};

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CopyError, Result};
use crate::value::{Row, SqlValue};

/// One open database connection.
///
/// Transaction control is session-level state: statements issued between
/// [`begin`](SqlSession::begin) and [`commit`](SqlSession::commit) run inside
/// the open transaction.
#[async_trait]
pub trait SqlSession: Send {
    /// Execute a single statement, returning the affected-row count.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    /// Execute a parameterized statement once per row of `rows`, returning
    /// the cumulative affected-row count.
    ///
    /// This is the bulk primitive behind batch inserts: the template carries
    /// the placeholders for one row, and the whole batch is submitted as one
    /// parameter set.
    async fn execute_batch(&mut self, sql: &str, rows: &[Row]) -> Result<u64>;

    /// Run a query and materialize its result set.
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>>;

    /// Open a transaction on this session.
    async fn begin(&mut self) -> Result<()>;

    /// Commit the open transaction.
    async fn commit(&mut self) -> Result<()>;

    /// Roll back the open transaction.
    async fn rollback(&mut self) -> Result<()>;

    /// Close the connection.
    async fn close(self) -> Result<()>;
}

/// Opens [`SqlSession`]s from a connection string.
#[async_trait]
pub trait SqlConnector: Send + Sync {
    /// The session type this connector produces.
    type Session: SqlSession;

    /// Acquire and open a connection.
    async fn connect(&self, connection_string: &str) -> Result<Self::Session>;
}

/// Apply the uniform command timeout to one statement execution.
///
/// `None` means no limit. A timed-out statement surfaces as a
/// [`CopyError::Statement`] like any other statement fault.
pub(crate) async fn with_timeout<T, F>(limit: Option<Duration>, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(duration) => match tokio::time::timeout(duration, operation).await {
            Ok(result) => result,
            Err(_) => Err(CopyError::statement(format!(
                "statement timed out after {}s",
                duration.as_secs()
            ))),
        },
        None => operation.await,
    }
}
