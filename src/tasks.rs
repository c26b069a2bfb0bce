//! Per-database task runner.
//!
//! A [`SqlTasks`] binds a connector and settings to one database and exposes
//! the operations callers actually use: execute, query, query-and-map, and
//! batch insert. Every operation opens its own scoped connection and returns
//! an [`Outcome`]; no fault from the database layer escapes as a raw error.

use std::time::Duration;

use futures::{FutureExt, Stream};
use tracing::info;

use crate::batch::{self, BatchInsert};
use crate::client::{with_timeout, SqlConnector, SqlSession};
use crate::config::ClientSettings;
use crate::outcome::Outcome;
use crate::scope::ConnectionScope;
use crate::value::{Row, SqlValue};

/// Runs SQL operations against one database, one connection per operation.
pub struct SqlTasks<C: SqlConnector> {
    scope: ConnectionScope<C>,
    command_timeout: Option<Duration>,
    trace: bool,
}

impl<C: SqlConnector> SqlTasks<C> {
    /// Create a task runner from a connector and settings.
    pub fn new(connector: C, settings: ClientSettings) -> Self {
        let command_timeout = settings.timeout();
        Self {
            scope: ConnectionScope::new(connector, settings.connection),
            command_timeout,
            trace: false,
        }
    }

    /// Override the connection string for this runner, replacing the
    /// configured default.
    pub fn with_connection_string(mut self, connection: impl Into<String>) -> Self {
        self.scope = self.scope.with_connection(connection);
        self
    }

    /// Log the start and end of every executed statement.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }

    /// Execute a single statement, returning the affected-row count.
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> Outcome<u64> {
        if self.trace {
            info!("start executing sql [{}]", sql);
        }

        let statement = sql.to_owned();
        let bound = params.to_vec();
        let timeout = self.command_timeout;
        let outcome = self
            .scope
            .run(move |session| {
                async move { with_timeout(timeout, session.execute(&statement, &bound)).await }
                    .boxed()
            })
            .await;

        if self.trace {
            info!("end executing sql [{}]", sql);
        }
        outcome
    }

    /// Run a query and materialize its result set.
    pub async fn query(&self, sql: &str, params: &[SqlValue]) -> Outcome<Vec<Row>> {
        let statement = sql.to_owned();
        let bound = params.to_vec();
        let timeout = self.command_timeout;
        self.scope
            .run(move |session| {
                async move { with_timeout(timeout, session.query(&statement, &bound)).await }
                    .boxed()
            })
            .await
    }

    /// Run a query and map every row through `map`.
    pub async fn query_map<U>(
        &self,
        sql: &str,
        params: &[SqlValue],
        map: impl FnMut(Row) -> U,
    ) -> Outcome<Vec<U>> {
        self.query(sql, params)
            .await
            .then(|rows| Ok(rows.into_iter().map(map).collect()))
    }

    /// Drain `rows` through the batch insert engine inside one scoped
    /// connection. See [`BatchInsert`] for the knobs.
    pub async fn batch_insert<R>(&self, operation: BatchInsert, rows: R) -> Outcome<u64>
    where
        R: Stream<Item = Row> + Send + 'static,
    {
        let timeout = self.command_timeout;
        self.scope
            .run(move |session| {
                async move { batch::run_batches(session, &operation, rows, timeout).await }.boxed()
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CopyError;
    use crate::testing::SpyDb;
    use crate::value::SqlValue;
    use futures::stream;

    fn settings() -> ClientSettings {
        ClientSettings::new("spy://db")
    }

    #[tokio::test]
    async fn test_execute_returns_affected_count() {
        let db = SpyDb::new();
        let tasks = SqlTasks::new(db.connector(), settings());

        let out = tasks.execute("UPDATE t SET x = 1", &[]).await;
        assert_eq!(out.success(), Some(&1));
        assert_eq!(db.connects(), 1);
        assert_eq!(db.closes(), 1);
    }

    #[tokio::test]
    async fn test_query_map_projects_rows() {
        let db = SpyDb::new();
        db.set_query_rows(vec![
            vec![SqlValue::I32(1), SqlValue::Text("a".to_string())],
            vec![SqlValue::I32(2), SqlValue::Text("b".to_string())],
        ]);
        let tasks = SqlTasks::new(db.connector(), settings());

        let out = tasks
            .query_map("SELECT id, name FROM t", &[], |row| match &row[0] {
                SqlValue::I32(id) => *id,
                _ => -1,
            })
            .await;

        assert_eq!(out.success(), Some(&vec![1, 2]));
    }

    #[tokio::test]
    async fn test_missing_connection_surfaces_as_config_failure() {
        let db = SpyDb::new();
        let tasks = SqlTasks::new(db.connector(), ClientSettings::default());

        let out = tasks.execute("SELECT 1", &[]).await;
        assert!(matches!(out.failure(), Some(CopyError::Config(_))));
    }

    #[tokio::test]
    async fn test_connection_override_replaces_default() {
        let db = SpyDb::new();
        let tasks =
            SqlTasks::new(db.connector(), ClientSettings::default()).with_connection_string("spy://other");

        let out = tasks.execute("SELECT 1", &[]).await;
        assert!(out.is_success());
    }

    #[tokio::test]
    async fn test_batch_insert_runs_in_one_scope() {
        let db = SpyDb::new();
        let tasks = SqlTasks::new(db.connector(), settings());

        let rows: Vec<Row> = (0..5).map(|i| vec![SqlValue::I32(i)]).collect();
        let out = tasks
            .batch_insert(
                BatchInsert::new("INSERT INTO t (id) VALUES (@P1)").batch_size(2),
                stream::iter(rows),
            )
            .await;

        assert_eq!(out.success(), Some(&5));
        assert_eq!(db.connects(), 1);
        assert_eq!(db.batch_sizes(), vec![2, 2, 1]);
    }
}
