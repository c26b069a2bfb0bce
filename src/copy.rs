//! Database-to-database copy orchestrator.
//!
//! Composes a source query with the batch insert engine to move rows from
//! one database into another, surfacing a single [`Outcome`] with the number
//! of rows inserted. A source failure short-circuits the insert phase: the
//! target never sees a statement.

use futures::stream;
use tracing::info;

use crate::batch::{BatchFailurePolicy, BatchInsert};
use crate::client::SqlConnector;
use crate::config::CopySettings;
use crate::outcome::Outcome;
use crate::tasks::SqlTasks;

/// Moves rows from a source query into a target table.
pub struct DbCopier<S: SqlConnector, T: SqlConnector> {
    source: SqlTasks<S>,
    target: SqlTasks<T>,
    batch_size: Option<usize>,
    transactional: bool,
    on_batch_failure: BatchFailurePolicy,
}

impl<S: SqlConnector, T: SqlConnector> DbCopier<S, T> {
    /// Create a copier from per-side connectors and shared settings.
    pub fn new(source_connector: S, target_connector: T, settings: CopySettings) -> Self {
        Self {
            source: SqlTasks::new(source_connector, settings.source),
            target: SqlTasks::new(target_connector, settings.target),
            batch_size: settings.batch_size,
            transactional: settings.transactional,
            on_batch_failure: settings.on_batch_failure,
        }
    }

    /// Run `select` against the source and batch-insert every row into the
    /// target through `insert`, using the configured batch defaults.
    ///
    /// The source result set is fully materialized before the first insert;
    /// callers with very large sources can stream instead by combining
    /// [`SqlTasks::query`] on their own source with
    /// [`SqlTasks::batch_insert`] on the target.
    pub async fn copy(&self, select: &str, insert: &str) -> Outcome<u64> {
        self.copy_with(select, self.operation(insert)).await
    }

    /// Like [`copy`](Self::copy), with full control over the batch insert
    /// operation (pre/post SQL, batch size, transaction, failure policy).
    pub async fn copy_with(&self, select: &str, operation: BatchInsert) -> Outcome<u64> {
        self.source
            .query(select, &[])
            .await
            .then_async(|rows| async move {
                info!("copying {} rows", rows.len());
                self.target
                    .batch_insert(operation, stream::iter(rows))
                    .await
                    .into_result()
            })
            .await
    }

    fn operation(&self, insert: &str) -> BatchInsert {
        let mut operation = BatchInsert::new(insert)
            .transactional(self.transactional)
            .on_batch_failure(self.on_batch_failure);
        if let Some(rows) = self.batch_size {
            operation = operation.batch_size(rows);
        }
        operation
    }
}
