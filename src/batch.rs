//! Batch insert engine.
//!
//! Drains a lazy sequence of rows into fixed-size batches and executes one
//! parameterized insert per batch, strictly sequentially and in input order.
//! A failing batch is dropped and logged by default; the operation keeps
//! going and reports the rows it actually inserted. Optionally the whole run
//! (pre-SQL, every batch, post-SQL) executes inside a single transaction
//! committed once at the end.
//!
//! Fault policy in transactional mode is deliberately asymmetric, matching
//! long-standing behavior callers depend on: per-batch statement faults are
//! still swallowed under [`BatchFailurePolicy::Skip`], while faults raised
//! around the batches (transaction begin, pre/post SQL, commit) propagate
//! and leave the transaction uncommitted. Callers who want a bad batch to
//! fail the operation select [`BatchFailurePolicy::Abort`].

use std::time::Duration;

use futures::{pin_mut, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::client::{with_timeout, SqlSession};
use crate::error::Result;
use crate::value::Row;

/// Default rows per batch outside a transaction.
pub const DEFAULT_BATCH_SIZE: usize = 1_000;

/// Default rows per batch inside a transaction.
pub const DEFAULT_TRANSACTIONAL_BATCH_SIZE: usize = 10_000;

/// What to do when one batch's insert execution faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchFailurePolicy {
    /// Drop the failed batch, log it, and keep draining. The operation
    /// succeeds with the count of rows actually inserted.
    #[default]
    Skip,

    /// Propagate the first batch fault and fail the whole operation. In
    /// transactional mode this leaves the transaction uncommitted.
    Abort,
}

/// Description of one batch insert operation.
#[derive(Debug, Clone)]
pub struct BatchInsert {
    template: String,
    before_sql: Option<String>,
    after_sql: Option<String>,
    batch_size: Option<usize>,
    transactional: bool,
    on_batch_failure: BatchFailurePolicy,
}

impl BatchInsert {
    /// Start describing a batch insert with the given parameterized
    /// insert template.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            before_sql: None,
            after_sql: None,
            batch_size: None,
            transactional: false,
            on_batch_failure: BatchFailurePolicy::default(),
        }
    }

    /// SQL to execute once before the first batch.
    pub fn before_sql(mut self, sql: impl Into<String>) -> Self {
        self.before_sql = Some(sql.into());
        self
    }

    /// SQL to execute once after the last batch.
    pub fn after_sql(mut self, sql: impl Into<String>) -> Self {
        self.after_sql = Some(sql.into());
        self
    }

    /// Rows per batch. When unset, [`DEFAULT_BATCH_SIZE`] applies, or
    /// [`DEFAULT_TRANSACTIONAL_BATCH_SIZE`] in transactional mode.
    pub fn batch_size(mut self, rows: usize) -> Self {
        self.batch_size = Some(rows);
        self
    }

    /// Run pre-SQL, all batches, and post-SQL inside one transaction,
    /// committed once at the end.
    pub fn transactional(mut self, enabled: bool) -> Self {
        self.transactional = enabled;
        self
    }

    /// Select the per-batch fault policy.
    pub fn on_batch_failure(mut self, policy: BatchFailurePolicy) -> Self {
        self.on_batch_failure = policy;
        self
    }

    /// The batch size this operation will actually use.
    #[must_use]
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.unwrap_or(if self.transactional {
            DEFAULT_TRANSACTIONAL_BATCH_SIZE
        } else {
            DEFAULT_BATCH_SIZE
        })
    }
}

/// Accounting for one batch insert run.
#[derive(Debug, Default)]
struct BatchState {
    buffer: Vec<Row>,
    inserted: u64,
    drained: u64,
    skipped: u64,
    failed_batches: u32,
}

/// Execute a batch insert operation on an open session.
pub(crate) async fn run_batches<S, R>(
    session: &mut S,
    operation: &BatchInsert,
    rows: R,
    timeout: Option<Duration>,
) -> Result<u64>
where
    S: SqlSession,
    R: Stream<Item = Row> + Send,
{
    if !operation.transactional {
        return drive(session, operation, rows, timeout).await;
    }

    session.begin().await?;
    info!("transaction started");

    match drive(session, operation, rows, timeout).await {
        Ok(inserted) => {
            session.commit().await?;
            info!("transaction committed");
            Ok(inserted)
        }
        Err(fault) => {
            if let Err(rollback_fault) = session.rollback().await {
                warn!("rollback failed: {}", rollback_fault);
            }
            Err(fault)
        }
    }
}

/// The drain loop, shared by both modes.
async fn drive<S, R>(
    session: &mut S,
    operation: &BatchInsert,
    rows: R,
    timeout: Option<Duration>,
) -> Result<u64>
where
    S: SqlSession,
    R: Stream<Item = Row> + Send,
{
    if let Some(sql) = &operation.before_sql {
        let affected = with_timeout(timeout, session.execute(sql, &[])).await?;
        info!("pre-sql affected {} rows", affected);
    }

    let batch_size = operation.effective_batch_size();
    let mut state = BatchState::default();

    pin_mut!(rows);
    while let Some(row) = rows.next().await {
        state.buffer.push(row);
        if state.buffer.len() == batch_size {
            flush(session, operation, &mut state, timeout).await?;
        }
    }
    if !state.buffer.is_empty() {
        flush(session, operation, &mut state, timeout).await?;
    }

    if state.skipped > 0 {
        warn!(
            "{} rows dropped across {} failed batches",
            state.skipped, state.failed_batches
        );
    }
    info!("batch insert finished, {} rows inserted", state.inserted);

    if let Some(sql) = &operation.after_sql {
        let affected = with_timeout(timeout, session.execute(sql, &[])).await?;
        info!("post-sql affected {} rows", affected);
    }

    Ok(state.inserted)
}

/// Execute the buffered batch. A fault is either swallowed (the batch is
/// dropped and the buffer cleared) or propagated, per the configured policy.
async fn flush<S: SqlSession>(
    session: &mut S,
    operation: &BatchInsert,
    state: &mut BatchState,
    timeout: Option<Duration>,
) -> Result<()> {
    let batch = std::mem::take(&mut state.buffer);
    let batch_rows = batch.len() as u64;
    state.drained += batch_rows;

    match with_timeout(timeout, session.execute_batch(&operation.template, &batch)).await {
        Ok(affected) => {
            state.inserted += affected;
            info!("inserted {} rows so far", state.drained - state.skipped);
            Ok(())
        }
        Err(fault) => match operation.on_batch_failure {
            BatchFailurePolicy::Skip => {
                state.skipped += batch_rows;
                state.failed_batches += 1;
                error!(
                    "error inserting batch at row {}: {}",
                    state.drained - batch_rows,
                    fault
                );
                Ok(())
            }
            BatchFailurePolicy::Abort => Err(fault),
        },
    }
}
