//! Scripted spy backend for engine and orchestrator tests.
//!
//! `SpyDb` hands out connectors and sessions that share one recorded state:
//! every statement, transaction-control call, connect, and close is logged,
//! and failures can be injected per statement, per batch index, or on the
//! query/connect path.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::client::{SqlConnector, SqlSession};
use crate::error::{CopyError, Result};
use crate::value::Row;

/// One recorded interaction with the spy database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SpyCall {
    Execute(String),
    Batch { sql: String, rows: usize },
    Query(String),
    Begin,
    Commit,
    Rollback,
}

#[derive(Default)]
struct SpyState {
    calls: Vec<SpyCall>,
    connects: usize,
    closes: usize,
    batch_calls: usize,
    fail_batches: HashSet<usize>,
    fail_statements: Vec<String>,
    fail_connect: bool,
    fail_query: bool,
    query_rows: Vec<Row>,
}

/// Shared handle over a scripted spy database.
#[derive(Clone, Default)]
pub(crate) struct SpyDb {
    state: Arc<Mutex<SpyState>>,
}

impl SpyDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> SpyConnector {
        SpyConnector {
            state: self.state.clone(),
        }
    }

    /// A session outside any connector, for engine-level tests.
    pub fn session(&self) -> SpySession {
        SpySession {
            state: self.state.clone(),
        }
    }

    // ===== Scripting =====

    /// Fail the `index`-th batch execution (0-based).
    pub fn fail_batch(&self, index: usize) {
        self.state.lock().unwrap().fail_batches.insert(index);
    }

    /// Fail any executed statement containing `sql_fragment`.
    pub fn fail_statement(&self, sql_fragment: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_statements
            .push(sql_fragment.to_string());
    }

    pub fn fail_connect(&self) {
        self.state.lock().unwrap().fail_connect = true;
    }

    pub fn fail_query(&self) {
        self.state.lock().unwrap().fail_query = true;
    }

    pub fn set_query_rows(&self, rows: Vec<Row>) {
        self.state.lock().unwrap().query_rows = rows;
    }

    // ===== Assertions =====

    pub fn calls(&self) -> Vec<SpyCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Row counts of every batch execution, in order (failed ones included).
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SpyCall::Batch { rows, .. } => Some(rows),
                _ => None,
            })
            .collect()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    pub fn committed(&self) -> bool {
        self.calls().contains(&SpyCall::Commit)
    }

    pub fn rolled_back(&self) -> bool {
        self.calls().contains(&SpyCall::Rollback)
    }
}

#[derive(Clone)]
pub(crate) struct SpyConnector {
    state: Arc<Mutex<SpyState>>,
}

pub(crate) struct SpySession {
    state: Arc<Mutex<SpyState>>,
}

#[async_trait]
impl SqlConnector for SpyConnector {
    type Session = SpySession;

    async fn connect(&self, _connection_string: &str) -> Result<SpySession> {
        let mut state = self.state.lock().unwrap();
        if state.fail_connect {
            return Err(CopyError::connection("injected connect failure"));
        }
        state.connects += 1;
        Ok(SpySession {
            state: self.state.clone(),
        })
    }
}

#[async_trait]
impl SqlSession for SpySession {
    async fn execute(&mut self, sql: &str, _params: &[crate::value::SqlValue]) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(SpyCall::Execute(sql.to_string()));
        if state.fail_statements.iter().any(|f| sql.contains(f.as_str())) {
            return Err(CopyError::statement(format!(
                "injected statement failure: [{}]",
                sql
            )));
        }
        Ok(1)
    }

    async fn execute_batch(&mut self, sql: &str, rows: &[Row]) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let index = state.batch_calls;
        state.batch_calls += 1;
        state.calls.push(SpyCall::Batch {
            sql: sql.to_string(),
            rows: rows.len(),
        });
        if state.fail_batches.contains(&index) {
            return Err(CopyError::statement(format!(
                "injected batch failure at batch {}",
                index
            )));
        }
        Ok(rows.len() as u64)
    }

    async fn query(&mut self, sql: &str, _params: &[crate::value::SqlValue]) -> Result<Vec<Row>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(SpyCall::Query(sql.to_string()));
        if state.fail_query {
            return Err(CopyError::statement(format!(
                "injected query failure: [{}]",
                sql
            )));
        }
        Ok(state.query_rows.clone())
    }

    async fn begin(&mut self) -> Result<()> {
        self.state.lock().unwrap().calls.push(SpyCall::Begin);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.state.lock().unwrap().calls.push(SpyCall::Commit);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.state.lock().unwrap().calls.push(SpyCall::Rollback);
        Ok(())
    }

    async fn close(self) -> Result<()> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}
