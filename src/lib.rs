//! # sqlcopy
//!
//! Batched SQL data movement between databases with result-based error
//! propagation.
//!
//! This library does two things:
//!
//! - **Moves rows**: a source query feeds a batch insert engine that groups
//!   rows into fixed-size parameterized batches, with optional pre/post SQL,
//!   an optional single enclosing transaction, and partial-failure
//!   accounting (a bad batch is dropped and logged, not fatal, unless you
//!   ask for [`BatchFailurePolicy::Abort`]).
//! - **Contains faults**: every operation returns an [`Outcome`], either a
//!   success value or a captured [`CopyError`], so call sites chain and consume results
//!   instead of handling raw propagated errors. Connections are opened one
//!   per operation and released on every exit path.
//!
//! Two backends are included: SQL Server ([`MssqlConnector`], tiberius) and
//! PostgreSQL ([`PgConnector`], tokio-postgres). The engine itself only
//! speaks the [`SqlConnector`]/[`SqlSession`] traits.
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqlcopy::{ClientSettings, CopySettings, DbCopier, MssqlConnector, PgConnector};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut settings = CopySettings::new(
//!         ClientSettings::new("Server=tcp:legacy,1433;Database=app;User Id=sa;Password=secret")
//!             .command_timeout(300),
//!         ClientSettings::new("host=warehouse user=app password=secret dbname=app"),
//!     );
//!     settings.batch_size = Some(500);
//!
//!     let copier = DbCopier::new(MssqlConnector::new(), PgConnector::new(), settings);
//!     copier
//!         .copy(
//!             "SELECT id, name FROM dbo.users",
//!             "INSERT INTO users (id, name) VALUES ($1, $2)",
//!         )
//!         .await
//!         .consume(
//!             |rows| println!("copied {rows} rows"),
//!             |fault| eprintln!("{}", fault.format_detailed()),
//!         );
//! }
//! ```

pub mod batch;
pub mod client;
pub mod config;
pub mod copy;
pub mod error;
pub mod outcome;
pub mod scope;
pub mod tasks;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access
pub use batch::{
    BatchFailurePolicy, BatchInsert, DEFAULT_BATCH_SIZE, DEFAULT_TRANSACTIONAL_BATCH_SIZE,
};
pub use client::{MssqlConnector, MssqlSession, PgConnector, PgSession, SqlConnector, SqlSession};
pub use config::{ClientSettings, CopySettings};
pub use copy::DbCopier;
pub use error::{CopyError, Result};
pub use outcome::Outcome;
pub use scope::ConnectionScope;
pub use tasks::SqlTasks;
pub use value::{Row, SqlNullType, SqlValue};
