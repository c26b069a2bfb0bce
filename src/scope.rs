//! Scoped connection acquisition with guaranteed release.
//!
//! A [`ConnectionScope`] owns everything needed to open a connection, runs a
//! unit of work against it, and releases the connection on every exit path.
//! Faults raised anywhere inside the scope, including from the work itself,
//! come back as a failed [`Outcome`]; nothing escapes as a raw error.

use futures::future::BoxFuture;
use tracing::debug;

use crate::client::{SqlConnector, SqlSession};
use crate::error::{CopyError, Result};
use crate::outcome::Outcome;

/// Opens a connection per operation and guarantees its release.
pub struct ConnectionScope<C> {
    connector: C,
    connection: Option<String>,
}

impl<C: SqlConnector> ConnectionScope<C> {
    /// Create a scope over an already resolved connection string.
    ///
    /// `None` is permitted here; the missing configuration surfaces as a
    /// failure when the scope is actually used.
    pub fn new(connector: C, connection: Option<String>) -> Self {
        Self {
            connector,
            connection,
        }
    }

    /// The connection string this scope resolves to, if configured.
    #[must_use]
    pub fn connection(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    /// Replace the connection string this scope resolves to.
    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = Some(connection.into());
        self
    }

    /// Acquire a connection, run `work` against it, release the connection,
    /// and return the produced value as an [`Outcome`].
    ///
    /// Release is guaranteed on every exit path: after the work completes
    /// (either way) the session is explicitly closed, and if the enclosing
    /// future is dropped mid-flight the session's own drop releases it.
    pub async fn run<T, F>(&self, work: F) -> Outcome<T>
    where
        F: for<'s> FnOnce(&'s mut C::Session) -> BoxFuture<'s, Result<T>>,
    {
        let connection_string = match &self.connection {
            Some(s) => s.clone(),
            None => {
                return Outcome::from_failure(CopyError::Config(
                    "no connection string configured; pass one explicitly or set a default"
                        .to_string(),
                ))
            }
        };

        let mut session = match self.connector.connect(&connection_string).await {
            Ok(session) => session,
            Err(error) => return Outcome::from_failure(error),
        };

        let produced = work(&mut session).await;

        if let Err(error) = session.close().await {
            debug!("error closing connection: {}", error);
        }

        Outcome::from(produced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SpyDb;
    use futures::FutureExt;

    #[tokio::test]
    async fn test_missing_connection_string_is_config_failure() {
        let db = SpyDb::new();
        let scope = ConnectionScope::new(db.connector(), None);

        let out = scope
            .run(|session| async move { session.execute("SELECT 1", &[]).await }.boxed())
            .await;

        assert!(matches!(out.failure(), Some(CopyError::Config(_))));
        assert_eq!(db.connects(), 0);
    }

    #[tokio::test]
    async fn test_successful_work_closes_connection() {
        let db = SpyDb::new();
        let scope = ConnectionScope::new(db.connector(), Some("spy://".to_string()));

        let out = scope
            .run(|session| async move { session.execute("UPDATE t SET x = 1", &[]).await }.boxed())
            .await;

        assert!(out.is_success());
        assert_eq!(db.connects(), 1);
        assert_eq!(db.closes(), 1);
    }

    #[tokio::test]
    async fn test_work_fault_becomes_failure_and_still_closes() {
        let db = SpyDb::new();
        db.fail_statement("UPDATE");
        let scope = ConnectionScope::new(db.connector(), Some("spy://".to_string()));

        let out = scope
            .run(|session| async move { session.execute("UPDATE t SET x = 1", &[]).await }.boxed())
            .await;

        assert!(matches!(out.failure(), Some(CopyError::Statement { .. })));
        assert_eq!(db.closes(), 1);
    }

    #[tokio::test]
    async fn test_connect_fault_becomes_connection_failure() {
        let db = SpyDb::new();
        db.fail_connect();
        let scope = ConnectionScope::new(db.connector(), Some("spy://".to_string()));

        let out = scope
            .run(|session| async move { session.execute("SELECT 1", &[]).await }.boxed())
            .await;

        assert!(matches!(out.failure(), Some(CopyError::Connection { .. })));
        assert_eq!(db.closes(), 0);
    }
}
