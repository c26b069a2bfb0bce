//! Error types for copy operations.

use thiserror::Error;

/// Underlying driver fault carried inside a [`CopyError`].
pub type BoxedFault = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for copy operations.
#[derive(Error, Debug)]
pub enum CopyError {
    /// Configuration error (missing connection string, invalid settings, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure to acquire or open a database connection.
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxedFault>,
    },

    /// A single SQL statement (query, pre/post SQL, or one batch insert) faulted.
    #[error("Statement failed: {message}")]
    Statement {
        message: String,
        #[source]
        source: Option<BoxedFault>,
    },

    /// A plain-message operation failure raised by a caller.
    #[error("Operation failed: {0}")]
    Operation(String),

    /// A fault raised while computing a terminal value from an already
    /// successful outcome. Wraps the original cause.
    #[error("Fault while extracting the final value: {message}")]
    FinalExtraction {
        message: String,
        #[source]
        source: Box<CopyError>,
    },

    /// IO error (configuration file loading).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CopyError {
    /// Create a Connection error without an underlying cause.
    pub fn connection(message: impl Into<String>) -> Self {
        CopyError::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a Connection error wrapping a driver fault.
    pub fn connection_with(message: impl Into<String>, source: impl Into<BoxedFault>) -> Self {
        CopyError::Connection {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a Statement error without an underlying cause.
    pub fn statement(message: impl Into<String>) -> Self {
        CopyError::Statement {
            message: message.into(),
            source: None,
        }
    }

    /// Create a Statement error wrapping a driver fault.
    pub fn statement_with(message: impl Into<String>, source: impl Into<BoxedFault>) -> Self {
        CopyError::Statement {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Format error with full details including the cause chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for copy operations.
pub type Result<T> = std::result::Result<T, CopyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_display() {
        let err = CopyError::statement("insert rejected");
        assert_eq!(err.to_string(), "Statement failed: insert rejected");
    }

    #[test]
    fn test_format_detailed_walks_chain() {
        let inner = CopyError::statement_with(
            "insert rejected",
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"),
        );
        let outer = CopyError::FinalExtraction {
            message: "fault while computing the final value".to_string(),
            source: Box::new(inner),
        };

        let detailed = outer.format_detailed();
        assert!(detailed.contains("extracting the final value"));
        assert!(detailed.contains("1: Statement failed: insert rejected"));
        assert!(detailed.contains("2: pipe closed"));
    }

    #[test]
    fn test_connection_without_cause() {
        let err = CopyError::connection("refused");
        assert!(std::error::Error::source(&err).is_none());
    }
}
