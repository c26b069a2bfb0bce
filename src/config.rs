//! Configuration types, YAML loading, and validation.
//!
//! Connection strings and timeouts are explicit values injected where they
//! are needed; there is no process-wide default. Settings can be built in
//! code or loaded from a YAML file, in which case [`CopySettings::validate`]
//! runs before the settings are handed back.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::batch::BatchFailurePolicy;
use crate::error::{CopyError, Result};

/// Settings for one database side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Connection string. Backend-specific: ADO-style for SQL Server,
    /// `host=... user=...` for PostgreSQL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,

    /// Command timeout applied uniformly to every statement. `None` means
    /// no limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_timeout_secs: Option<u64>,
}

impl ClientSettings {
    /// Settings with a connection string and no command timeout.
    pub fn new(connection: impl Into<String>) -> Self {
        Self {
            connection: Some(connection.into()),
            command_timeout_secs: None,
        }
    }

    /// Set the command timeout in seconds.
    pub fn command_timeout(mut self, secs: u64) -> Self {
        self.command_timeout_secs = Some(secs);
        self
    }

    pub(crate) fn timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}

/// Settings for a database-to-database copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopySettings {
    /// Source database settings.
    pub source: ClientSettings,

    /// Target database settings.
    pub target: ClientSettings,

    /// Rows per batch; per-mode defaults apply when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    /// Run each copy inside a single transaction on the target.
    #[serde(default)]
    pub transactional: bool,

    /// What a failing batch does to the overall operation.
    #[serde(default)]
    pub on_batch_failure: BatchFailurePolicy,
}

impl CopySettings {
    /// Settings with batch defaults left to the engine.
    pub fn new(source: ClientSettings, target: ClientSettings) -> Self {
        Self {
            source,
            target,
            batch_size: None,
            transactional: false,
            on_batch_failure: BatchFailurePolicy::default(),
        }
    }

    /// Load settings from a YAML file and validate them.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse settings from a YAML string and validate them.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: CopySettings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<()> {
        if self.source.connection.as_deref().unwrap_or("").is_empty() {
            return Err(CopyError::Config(
                "source connection string is required".to_string(),
            ));
        }
        if self.target.connection.as_deref().unwrap_or("").is_empty() {
            return Err(CopyError::Config(
                "target connection string is required".to_string(),
            ));
        }
        if self.batch_size == Some(0) {
            return Err(CopyError::Config("batch_size must be at least 1".to_string()));
        }
        for (side, client) in [("source", &self.source), ("target", &self.target)] {
            if client.command_timeout_secs == Some(0) {
                return Err(CopyError::Config(format!(
                    "{} command_timeout_secs must be at least 1",
                    side
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_YAML: &str = r#"
source:
  connection: "Server=tcp:legacy,1433;Database=app;User Id=sa;Password=x"
target:
  connection: "host=warehouse user=app password=x dbname=app"
"#;

    #[test]
    fn test_from_yaml_applies_defaults() {
        let settings = CopySettings::from_yaml(MINIMAL_YAML).unwrap();
        assert_eq!(settings.batch_size, None);
        assert!(!settings.transactional);
        assert_eq!(settings.on_batch_failure, BatchFailurePolicy::Skip);
        assert_eq!(settings.source.command_timeout_secs, None);
    }

    #[test]
    fn test_from_yaml_reads_batch_options() {
        let yaml = format!(
            "{}batch_size: 500\ntransactional: true\non_batch_failure: abort\n",
            MINIMAL_YAML
        );
        let settings = CopySettings::from_yaml(&yaml).unwrap();
        assert_eq!(settings.batch_size, Some(500));
        assert!(settings.transactional);
        assert_eq!(settings.on_batch_failure, BatchFailurePolicy::Abort);
    }

    #[test]
    fn test_missing_target_connection_is_rejected() {
        let yaml = r#"
source:
  connection: "Server=tcp:legacy,1433;Database=app;User Id=sa;Password=x"
target: {}
"#;
        let result = CopySettings::from_yaml(yaml);
        assert!(matches!(result, Err(CopyError::Config(_))));
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let yaml = format!("{}batch_size: 0\n", MINIMAL_YAML);
        assert!(matches!(
            CopySettings::from_yaml(&yaml),
            Err(CopyError::Config(_))
        ));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let mut settings = CopySettings::new(
            ClientSettings::new("src").command_timeout(0),
            ClientSettings::new("dst"),
        );
        assert!(settings.validate().is_err());

        settings.source.command_timeout_secs = Some(30);
        assert!(settings.validate().is_ok());
    }
}
