//! Sequence configuration
//!
//! Loaded from a JSON document. Every field is optional:
//!
//! ```json
//! { "null_ordering": "greatest", "log_level": "WARN" }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{QueryError, QueryResult};
use crate::executor::NullOrdering;
use crate::observability::{Event, Logger, Severity};

/// Engine configuration shared by a composition and its clones
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceConfig {
    /// Where nulls sort relative to populated values (default "greatest")
    #[serde(default)]
    pub null_ordering: NullOrdering,

    /// Minimum log severity (default "WARN")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "WARN".to_string()
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            null_ordering: NullOrdering::default(),
            log_level: default_log_level(),
        }
    }
}

impl SequenceConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> QueryResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| QueryError::Config(format!("Failed to read config: {}", e)))?;

        let config = Self::from_json(&content)?;

        Logger::info(
            Event::ConfigLoaded.as_str(),
            &[
                ("path", &path.display().to_string()),
                ("null_ordering", config.null_ordering.as_str()),
            ],
        );

        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json(content: &str) -> QueryResult<Self> {
        let config: SequenceConfig = serde_json::from_str(content)
            .map_err(|e| QueryError::Config(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate field values
    pub fn validate(&self) -> QueryResult<()> {
        self.severity().map(|_| ())
    }

    /// Returns the configured log threshold
    pub fn severity(&self) -> QueryResult<Severity> {
        Severity::parse(&self.log_level).ok_or_else(|| {
            QueryError::Config(format!("Unknown log level '{}'", self.log_level))
        })
    }

    /// Installs the log threshold process-wide
    pub fn apply_logging(&self) -> QueryResult<()> {
        Logger::set_min_severity(self.severity()?);
        Ok(())
    }

    /// Sets the null ordering policy
    pub fn with_null_ordering(mut self, null_ordering: NullOrdering) -> Self {
        self.null_ordering = null_ordering;
        self
    }
}
