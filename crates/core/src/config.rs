//! Filename conventions for migration files
//!
//! Deployments disagree on how forward, backward and non-transactional
//! migration files are marked, so every marker is configurable. An empty
//! marker disables it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_FORWARD_SUFFIX: &str = "";
pub const DEFAULT_BACKWARD_SUFFIX: &str = ".back";
pub const DEFAULT_NO_TX_SUFFIX: &str = ".notx";
pub const DEFAULT_EXTENSION: &str = ".sql";

/// Suffixes and extension recognised by the filename parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilenameConfig {
    /// Suffix marking a forward step (may be empty)
    pub forward: String,
    /// Suffix marking a backward step (may be empty)
    pub backward: String,
    /// Suffix marking a step that must run outside a transaction
    pub no_tx: String,
    /// Extension every migration file must carry (may be empty)
    pub extension: String,
}

impl Default for FilenameConfig {
    fn default() -> Self {
        Self {
            forward: DEFAULT_FORWARD_SUFFIX.to_string(),
            backward: DEFAULT_BACKWARD_SUFFIX.to_string(),
            no_tx: DEFAULT_NO_TX_SUFFIX.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

impl FilenameConfig {
    pub fn new(
        forward: impl Into<String>,
        backward: impl Into<String>,
        no_tx: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            forward: forward.into(),
            backward: backward.into(),
            no_tx: no_tx.into(),
            extension: extension.into(),
        }
    }

    /// Reject combinations the parser can't disambiguate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.forward.is_empty() && self.forward == self.backward {
            return Err(ConfigError::ValidationFailed {
                field: "fwd/bwd".to_string(),
                reason: "the forward and backward suffixes can't have the same non-empty value"
                    .to_string(),
            });
        }

        if self.no_tx.is_empty() {
            return Err(ConfigError::ValidationFailed {
                field: "notx".to_string(),
                reason: "the no-transaction suffix can't be an empty string".to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required option: {option}")]
    Missing { option: String },

    #[error("Invalid value for {field}: '{value}', expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Validation failed for {field}: {reason}")]
    ValidationFailed { field: String, reason: String },
}
