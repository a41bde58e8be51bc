//! Session configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("Cannot read config {path}: {reason}")]
    Io {
        /// Path that failed
        path: String,
        /// What went wrong
        reason: String,
    },

    /// File is not valid config JSON
    #[error("Cannot parse config: {reason}")]
    Parse {
        /// What went wrong
        reason: String,
    },

    /// A value is out of range
    #[error("Invalid config value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: String,
        /// What went wrong
        reason: String,
    },
}

/// Per-session knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Keep the raw transcript as the reply when no command was opened
    pub plain_text_fallback: bool,
    /// Stop the fragment source as soon as `END` is seen
    pub cancel_on_end: bool,
    /// Budget for a single tool call
    pub tool_timeout_ms: Option<u64>,
    /// Larger payloads are treated as invalid JSON
    pub max_payload_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            plain_text_fallback: true,
            cancel_on_end: true,
            tool_timeout_ms: None,
            max_payload_bytes: 64 * 1024,
        }
    }
}

impl SessionConfig {
    /// Parse and validate config JSON
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed or a value is out of range
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    ///
    /// # Errors
    ///
    /// Returns error if the file is unreadable, malformed, or out of range
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&json)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns error naming the first bad field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_payload_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_payload_bytes".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.tool_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid {
                field: "tool_timeout_ms".to_string(),
                reason: "must be greater than zero when set".to_string(),
            });
        }
        Ok(())
    }

    /// Tool timeout as a duration
    #[must_use]
    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_ms.map(Duration::from_millis)
    }
}
