//! Turn identifiers.
//!
//! Each assistant turn gets a UUID so log lines and emitted events from the
//! same turn can be correlated.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Turn identifier - identifies a single request/response cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TurnId(Uuid);

impl TurnId {
    /// Create a new random TurnId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from UUID bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Get as UUID
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parse the `turn_<uuid>` display form
    ///
    /// # Errors
    ///
    /// Returns error if the prefix is missing or the UUID is malformed
    pub fn parse(s: &str) -> CoreResult<Self> {
        let raw = s.strip_prefix("turn_").ok_or_else(|| CoreError::InvalidId {
            reason: format!("missing turn_ prefix: {}", s),
        })?;
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|e| CoreError::InvalidId {
                reason: e.to_string(),
            })
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "turn_{}", self.0)
    }
}
