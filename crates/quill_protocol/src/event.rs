//! Events emitted while a turn is parsed.
//!
//! Presentation layers subscribe to these instead of the parser touching any
//! UI state directly.

use serde::{Deserialize, Serialize};

/// Why the fragment stream stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// The `END` marker was seen
    EndMarker,
    /// The source ran out of fragments
    StreamExhausted,
    /// Cancelled from outside the protocol
    Cancelled,
    /// The source failed
    Faulted(String),
}

impl EndReason {
    /// Whether a tool payload collected so far counts as complete
    #[must_use]
    pub const fn completes_payload(&self) -> bool {
        matches!(self, Self::EndMarker | Self::StreamExhausted)
    }
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EndMarker => write!(f, "end marker"),
            Self::StreamExhausted => write!(f, "stream exhausted"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Faulted(reason) => write!(f, "faulted: {}", reason),
        }
    }
}

/// Protocol-level event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolEvent {
    /// Text was added to the friendly message
    FriendlyTextAppended(String),
    /// A complete, non-empty tool payload is available
    ToolPayloadReady(String),
    /// The turn's stream has stopped
    TurnEnded(EndReason),
}
