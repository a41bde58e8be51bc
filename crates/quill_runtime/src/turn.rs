//! Turn lifecycle.

use quill_core::{Message, TurnId};
use quill_protocol::{EndReason, ProtocolEvent, ProtocolOutput};
use serde::Serialize;

use crate::dispatcher::DispatchReport;

/// Where a turn is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TurnPhase {
    /// Not started
    Idle,
    /// Consuming fragments
    Streaming,
    /// Stream ended normally
    Completed,
    /// Stream stopped by the user
    Cancelled,
    /// Stream failed
    Faulted,
    /// Looking for a tool payload
    ToolDetection,
    /// At least one tool ran successfully and none failed
    ToolExecuted,
    /// Nothing was dispatched
    NoToolDetected,
    /// At least one tool failed
    ToolExecutionFailed,
    /// Done
    TurnComplete,
}

impl TurnPhase {
    /// Whether `next` may follow `self`
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use TurnPhase::*;
        matches!(
            (self, next),
            (Idle, Streaming)
                | (Streaming, Completed | Cancelled | Faulted)
                | (Completed | Cancelled | Faulted, ToolDetection)
                | (ToolDetection, ToolExecuted | NoToolDetected | ToolExecutionFailed)
                | (ToolExecuted | NoToolDetected | ToolExecutionFailed, TurnComplete)
        )
    }

    /// Whether the turn is over
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::TurnComplete)
    }

    /// Phase reached when the stream stops for `reason`
    #[must_use]
    pub fn after_stream(reason: &EndReason) -> Self {
        match reason {
            EndReason::EndMarker | EndReason::StreamExhausted => Self::Completed,
            EndReason::Cancelled => Self::Cancelled,
            EndReason::Faulted(_) => Self::Faulted,
        }
    }

    /// Phase reached after tool detection
    #[must_use]
    pub fn after_dispatch(report: Option<&DispatchReport>) -> Self {
        match report {
            Some(r) if r.failed() > 0 => Self::ToolExecutionFailed,
            Some(r) if r.executed() > 0 => Self::ToolExecuted,
            _ => Self::NoToolDetected,
        }
    }
}

impl std::fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Notification for presentation layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TurnEvent {
    /// The turn moved to a new phase
    PhaseChanged(TurnPhase),
    /// The protocol machine produced an event
    Protocol(ProtocolEvent),
    /// A tool result or error was appended to history
    MessageAppended(Message),
}

/// Everything known about a finished turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnOutcome {
    /// Turn identifier
    pub turn_id: TurnId,
    /// Phases visited, in order
    pub phases: Vec<TurnPhase>,
    /// Protocol machine result
    pub protocol: ProtocolOutput,
    /// Tool dispatch result, if a payload was dispatched
    pub dispatch: Option<DispatchReport>,
}

impl TurnOutcome {
    /// Phases visited, in order
    #[must_use]
    pub fn phase_history(&self) -> &[TurnPhase] {
        &self.phases
    }

    /// Last phase reached
    #[must_use]
    pub fn final_phase(&self) -> TurnPhase {
        self.phases.last().copied().unwrap_or(TurnPhase::Idle)
    }

    /// What the model actually emitted, markers included
    #[must_use]
    pub fn raw_transcript(&self) -> &str {
        &self.protocol.raw_transcript
    }

    /// Post-processed reply text
    #[must_use]
    pub fn friendly_text(&self) -> &str {
        &self.protocol.friendly_text
    }

    /// Whether the turn stopped on user cancellation
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.phases.contains(&TurnPhase::Cancelled)
    }
}
