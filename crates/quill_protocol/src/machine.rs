//! Per-turn protocol state machine.
//!
//! Fragments are applied strictly in arrival order. Exactly one of the
//! friendly and tool buffers is active at a time; every accepted fragment is
//! also kept verbatim in the raw transcript.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::event::{EndReason, ProtocolEvent};
use crate::marker::Marker;

/// Where the machine is within a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolState {
    /// No start marker seen yet
    Idle,
    /// `>` seen, no section chosen
    CommandStarted,
    /// Collecting friendly text
    FriendlyMessage,
    /// Collecting tool payload
    ToolPayload,
    /// `END` seen; terminal
    Ended,
}

impl ProtocolState {
    /// Whether a command has been opened
    #[must_use]
    pub const fn in_command(self) -> bool {
        matches!(
            self,
            Self::CommandStarted | Self::FriendlyMessage | Self::ToolPayload
        )
    }
}

/// Everything a turn produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolOutput {
    /// User-facing text
    pub friendly_text: String,
    /// Collected tool payload, possibly truncated when not complete
    pub tool_payload: String,
    /// Every accepted fragment, verbatim
    pub raw_transcript: String,
    /// Whether `>` was ever seen
    pub saw_start: bool,
    /// Why the stream stopped
    pub end_reason: EndReason,
    /// Whether the tool payload may be dispatched
    pub payload_complete: bool,
    /// Whether the raw transcript was promoted to friendly text
    pub fallback_used: bool,
    /// Fragments applied
    pub fragments: usize,
    /// Fragments dropped after `END`
    pub discarded: usize,
}

impl ProtocolOutput {
    /// Tool payload ready for dispatch, if any
    #[must_use]
    pub fn dispatchable_payload(&self) -> Option<&str> {
        if self.payload_complete && !self.tool_payload.trim().is_empty() {
            Some(&self.tool_payload)
        } else {
            None
        }
    }
}

/// Result of [`ProtocolMachine::finish`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    /// Turn output
    pub output: ProtocolOutput,
    /// Events raised while finishing, ending with `TurnEnded`
    pub events: Vec<ProtocolEvent>,
}

/// Consumes one turn's fragments
#[derive(Debug)]
pub struct ProtocolMachine {
    state: ProtocolState,
    friendly: String,
    tool: String,
    raw: String,
    saw_start: bool,
    fragments: usize,
    discarded: usize,
    plain_text_fallback: bool,
    cancel_on_end: Option<CancellationToken>,
}

impl ProtocolMachine {
    /// Fresh machine in `Idle`, with plain-text fallback enabled
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ProtocolState::Idle,
            friendly: String::new(),
            tool: String::new(),
            raw: String::new(),
            saw_start: false,
            fragments: 0,
            discarded: 0,
            plain_text_fallback: true,
            cancel_on_end: None,
        }
    }

    /// Whether a turn that never opens a command keeps its raw text as the
    /// friendly message
    #[must_use]
    pub fn with_plain_text_fallback(mut self, enabled: bool) -> Self {
        self.plain_text_fallback = enabled;
        self
    }

    /// Token to cancel when `END` is reached, stopping the fragment source
    #[must_use]
    pub fn with_cancel_on_end(mut self, token: CancellationToken) -> Self {
        self.cancel_on_end = Some(token);
        self
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// Whether `END` has been seen
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.state == ProtocolState::Ended
    }

    /// Friendly text so far
    #[must_use]
    pub fn friendly_text(&self) -> &str {
        &self.friendly
    }

    /// Tool payload so far
    #[must_use]
    pub fn tool_payload(&self) -> &str {
        &self.tool
    }

    /// Raw transcript so far
    #[must_use]
    pub fn raw_transcript(&self) -> &str {
        &self.raw
    }

    /// Apply one fragment.
    ///
    /// Returns an event when friendly text grew. Fragments arriving after
    /// `END` are counted and dropped.
    pub fn feed(&mut self, text: &str) -> Option<ProtocolEvent> {
        if self.is_ended() {
            self.discarded += 1;
            debug!(fragment = text, "discarding fragment after END");
            return None;
        }

        self.fragments += 1;
        self.raw.push_str(text);

        match (self.state, Marker::parse(text)) {
            (ProtocolState::Idle, Some(Marker::Start)) => {
                self.saw_start = true;
                self.transition(ProtocolState::CommandStarted);
                None
            }
            // Before `>` every fragment is raw content, markers included.
            (ProtocolState::Idle, _) => None,
            (ProtocolState::Ended, _) => None,
            // A repeated start inside a command carries no meaning.
            (_, Some(Marker::Start)) => None,
            (_, Some(Marker::Friendly)) => {
                self.transition(ProtocolState::FriendlyMessage);
                None
            }
            (_, Some(Marker::Tool)) => {
                self.transition(ProtocolState::ToolPayload);
                None
            }
            (_, Some(Marker::End)) => {
                self.transition(ProtocolState::Ended);
                if let Some(token) = &self.cancel_on_end {
                    token.cancel();
                }
                None
            }
            (ProtocolState::FriendlyMessage, None) => {
                if text.is_empty() {
                    return None;
                }
                self.friendly.push_str(text);
                Some(ProtocolEvent::FriendlyTextAppended(text.to_string()))
            }
            (ProtocolState::ToolPayload, None) => {
                self.tool.push_str(text);
                None
            }
            (ProtocolState::CommandStarted, None) => None,
        }
    }

    /// Close the turn.
    ///
    /// A machine that reached `END` always reports [`EndReason::EndMarker`].
    /// The tool payload only counts as complete after `END` or a clean end
    /// of stream.
    #[must_use]
    pub fn finish(self, reason: EndReason) -> Finished {
        let end_reason = if self.is_ended() {
            EndReason::EndMarker
        } else {
            reason
        };

        let mut events = Vec::new();

        let fallback_used = self.plain_text_fallback && !self.saw_start && !self.raw.is_empty();
        let friendly_text = if fallback_used {
            debug!("no start marker seen; using raw transcript as friendly text");
            events.push(ProtocolEvent::FriendlyTextAppended(self.raw.clone()));
            self.raw.clone()
        } else {
            self.friendly
        };

        let payload_complete = end_reason.completes_payload();
        if payload_complete && !self.tool.trim().is_empty() {
            events.push(ProtocolEvent::ToolPayloadReady(self.tool.clone()));
        }
        events.push(ProtocolEvent::TurnEnded(end_reason.clone()));

        Finished {
            output: ProtocolOutput {
                friendly_text,
                tool_payload: self.tool,
                raw_transcript: self.raw,
                saw_start: self.saw_start,
                end_reason,
                payload_complete,
                fallback_used,
                fragments: self.fragments,
                discarded: self.discarded,
            },
            events,
        }
    }

    fn transition(&mut self, to: ProtocolState) {
        debug!(from = ?self.state, to = ?to, "protocol transition");
        self.state = to;
    }
}

impl Default for ProtocolMachine {
    fn default() -> Self {
        Self::new()
    }
}
