//! QUILL Protocol
//!
//! Splits one assistant turn's fragment stream into friendly text and tool
//! payload using the four reserved markers:
//!
//! ```text
//! >! <friendly message text> ># {"name": "<tool>", "arguments": {...}} >END
//! ```
//!
//! A marker is only recognized when a whole fragment, trimmed, equals it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod marker;
pub mod event;
pub mod machine;

pub use marker::Marker;
pub use event::{EndReason, ProtocolEvent};
pub use machine::{Finished, ProtocolMachine, ProtocolOutput, ProtocolState};
