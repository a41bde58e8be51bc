//! QUILL Runtime
//!
//! Drives one assistant turn at a time: pulls fragments from the inference
//! engine, feeds the protocol machine, dispatches any tool payload, and folds
//! results into the conversation history.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod source;
pub mod dispatcher;
pub mod turn;
pub mod conversation;

pub use config::{ConfigError, SessionConfig};
pub use source::{FragmentSource, FragmentStream, ScriptedSource, SourceError, Split};
pub use dispatcher::{DispatchOutcome, DispatchReport, Dispatcher, InvocationRecord, InvocationStatus};
pub use turn::{TurnEvent, TurnOutcome, TurnPhase};
pub use conversation::Conversation;
