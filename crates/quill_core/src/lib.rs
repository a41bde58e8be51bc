//! QUILL Core Types
//!
//! Pure types shared by every layer of the turn pipeline. No I/O lives here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod id;
pub mod message;

// Re-exports
pub use error::{CoreError, CoreResult};
pub use id::TurnId;
pub use message::{Fragment, Message, Role};
