//! QUILL Tool System
//!
//! Everything between a raw tool payload and a callable capability:
//! text cleanup, JSON validation, invocation decoding, and the registry of
//! tools a session may dispatch to.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod trait_;
pub mod schema;
pub mod sanitize;
pub mod decode;
pub mod registry;
pub mod builtin;

pub use trait_::{Parameters, Tool, ToolError, ToolOutput};
pub use schema::{ResponseFormat, ToolDescriptor};
pub use sanitize::{sanitize, sanitize_with_report, SanitizeReport};
pub use decode::{decode, is_valid_json, ToolInvocation};
pub use registry::{RegistryError, ToolRegistry, ToolRegistryBuilder};
pub use builtin::{EchoTool, WeatherForecastTool};
