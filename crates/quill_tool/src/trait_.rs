//! Tool trait

use async_trait::async_trait;

use crate::schema::{ResponseFormat, ToolDescriptor};

/// Parameter mapping handed to a tool
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// Text produced by a successful tool run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Result body, folded into the conversation as-is
    pub text: String,
    /// How the body should be rendered
    pub format: ResponseFormat,
}

impl ToolOutput {
    /// Plain text output
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: ResponseFormat::Text,
        }
    }

    /// HTML output
    #[must_use]
    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: ResponseFormat::Html,
        }
    }
}

/// Failure raised by a tool while executing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// A required parameter was not supplied
    #[error("Missing parameter: {name}")]
    MissingParameter {
        /// Parameter name
        name: String,
    },

    /// A parameter had the wrong shape
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// What went wrong
        reason: String,
    },

    /// The tool ran but could not produce a result
    #[error("Execution failed: {reason}")]
    ExecutionFailed {
        /// What went wrong
        reason: String,
    },

    /// The tool did not finish in time
    #[error("Tool {tool} timed out after {millis}ms")]
    Timeout {
        /// Tool name
        tool: String,
        /// Budget that was exceeded
        millis: u64,
    },
}

/// A named capability the model may invoke.
///
/// Implementations may suspend on I/O; the dispatcher awaits each call before
/// starting the next so results land in history in payload order.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Static description of the tool
    fn descriptor(&self) -> &ToolDescriptor;

    /// Name used for dispatch lookup
    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Run the tool against one parameter mapping
    ///
    /// # Errors
    ///
    /// Returns error if parameters are unusable or the work itself fails
    async fn execute(&self, parameters: &Parameters) -> Result<ToolOutput, ToolError>;
}
