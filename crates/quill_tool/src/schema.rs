//! Tool descriptors.

use serde::{Deserialize, Serialize};

/// Rendering hint for a tool's output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Render as HTML
    Html,
    /// Render as plain text
    #[default]
    Text,
}

impl ResponseFormat {
    /// Parse a hint, ignoring case and surrounding whitespace.
    ///
    /// Unknown hints yield `None` rather than an error.
    #[must_use]
    pub fn parse(hint: &str) -> Option<Self> {
        match hint.trim().to_ascii_lowercase().as_str() {
            "html" => Some(Self::Html),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Static description of a tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Dispatch name, matched case-sensitively
    pub name: String,
    /// What the tool does
    pub description: String,
    /// Human-readable sketch of the expected parameters
    pub parameter_hint: String,
    /// Preferred rendering of the tool's output
    pub response_format: ResponseFormat,
}

impl ToolDescriptor {
    /// Create a descriptor with empty description and hint
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            parameter_hint: String::new(),
            response_format: ResponseFormat::Text,
        }
    }

    /// Set description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set parameter hint
    #[must_use]
    pub fn with_parameter_hint(mut self, hint: impl Into<String>) -> Self {
        self.parameter_hint = hint.into();
        self
    }

    /// Set response format
    #[must_use]
    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }
}
