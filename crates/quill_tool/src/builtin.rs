//! Builtin tools.
//!
//! These stand in for real integrations: they honor the invocation contract
//! without reaching any external service.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::schema::{ResponseFormat, ToolDescriptor};
use crate::trait_::{Parameters, Tool, ToolError, ToolOutput};

/// All builtin tools, in registration order
#[must_use]
pub fn all() -> Vec<Arc<dyn Tool>> {
    vec![Arc::new(WeatherForecastTool::new()), Arc::new(EchoTool::new())]
}

/// Weather lookup - reports which city was asked for
pub struct WeatherForecastTool {
    descriptor: ToolDescriptor,
}

impl WeatherForecastTool {
    /// Dispatch name
    pub const NAME: &'static str = "GetWeatherForecast";

    /// Create the tool
    #[must_use]
    pub fn new() -> Self {
        Self {
            descriptor: ToolDescriptor::new(Self::NAME)
                .with_description(
                    "Use for anything related to the weather forecast. Requires a city name.",
                )
                .with_parameter_hint(r#"[{ "city": "string (city name)" }]"#)
                .with_response_format(ResponseFormat::Html),
        }
    }
}

impl Default for WeatherForecastTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WeatherForecastTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, parameters: &Parameters) -> Result<ToolOutput, ToolError> {
        let city = match parameters.get("city") {
            Some(Value::String(city)) if !city.trim().is_empty() => city.trim().to_string(),
            Some(Value::String(_)) | None | Some(Value::Null) => {
                return Err(ToolError::MissingParameter {
                    name: "city".to_string(),
                });
            }
            Some(other) => {
                return Err(ToolError::InvalidParameter {
                    name: "city".to_string(),
                    reason: format!("expected a string, got {}", other),
                });
            }
        };

        Ok(ToolOutput::html(format!(
            "<p>Weather forecast requested for <b>{}</b>.</p>\n",
            city
        )))
    }
}

/// Echo tool - returns its parameters as compact JSON
pub struct EchoTool {
    descriptor: ToolDescriptor,
}

impl EchoTool {
    /// Dispatch name
    pub const NAME: &'static str = "Echo";

    /// Create the tool
    #[must_use]
    pub fn new() -> Self {
        Self {
            descriptor: ToolDescriptor::new(Self::NAME)
                .with_description("Returns the parameters it was called with.")
                .with_parameter_hint(r#"[{ "...": "any" }]"#),
        }
    }
}

impl Default for EchoTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, parameters: &Parameters) -> Result<ToolOutput, ToolError> {
        serde_json::to_string(parameters)
            .map(ToolOutput::text)
            .map_err(|e| ToolError::ExecutionFailed {
                reason: e.to_string(),
            })
    }
}
