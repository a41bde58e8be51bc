//! Payload validation and invocation decoding.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::schema::ResponseFormat;
use crate::trait_::Parameters;

const NAME_KEYS: [&str; 2] = ["name", "tool"];
const PARAMETER_KEYS: [&str; 2] = ["parameters", "arguments"];
const FORMAT_KEYS: [&str; 3] = ["responseFormat", "toolresponseformattype", "response_format"];

/// A structured request to run one tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInvocation {
    /// Tool name, never empty
    pub name: String,
    /// Parameter mappings; only the first is dispatched
    pub parameters: Vec<Parameters>,
    /// Optional rendering hint from the model
    pub response_format: Option<ResponseFormat>,
}

impl ToolInvocation {
    /// The parameter mapping handed to the tool, if any
    #[must_use]
    pub fn primary_parameters(&self) -> Option<&Parameters> {
        self.parameters.first()
    }
}

/// Syntax-only JSON check. Never panics; empty or blank input is invalid.
#[must_use]
pub fn is_valid_json(text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    serde_json::from_str::<serde::de::IgnoredAny>(text).is_ok()
}

/// Decode a validated payload into invocations.
///
/// A single object is treated as a one-element list; a top-level array is
/// taken as the list itself. Elements missing a usable name or parameters are
/// dropped on their own. Returns `None` when nothing usable remains.
#[must_use]
pub fn decode(text: &str) -> Option<Vec<ToolInvocation>> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "tool payload failed to parse");
            return None;
        }
    };

    let elements = match value {
        Value::Object(_) => vec![value],
        Value::Array(items) => items,
        other => {
            debug!(kind = json_kind(&other), "tool payload is not an object or array");
            return None;
        }
    };

    let invocations: Vec<ToolInvocation> = elements
        .iter()
        .enumerate()
        .filter_map(|(index, element)| {
            let decoded = decode_element(element);
            if decoded.is_none() {
                debug!(index, "dropping tool payload element without name or parameters");
            }
            decoded
        })
        .collect();

    if invocations.is_empty() {
        None
    } else {
        Some(invocations)
    }
}

fn decode_element(element: &Value) -> Option<ToolInvocation> {
    let object = element.as_object()?;

    let name = NAME_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .filter(|name| !name.trim().is_empty())?;

    let parameters = PARAMETER_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(parameter_list))?;

    let response_format = FORMAT_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .and_then(ResponseFormat::parse);

    Some(ToolInvocation {
        name: name.to_string(),
        parameters,
        response_format,
    })
}

/// Accepts a list of mappings or a bare mapping. Non-object list entries are
/// skipped; an empty result counts as absent.
fn parameter_list(value: &Value) -> Option<Vec<Parameters>> {
    let list: Vec<Parameters> = match value {
        Value::Object(map) => vec![map.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_object().cloned())
            .collect(),
        _ => return None,
    };
    if list.is_empty() { None } else { Some(list) }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_primary_parameters_on_empty_list() {
        let invocation = ToolInvocation {
            name: "Echo".to_string(),
            parameters: Vec::new(),
            response_format: None,
        };
        assert!(invocation.primary_parameters().is_none());
    }

    #[test]
    fn test_is_valid_json() {
        assert!(is_valid_json("{}"));
        assert!(is_valid_json("  [1, 2] "));
        assert!(!is_valid_json(""));
        assert!(!is_valid_json("   \n"));
        assert!(!is_valid_json("{bad"));
        assert!(!is_valid_json("{} trailing"));
    }

    #[test]
    fn test_decode_name_and_arguments() {
        let invocations = decode(r#"{"name":"GetWeatherForecast","arguments":{"city":"Tokyo"}}"#).unwrap();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].name, "GetWeatherForecast");
        assert_eq!(invocations[0].primary_parameters().unwrap()["city"], json!("Tokyo"));
        assert_eq!(invocations[0].response_format, None);
    }

    #[test]
    fn test_decode_tool_and_parameter_list() {
        let payload = r#"{ "tool": "GetWeatherForecast", "parameters": [{ "city": "Baguio" }, { "city": "Manila" }], "toolresponseformattype": "html" }"#;
        let invocations = decode(payload).unwrap();
        assert_eq!(invocations[0].parameters.len(), 2);
        assert_eq!(invocations[0].primary_parameters().unwrap()["city"], json!("Baguio"));
        assert_eq!(invocations[0].response_format, Some(ResponseFormat::Html));
    }

    #[test]
    fn test_decode_empty_arguments_object() {
        let invocations = decode(r#"{"name":"X","arguments":{}}"#).unwrap();
        assert_eq!(invocations[0].name, "X");
        assert!(invocations[0].primary_parameters().unwrap().is_empty());
    }

    #[test]
    fn test_decode_missing_name() {
        assert!(decode(r#"{"arguments":{"city":"Tokyo"}}"#).is_none());
        assert!(decode(r#"{"name":"  ","arguments":{}}"#).is_none());
        assert!(decode(r#"{"name":42,"arguments":{}}"#).is_none());
    }

    #[test]
    fn test_decode_missing_parameters() {
        assert!(decode(r#"{"name":"GetWeatherForecast"}"#).is_none());
        assert!(decode(r#"{"name":"GetWeatherForecast","parameters":null}"#).is_none());
        assert!(decode(r#"{"name":"GetWeatherForecast","parameters":[]}"#).is_none());
    }

    #[test]
    fn test_decode_array_drops_bad_elements_only() {
        let payload = r#"[
            {"name":"A","arguments":{"n":1}},
            {"arguments":{"n":2}},
            "noise",
            {"name":"B","parameters":[{"n":3}]}
        ]"#;
        let invocations = decode(payload).unwrap();
        let names: Vec<&str> = invocations.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_decode_scalar_payload() {
        assert!(decode("42").is_none());
        assert!(decode("\"GetWeatherForecast\"").is_none());
    }

    #[test]
    fn test_decode_unknown_format_ignored() {
        let invocations = decode(r#"{"name":"X","arguments":{},"response_format":"markdown"}"#).unwrap();
        assert_eq!(invocations[0].response_format, None);
    }
}
