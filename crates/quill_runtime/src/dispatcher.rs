//! Tool dispatch for a completed turn.
//!
//! Runs the payload through sanitize, validate and decode, then executes each
//! invocation against the session's registry, one after another.

use quill_core::Message;
use quill_tool::{
    decode, is_valid_json, sanitize_with_report, ResponseFormat, Tool, ToolError, ToolInvocation,
    ToolOutput, ToolRegistry,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;

/// How far dispatch got
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DispatchOutcome {
    /// Payload exceeded the configured size limit
    PayloadTooLarge,
    /// Sanitized payload was not valid JSON
    InvalidJson,
    /// Valid JSON, but no element had a name and parameters
    NoInvocation,
    /// At least one invocation was decoded
    Dispatched,
}

/// What happened to one decoded invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum InvocationStatus {
    /// Ran and appended its result
    Executed {
        /// Rendering hint for the result
        format: ResponseFormat,
    },
    /// Ran and failed; an error message was appended
    Failed {
        /// Error text
        error: String,
    },
    /// No tool with that name
    SkippedUnknown,
    /// Not started because the turn was cancelled
    SkippedCancelled,
}

/// Record for one decoded invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationRecord {
    /// Requested tool
    pub name: String,
    /// What happened
    pub status: InvocationStatus,
}

/// Summary of one dispatch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// How far dispatch got
    pub outcome: DispatchOutcome,
    /// Per-invocation results, in payload order
    pub invocations: Vec<InvocationRecord>,
}

impl DispatchReport {
    fn aborted(outcome: DispatchOutcome) -> Self {
        Self {
            outcome,
            invocations: Vec::new(),
        }
    }

    /// Invocations that ran successfully
    #[must_use]
    pub fn executed(&self) -> usize {
        self.count(|s| matches!(s, InvocationStatus::Executed { .. }))
    }

    /// Invocations that ran and failed
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, InvocationStatus::Failed { .. }))
    }

    /// Invocations naming an unregistered tool
    #[must_use]
    pub fn skipped_unknown(&self) -> usize {
        self.count(|s| matches!(s, InvocationStatus::SkippedUnknown))
    }

    fn count(&self, pred: impl Fn(&InvocationStatus) -> bool) -> usize {
        self.invocations.iter().filter(|r| pred(&r.status)).count()
    }
}

/// Executes tool payloads against a fixed registry
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    tool_timeout: Option<Duration>,
    max_payload_bytes: usize,
}

impl Dispatcher {
    /// Create a dispatcher with default limits
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self::with_config(registry, &SessionConfig::default())
    }

    /// Create a dispatcher using the session's limits
    #[must_use]
    pub fn with_config(registry: Arc<ToolRegistry>, config: &SessionConfig) -> Self {
        Self {
            registry,
            tool_timeout: config.tool_timeout(),
            max_payload_bytes: config.max_payload_bytes,
        }
    }

    /// Registry in use
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run a raw tool payload and append results to `history`.
    ///
    /// Never fails: bad payloads abort silently, unknown tools are skipped,
    /// and tool errors become System messages carrying the raw payload.
    /// Invocations run sequentially so results append in payload order.
    pub async fn dispatch(
        &self,
        raw_payload: &str,
        cancel: &CancellationToken,
        history: &mut Vec<Message>,
    ) -> DispatchReport {
        if raw_payload.len() > self.max_payload_bytes {
            warn!(
                bytes = raw_payload.len(),
                limit = self.max_payload_bytes,
                "tool payload too large; skipping dispatch"
            );
            return DispatchReport::aborted(DispatchOutcome::PayloadTooLarge);
        }

        let (json, report) = sanitize_with_report(raw_payload);
        if !report.is_clean() {
            debug!(removed = report.removed, replaced = report.replaced, "sanitized tool payload");
        }

        if !is_valid_json(&json) {
            warn!(payload = raw_payload, "tool payload is not valid JSON; skipping dispatch");
            return DispatchReport::aborted(DispatchOutcome::InvalidJson);
        }

        let Some(invocations) = decode(&json) else {
            debug!(payload = raw_payload, "tool payload decoded to no invocation");
            return DispatchReport::aborted(DispatchOutcome::NoInvocation);
        };

        let mut records = Vec::with_capacity(invocations.len());
        for invocation in &invocations {
            let status = if cancel.is_cancelled() {
                debug!(tool = %invocation.name, "turn cancelled; not starting tool");
                InvocationStatus::SkippedCancelled
            } else {
                self.run_one(invocation, raw_payload, history).await
            };
            records.push(InvocationRecord {
                name: invocation.name.clone(),
                status,
            });
        }

        DispatchReport {
            outcome: DispatchOutcome::Dispatched,
            invocations: records,
        }
    }

    async fn run_one(
        &self,
        invocation: &ToolInvocation,
        raw_payload: &str,
        history: &mut Vec<Message>,
    ) -> InvocationStatus {
        let Some(tool) = self.registry.get(&invocation.name) else {
            debug!(tool = %invocation.name, "no such tool; skipping");
            return InvocationStatus::SkippedUnknown;
        };

        info!(tool = %invocation.name, "executing tool");
        match self.execute(tool.as_ref(), invocation).await {
            Ok(output) => {
                let format = invocation.response_format.unwrap_or(output.format);
                history.push(Message::assistant(output.text));
                InvocationStatus::Executed { format }
            }
            Err(err) => {
                warn!(tool = %invocation.name, error = %err, "tool execution failed");
                history.push(Message::system(format!(
                    "Error: {}\r\ntoolJson: {}",
                    err, raw_payload
                )));
                InvocationStatus::Failed {
                    error: err.to_string(),
                }
            }
        }
    }

    async fn execute(&self, tool: &dyn Tool, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        let parameters = invocation
            .primary_parameters()
            .ok_or_else(|| ToolError::MissingParameter {
                name: "parameters".to_string(),
            })?;
        let call = tool.execute(parameters);
        match self.tool_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or_else(|_| {
                    Err(ToolError::Timeout {
                        tool: invocation.name.clone(),
                        millis: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    })
                }),
            None => call.await,
        }
    }
}
