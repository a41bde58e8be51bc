//! End-to-end turn tests: fragments in, history out.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use quill_core::{Fragment, Message, Role};
use quill_protocol::EndReason;
use quill_runtime::{
    Conversation, DispatchOutcome, FragmentSource, FragmentStream, ScriptedSource, SessionConfig,
    SourceError, TurnPhase,
};
use quill_tool::{
    Parameters, Tool, ToolDescriptor, ToolError, ToolOutput, ToolRegistry, WeatherForecastTool,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Yields its fragments, then never finishes
struct StallingSource {
    fragments: Vec<&'static str>,
}

impl FragmentSource for StallingSource {
    fn stream(&self, _history: &[Message], _cancel: CancellationToken) -> FragmentStream {
        let items: Vec<Result<Fragment, SourceError>> =
            self.fragments.iter().map(|t| Ok(Fragment::assistant(*t))).collect();
        stream::iter(items).chain(stream::pending()).boxed()
    }
}

/// Cancels the caller's token while handing out `raced`
struct RacingSource {
    user: CancellationToken,
}

impl FragmentSource for RacingSource {
    fn stream(&self, _history: &[Message], _cancel: CancellationToken) -> FragmentStream {
        let user = self.user.clone();
        stream::iter([">", "!", "kept", "raced", "never"])
            .map(move |text| {
                if text == "raced" {
                    user.cancel();
                }
                Ok::<_, SourceError>(Fragment::assistant(text))
            })
            .boxed()
    }
}

/// Reports how much history it was given
struct HistorySource;

impl FragmentSource for HistorySource {
    fn stream(&self, history: &[Message], _cancel: CancellationToken) -> FragmentStream {
        let items = vec![
            Ok(Fragment::assistant(">")),
            Ok(Fragment::assistant("!")),
            Ok(Fragment::assistant(format!("saw {}", history.len()))),
            Ok(Fragment::assistant("END")),
        ];
        stream::iter(items).boxed()
    }
}

struct DelayTool {
    descriptor: ToolDescriptor,
    millis: u64,
}

#[async_trait]
impl Tool for DelayTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, parameters: &Parameters) -> Result<ToolOutput, ToolError> {
        tokio::time::sleep(Duration::from_millis(self.millis)).await;
        let tag = parameters
            .get("tag")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        Ok(ToolOutput::text(format!("{}:{}", self.descriptor.name, tag)))
    }
}

fn registry() -> Arc<ToolRegistry> {
    let registry = ToolRegistry::builder()
        .register(Arc::new(WeatherForecastTool::new()))
        .unwrap()
        .register(Arc::new(DelayTool {
            descriptor: ToolDescriptor::new("Slow"),
            millis: 50,
        }))
        .unwrap()
        .register(Arc::new(DelayTool {
            descriptor: ToolDescriptor::new("Fast"),
            millis: 1,
        }))
        .unwrap()
        .build();
    Arc::new(registry)
}

fn conversation() -> Conversation {
    Conversation::new(registry(), SessionConfig::default())
}

#[tokio::test]
async fn test_canonical_turn_buffers() {
    let mut convo = conversation();
    let source = ScriptedSource::new([">", "!", "hello", "#", r#"{"name":"X","arguments":{}}"#, "END"]);
    let outcome = convo.run_turn("hi", &source, CancellationToken::new()).await;

    assert_eq!(outcome.protocol.friendly_text, "hello");
    assert_eq!(outcome.protocol.tool_payload, r#"{"name":"X","arguments":{}}"#);
    assert_eq!(outcome.protocol.end_reason, EndReason::EndMarker);
    // X is not registered
    assert_eq!(convo.messages().len(), 2);
    assert_eq!(outcome.dispatch.as_ref().map(|d| d.skipped_unknown()), Some(1));
    assert_eq!(
        outcome.phase_history(),
        &[
            TurnPhase::Idle,
            TurnPhase::Streaming,
            TurnPhase::Completed,
            TurnPhase::ToolDetection,
            TurnPhase::NoToolDetected,
            TurnPhase::TurnComplete,
        ]
    );
}

#[tokio::test]
async fn test_weather_turn_from_recorded_text() {
    let mut convo = conversation();
    let recorded = ">\n!\nLet me check.\n#\n{\"name\":\"GetWeatherForecast\",\"arguments\":{\"city\":\"Tokyo\"}}\nEND\n";
    let source = ScriptedSource::from_text(recorded, quill_runtime::Split::Lines);
    let outcome = convo.run_turn("weather in Tokyo?", &source, CancellationToken::new()).await;

    let messages = convo.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].text, "Let me check.\n");
    assert_eq!(messages[2].role, Role::Assistant);
    assert!(messages[2].text.contains("Tokyo"));
    assert_eq!(outcome.final_phase(), TurnPhase::TurnComplete);
    assert!(outcome.phase_history().contains(&TurnPhase::ToolExecuted));
}

#[tokio::test]
async fn test_no_start_marker_executes_nothing() {
    let mut convo = conversation();
    let source = ScriptedSource::new([
        "!",
        "#",
        r#"{"name":"GetWeatherForecast","arguments":{"city":"Tokyo"}}"#,
        "END",
    ]);
    let outcome = convo.run_turn("hi", &source, CancellationToken::new()).await;

    assert!(outcome.protocol.tool_payload.is_empty());
    assert!(outcome.dispatch.is_none());
    assert_eq!(convo.messages().len(), 2);
}

#[tokio::test]
async fn test_plain_text_fallback() {
    let mut convo = conversation();
    let source = ScriptedSource::new(["Just ", "plain ", "text."]);
    let outcome = convo.run_turn("hi", &source, CancellationToken::new()).await;

    assert!(outcome.protocol.fallback_used);
    assert_eq!(convo.messages()[1].text, "Just plain text.");
    assert_eq!(outcome.raw_transcript(), "Just plain text.");
}

#[tokio::test]
async fn test_plain_text_fallback_disabled() {
    let config = SessionConfig {
        plain_text_fallback: false,
        ..SessionConfig::default()
    };
    let mut convo = Conversation::new(registry(), config);
    let source = ScriptedSource::new(["Just ", "plain ", "text."]);
    let outcome = convo.run_turn("hi", &source, CancellationToken::new()).await;

    assert!(!outcome.protocol.fallback_used);
    assert_eq!(convo.messages()[1].text, "");
    assert_eq!(outcome.raw_transcript(), "Just plain text.");
}

#[tokio::test]
async fn test_cancel_keeps_prefix_and_skips_truncated_payload() {
    let mut convo = conversation();
    let source = StallingSource {
        fragments: vec![
            ">",
            "!",
            "Hello ",
            "world",
            "#",
            r#"{"name":"GetWeatherForecast","arguments":{"city":"Tok"#,
        ],
    };
    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let outcome = convo.run_turn("hi", &source, cancel).await;

    assert_eq!(outcome.protocol.end_reason, EndReason::Cancelled);
    assert_eq!(outcome.friendly_text(), "Hello world");
    assert_eq!(convo.messages()[1].text, "Hello world");
    assert!(outcome.dispatch.is_none());
    assert_eq!(convo.messages().len(), 2);
    assert!(outcome.was_cancelled());
}

#[tokio::test]
async fn test_cancel_mid_stream_keeps_prefix() {
    let mut convo = conversation();
    let words: Vec<String> = (0..20).map(|i| format!("w{} ", i)).collect();
    let mut fragments = vec![">".to_string(), "!".to_string()];
    fragments.extend(words.iter().cloned());
    let source = ScriptedSource::new(fragments).with_delay(Duration::from_millis(10));

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(75)).await;
        canceller.cancel();
    });

    let outcome = convo.run_turn("hi", &source, cancel).await;

    assert_eq!(outcome.protocol.end_reason, EndReason::Cancelled);
    let friendly = outcome.friendly_text();
    assert!(words.concat().starts_with(friendly));
    assert!(friendly.len() < words.concat().len());
    assert_eq!(convo.messages()[1].text, friendly);
}

#[tokio::test]
async fn test_fragment_received_after_cancel_is_discarded() {
    let mut convo = conversation();
    let cancel = CancellationToken::new();
    let source = RacingSource {
        user: cancel.clone(),
    };

    let outcome = convo.run_turn("hi", &source, cancel).await;

    assert_eq!(outcome.protocol.end_reason, EndReason::Cancelled);
    assert_eq!(outcome.friendly_text(), "kept");
    assert_eq!(convo.messages()[1].text, "kept");
    assert!(!outcome.raw_transcript().contains("raced"));
    assert_eq!(outcome.protocol.fragments, 3);
    assert!(outcome.was_cancelled());
}

#[tokio::test]
async fn test_end_marker_stops_stalled_source() {
    let mut convo = conversation();
    let source = StallingSource {
        fragments: vec![">", "!", "done", "END", "trailing"],
    };
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        convo.run_turn("hi", &source, CancellationToken::new()),
    )
    .await
    .expect("turn should end at END");

    assert_eq!(outcome.protocol.end_reason, EndReason::EndMarker);
    assert_eq!(outcome.raw_transcript(), ">!doneEND");
    assert_eq!(outcome.protocol.discarded, 0);
}

#[tokio::test]
async fn test_draining_after_end_without_cancel_on_end() {
    let config = SessionConfig {
        cancel_on_end: false,
        ..SessionConfig::default()
    };
    let mut convo = Conversation::new(registry(), config);
    let source = ScriptedSource::new([">", "!", "done", "END", "late", "later"]);
    let outcome = convo.run_turn("hi", &source, CancellationToken::new()).await;

    assert_eq!(outcome.protocol.end_reason, EndReason::EndMarker);
    assert_eq!(outcome.protocol.discarded, 2);
    assert_eq!(outcome.friendly_text(), "done");
}

#[tokio::test]
async fn test_source_fault_keeps_friendly_text() {
    let mut convo = conversation();
    let source = ScriptedSource::new([">", "!", "partial", "#", r#"{"name":"GetWeatherForecast","#])
        .then_fail(SourceError::Engine("device lost".to_string()));
    let outcome = convo.run_turn("hi", &source, CancellationToken::new()).await;

    assert!(matches!(outcome.protocol.end_reason, EndReason::Faulted(_)));
    assert!(outcome.phase_history().contains(&TurnPhase::Faulted));
    assert_eq!(convo.messages()[1].text, "partial");
    assert!(outcome.dispatch.is_none());
    assert_eq!(outcome.final_phase(), TurnPhase::TurnComplete);
}

#[tokio::test]
async fn test_invocations_append_in_list_order() {
    let mut convo = conversation();
    let payload = r#"[{"name":"Slow","arguments":{"tag":"a"}},{"name":"Fast","arguments":{"tag":"b"}},{"name":"Slow","arguments":{"tag":"c"}}]"#;
    let source = ScriptedSource::new([">", "#", payload, "END"]);
    let outcome = convo.run_turn("go", &source, CancellationToken::new()).await;

    let texts: Vec<&str> = convo.messages()[2..].iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["Slow:a", "Fast:b", "Slow:c"]);
    assert_eq!(outcome.dispatch.map(|d| d.executed()), Some(3));
}

#[tokio::test]
async fn test_tool_failure_reported_and_dispatch_continues() {
    let mut convo = conversation();
    let payload = r#"[{"name":"GetWeatherForecast","arguments":{}},{"name":"Fast","arguments":{"tag":"x"}}]"#;
    let source = ScriptedSource::new([">", "#", payload, "END"]);
    let outcome = convo.run_turn("go", &source, CancellationToken::new()).await;

    let messages = convo.messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[2].role, Role::System);
    assert_eq!(
        messages[2].text,
        format!("Error: Missing parameter: city\r\ntoolJson: {}", payload)
    );
    assert_eq!(messages[3].text, "Fast:x");
    assert!(outcome.phase_history().contains(&TurnPhase::ToolExecutionFailed));
}

#[tokio::test]
async fn test_invalid_json_payload_is_silent() {
    let mut convo = conversation();
    let source = ScriptedSource::new([">", "!", "ok", "#", "{bad", "END"]);
    let outcome = convo.run_turn("go", &source, CancellationToken::new()).await;

    assert_eq!(convo.messages().len(), 2);
    assert_eq!(
        outcome.dispatch.map(|d| d.outcome),
        Some(DispatchOutcome::InvalidJson)
    );
    assert_eq!(outcome.protocol.tool_payload, "{bad");
}

#[tokio::test]
async fn test_history_grows_across_turns() {
    let mut convo = conversation();
    convo.push(Message::system("be brief"));

    convo.run_turn("one", &HistorySource, CancellationToken::new()).await;
    convo.run_turn("two", &HistorySource, CancellationToken::new()).await;

    let texts: Vec<&str> = convo.messages().iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["be brief", "one", "saw 2", "two", "saw 4"]);
}
