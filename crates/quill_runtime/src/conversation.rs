//! Conversation history and the per-turn driver.

use futures::StreamExt;
use quill_core::{Message, TurnId};
use quill_protocol::{EndReason, ProtocolEvent, ProtocolMachine};
use quill_tool::ToolRegistry;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::SessionConfig;
use crate::dispatcher::Dispatcher;
use crate::source::FragmentSource;
use crate::turn::{TurnEvent, TurnOutcome, TurnPhase};

/// Ordered message history plus everything needed to run turns against it
#[derive(Debug)]
pub struct Conversation {
    messages: Vec<Message>,
    dispatcher: Dispatcher,
    config: SessionConfig,
    events: Option<UnboundedSender<TurnEvent>>,
}

impl Conversation {
    /// Empty conversation dispatching to `registry`
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, config: SessionConfig) -> Self {
        Self {
            messages: Vec::new(),
            dispatcher: Dispatcher::with_config(registry, &config),
            config,
            events: None,
        }
    }

    /// Send turn events to `sender`. A dropped receiver is ignored.
    #[must_use]
    pub fn with_events(mut self, sender: UnboundedSender<TurnEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// History in insertion order
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Append a message outside of a turn, e.g. a system prompt
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Session configuration
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run one assistant turn for `user_text`.
    ///
    /// Appends the user message and an assistant message whose text grows as
    /// friendly fragments arrive, then any tool results. Never fails: source
    /// errors and cancellation end the turn early with the text received so
    /// far kept in history.
    pub async fn run_turn(
        &mut self,
        user_text: &str,
        source: &dyn FragmentSource,
        cancel: CancellationToken,
    ) -> TurnOutcome {
        let turn_id = TurnId::new();
        let span = info_span!("turn", turn_id = %turn_id);
        self.drive(turn_id, user_text, source, cancel)
            .instrument(span)
            .await
    }

    async fn drive(
        &mut self,
        turn_id: TurnId,
        user_text: &str,
        source: &dyn FragmentSource,
        cancel: CancellationToken,
    ) -> TurnOutcome {
        info!("turn started");
        let mut phases = vec![TurnPhase::Idle];

        self.messages.push(Message::user(user_text));

        // END stops the source but must not stop tool dispatch, so the
        // machine only gets a child of the caller's token.
        let stream_token = cancel.child_token();
        let mut machine =
            ProtocolMachine::new().with_plain_text_fallback(self.config.plain_text_fallback);
        if self.config.cancel_on_end {
            machine = machine.with_cancel_on_end(stream_token.clone());
        }

        let mut stream = source.stream(&self.messages, stream_token);
        let reply = self.messages.len();
        self.messages.push(Message::assistant(""));
        self.advance(&mut phases, TurnPhase::Streaming);

        let reason = loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break EndReason::Cancelled,
                next = stream.next() => match next {
                    None => break EndReason::StreamExhausted,
                    Some(Err(err)) => {
                        warn!(error = %err, "fragment source failed");
                        break EndReason::Faulted(err.to_string());
                    }
                    Some(Ok(fragment)) => {
                        if cancel.is_cancelled() {
                            debug!(fragment = %fragment.text, "discarding fragment received after cancellation");
                            break EndReason::Cancelled;
                        }
                        if let Some(event) = machine.feed(&fragment.text) {
                            self.apply(reply, event);
                        }
                        if machine.is_ended() && self.config.cancel_on_end {
                            break EndReason::EndMarker;
                        }
                    }
                },
            }
        };
        drop(stream);

        if machine.state().in_command() {
            debug!(state = ?machine.state(), reason = %reason, "stream stopped before END");
        }
        let finished = machine.finish(reason);
        for event in finished.events {
            self.apply(reply, event);
        }
        let protocol = finished.output;
        self.advance(&mut phases, TurnPhase::after_stream(&protocol.end_reason));

        self.advance(&mut phases, TurnPhase::ToolDetection);
        let dispatch = match protocol.dispatchable_payload() {
            Some(payload) => {
                let before = self.messages.len();
                let report = self.dispatcher.dispatch(payload, &cancel, &mut self.messages).await;
                for message in &self.messages[before..] {
                    self.emit(TurnEvent::MessageAppended(message.clone()));
                }
                Some(report)
            }
            None => {
                if !protocol.tool_payload.trim().is_empty() {
                    debug!(reason = %protocol.end_reason, "tool payload incomplete; not dispatching");
                }
                None
            }
        };
        self.advance(&mut phases, TurnPhase::after_dispatch(dispatch.as_ref()));
        self.advance(&mut phases, TurnPhase::TurnComplete);

        info!(
            reason = %protocol.end_reason,
            fragments = protocol.fragments,
            discarded = protocol.discarded,
            "turn finished"
        );

        TurnOutcome {
            turn_id,
            phases,
            protocol,
            dispatch,
        }
    }

    fn apply(&mut self, reply: usize, event: ProtocolEvent) {
        if let ProtocolEvent::FriendlyTextAppended(text) = &event {
            if let Some(message) = self.messages.get_mut(reply) {
                message.push_str(text);
            }
        }
        self.emit(TurnEvent::Protocol(event));
    }

    fn advance(&self, phases: &mut Vec<TurnPhase>, next: TurnPhase) {
        if let Some(&current) = phases.last() {
            debug_assert!(current.can_transition_to(next), "{} -> {}", current, next);
            debug!(from = %current, to = %next, "turn phase");
        }
        phases.push(next);
        self.emit(TurnEvent::PhaseChanged(next));
    }

    fn emit(&self, event: TurnEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.send(event);
        }
    }
}
