//! Exchange Lifecycle
//!
//! One user message and the agent reply streamed back for it.
//!
//! # State Machine
//!
//! ```text
//!   Idle ──submit──▶ Sending ──2xx + body──▶ Streaming ──token──▶ Streaming
//!                      │                        │
//!                      │ no credential,         ├── done / [DONE] / EOF ──▶ Complete
//!                      │ non-2xx, network       │
//!                      ▼                        └── error chunk, read failure ──▶ Failed
//!                    Failed
//! ```
//!
//! Entering `Complete` or `Failed` consumes the exchange, which drops its
//! [`ActiveStream`] guard and frees the conversation for the next one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use super::guard::ActiveStream;
use crate::conversation::{ConversationRegistry, Message};
use crate::decoder::{Chunk, StreamEnd};
use crate::messages::{ChatEvent, ConversationId, MessageId};

/// Where an exchange is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeState {
    /// Not started
    Idle,
    /// Request sent, waiting for the response status
    Sending,
    /// Body open, chunks being applied
    Streaming,
    /// Reply finished normally
    Complete,
    /// Reply failed; the reason was appended to the agent message
    Failed,
}

impl ExchangeState {
    /// Whether no further transition is possible
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Human-readable description
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Sending => "Sending...",
            Self::Streaming => "Responding...",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }
}

/// Terminal result of an exchange
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// `done` chunk, sentinel, or end of stream
    Complete,
    /// Failure reason as shown to the user
    Failed(String),
}

impl ExchangeOutcome {
    /// Whether the exchange completed normally
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Summary of a finished exchange
#[derive(Clone, Debug)]
pub struct ExchangeReport {
    /// Conversation the exchange ran in
    pub conversation_id: ConversationId,
    /// Agent message that received the reply
    pub message_id: MessageId,
    /// How it ended
    pub outcome: ExchangeOutcome,
    /// How the chunk sequence ended (`None` if the body never opened)
    pub stream_end: Option<StreamEnd>,
    /// Backend session ID from the `start`/`done` chunks
    pub server_session_id: Option<String>,
    /// Backend message ID from the `start`/`done` chunks
    pub server_message_id: Option<String>,
    /// Token chunks applied
    pub token_count: u64,
    /// Time from acceptance to the terminal state
    pub duration: Duration,
}

impl ExchangeReport {
    /// Final state (`Complete` or `Failed`)
    #[must_use]
    pub fn state(&self) -> ExchangeState {
        match self.outcome {
            ExchangeOutcome::Complete => ExchangeState::Complete,
            ExchangeOutcome::Failed(_) => ExchangeState::Failed,
        }
    }
}

/// Text appended to the agent message when an exchange fails
#[must_use]
pub fn failure_annotation(reason: &str) -> String {
    format!("\n[Error: {reason}]")
}

/// A live exchange
///
/// Owns the conversation's guard for its whole life; the only writer of the
/// conversation's tail while it exists.
pub(crate) struct Exchange<R: ConversationRegistry> {
    registry: Arc<R>,
    events: Option<mpsc::Sender<ChatEvent>>,
    conversation_id: ConversationId,
    message: String,
    agent_message_id: MessageId,
    state: ExchangeState,
    token_count: u64,
    server_session_id: Option<String>,
    server_message_id: Option<String>,
    started: Instant,
    _guard: ActiveStream,
}

impl<R: ConversationRegistry> Exchange<R> {
    /// Append the user message and the agent placeholder, entering `Sending`
    pub(crate) fn begin(
        registry: Arc<R>,
        events: Option<mpsc::Sender<ChatEvent>>,
        guard: ActiveStream,
        message: String,
    ) -> Result<Self, crate::error::RegistryError> {
        let conversation_id = guard.conversation_id().clone();

        registry.append_message(&conversation_id, Message::user(message.clone()))?;
        let agent_message_id =
            registry.append_message(&conversation_id, Message::agent_placeholder())?;

        let exchange = Self {
            registry,
            events,
            conversation_id,
            message,
            agent_message_id,
            state: ExchangeState::Sending,
            token_count: 0,
            server_session_id: None,
            server_message_id: None,
            started: Instant::now(),
            _guard: guard,
        };

        exchange.emit(ChatEvent::ExchangeStarted {
            conversation_id: exchange.conversation_id.clone(),
            message_id: exchange.agent_message_id.clone(),
        });
        tracing::debug!(
            conversation_id = %exchange.conversation_id,
            message_id = %exchange.agent_message_id,
            "Exchange sending"
        );

        Ok(exchange)
    }

    pub(crate) fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    pub(crate) fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn state(&self) -> ExchangeState {
        self.state
    }

    /// The body opened with a success status
    pub(crate) fn start_streaming(&mut self) {
        debug_assert_eq!(self.state, ExchangeState::Sending);
        self.state = ExchangeState::Streaming;
        tracing::debug!(conversation_id = %self.conversation_id, "Exchange streaming");
    }

    /// Apply one chunk; `Some` when the chunk ends the exchange
    pub(crate) fn apply(&mut self, chunk: Chunk) -> Option<ExchangeOutcome> {
        match chunk {
            Chunk::Start {
                session_id,
                message_id,
            } => {
                self.record_ids(session_id, message_id);
                None
            }
            Chunk::Token { content } => {
                let text = content.unwrap_or_default();
                self.token_count = self.token_count.saturating_add(1);
                if text.is_empty() {
                    return None;
                }

                if let Err(e) = self.registry.append_to_tail(&self.conversation_id, &text) {
                    tracing::warn!(
                        conversation_id = %self.conversation_id,
                        error = %e,
                        "Dropping token"
                    );
                    return None;
                }

                self.emit(ChatEvent::Token {
                    conversation_id: self.conversation_id.clone(),
                    message_id: self.agent_message_id.clone(),
                    text,
                });
                None
            }
            Chunk::Done {
                session_id,
                message_id,
            } => {
                self.record_ids(session_id, message_id);
                Some(ExchangeOutcome::Complete)
            }
            error @ Chunk::Error { .. } => {
                let reason = error
                    .error_message()
                    .unwrap_or(crate::decoder::UNKNOWN_ERROR)
                    .to_string();
                Some(ExchangeOutcome::Failed(reason))
            }
        }
    }

    /// Enter a terminal state and release the conversation
    pub(crate) fn finish(
        mut self,
        outcome: ExchangeOutcome,
        stream_end: Option<StreamEnd>,
    ) -> ExchangeReport {
        match &outcome {
            ExchangeOutcome::Complete => {
                self.state = ExchangeState::Complete;
                self.emit(ChatEvent::StreamEnd {
                    conversation_id: self.conversation_id.clone(),
                    message_id: self.agent_message_id.clone(),
                });
            }
            ExchangeOutcome::Failed(reason) => {
                self.state = ExchangeState::Failed;
                let annotation = failure_annotation(reason);
                if let Err(e) = self
                    .registry
                    .append_to_tail(&self.conversation_id, &annotation)
                {
                    tracing::warn!(
                        conversation_id = %self.conversation_id,
                        error = %e,
                        "Could not annotate failed reply"
                    );
                }
                self.emit(ChatEvent::StreamError {
                    conversation_id: self.conversation_id.clone(),
                    message_id: self.agent_message_id.clone(),
                    error: reason.clone(),
                });
            }
        }

        let report = ExchangeReport {
            conversation_id: self.conversation_id.clone(),
            message_id: self.agent_message_id.clone(),
            outcome,
            stream_end,
            server_session_id: self.server_session_id.take(),
            server_message_id: self.server_message_id.take(),
            token_count: self.token_count,
            duration: self.started.elapsed(),
        };

        match &report.outcome {
            ExchangeOutcome::Complete => tracing::info!(
                conversation_id = %report.conversation_id,
                tokens = report.token_count,
                elapsed_ms = u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
                end = ?report.stream_end,
                "Exchange complete"
            ),
            ExchangeOutcome::Failed(reason) => tracing::warn!(
                conversation_id = %report.conversation_id,
                tokens = report.token_count,
                reason = %reason,
                "Exchange failed"
            ),
        }

        report
    }

    fn record_ids(&mut self, session_id: Option<String>, message_id: Option<String>) {
        if session_id.is_some() {
            self.server_session_id = session_id;
        }
        if message_id.is_some() {
            self.server_message_id = message_id;
        }
    }

    fn emit(&self, event: ChatEvent) {
        let Some(ref tx) = self.events else {
            return;
        };
        if let Err(e) = tx.try_send(event) {
            tracing::debug!(error = %e, "Dropping chat event");
        }
    }
}
