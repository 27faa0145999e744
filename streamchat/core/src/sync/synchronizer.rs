//! Chat Synchronizer
//!
//! Accepts user input, runs one exchange per submission, and applies the
//! decoded reply to the conversation registry.
//!
//! # Submission Flow
//!
//! ```text
//! submit(input)
//!   ├─ trim; empty?              → Ignored(EmptyInput)
//!   ├─ too long?                 → Ignored(InputTooLong)
//!   ├─ no selected conversation  → Ignored(NoConversation)
//!   ├─ guard already held        → Ignored(StreamActive)
//!   ├─ append user + placeholder
//!   ├─ credential?               ─ none → Failed("not authenticated")
//!   ├─ transport.open_stream     ─ err  → Failed(reason)
//!   └─ ChunkStream loop          → Complete / Failed
//! ```
//!
//! Ignored submissions never touch the network or the registry.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::exchange::{Exchange, ExchangeOutcome, ExchangeReport};
use super::guard::ActiveStreams;
use crate::backend::{ChatRequest, ChatTransport};
use crate::config::{ClientConfig, DEFAULT_MAX_INPUT_CHARS};
use crate::conversation::{ConversationRegistry, ConversationStore};
use crate::credentials::CredentialProvider;
use crate::decoder::{ChunkStream, StreamEnd};
use crate::error::{RegistryError, TransportError};
use crate::messages::{ChatEvent, ConversationId};

/// Why a submission was dropped without effect
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Input was empty or whitespace-only
    EmptyInput,
    /// Input exceeded the configured length limit
    InputTooLong,
    /// No conversation is selected
    NoConversation,
    /// The target conversation is not in the registry
    UnknownConversation,
    /// An exchange is already live for the conversation
    StreamActive,
}

impl IgnoreReason {
    /// Short description for logs
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::EmptyInput => "empty input",
            Self::InputTooLong => "input too long",
            Self::NoConversation => "no conversation selected",
            Self::UnknownConversation => "unknown conversation",
            Self::StreamActive => "stream already active",
        }
    }
}

/// Result of a submission
#[derive(Clone, Debug)]
pub enum SubmitOutcome {
    /// Dropped silently; nothing changed
    Ignored(IgnoreReason),
    /// An exchange ran to a terminal state
    Finished(ExchangeReport),
}

impl SubmitOutcome {
    /// Whether the submission was dropped
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored(_))
    }

    /// The exchange report, if an exchange ran
    #[must_use]
    pub fn report(&self) -> Option<&ExchangeReport> {
        match self {
            Self::Finished(report) => Some(report),
            Self::Ignored(_) => None,
        }
    }

    /// Consume into the exchange report, if an exchange ran
    #[must_use]
    pub fn into_report(self) -> Option<ExchangeReport> {
        match self {
            Self::Finished(report) => Some(report),
            Self::Ignored(_) => None,
        }
    }
}

/// Drives exchanges between a transport and a conversation registry
///
/// Cheap to clone; clones share the registry, the transport and the
/// single-active-stream guard.
pub struct ChatSynchronizer<T: ChatTransport, R: ConversationRegistry = ConversationStore> {
    transport: Arc<T>,
    registry: Arc<R>,
    credentials: Arc<dyn CredentialProvider>,
    active: ActiveStreams,
    events: Option<mpsc::Sender<ChatEvent>>,
    max_input_chars: usize,
}

impl<T: ChatTransport, R: ConversationRegistry> Clone for ChatSynchronizer<T, R> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            registry: Arc::clone(&self.registry),
            credentials: Arc::clone(&self.credentials),
            active: self.active.clone(),
            events: self.events.clone(),
            max_input_chars: self.max_input_chars,
        }
    }
}

impl<T, R> ChatSynchronizer<T, R>
where
    T: ChatTransport + 'static,
    R: ConversationRegistry + 'static,
{
    /// Create a synchronizer
    pub fn new(
        transport: Arc<T>,
        registry: Arc<R>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            transport,
            registry,
            credentials,
            active: ActiveStreams::new(),
            events: None,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        }
    }

    /// Send [`ChatEvent`]s to a channel
    #[must_use]
    pub fn with_events(mut self, events: mpsc::Sender<ChatEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Set the input length limit, in characters
    #[must_use]
    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    /// Apply client settings
    #[must_use]
    pub fn with_config(self, config: &ClientConfig) -> Self {
        self.with_max_input_chars(config.max_input_chars)
    }

    /// The registry exchanges write to
    #[must_use]
    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    /// The transport exchanges use
    #[must_use]
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Whether the conversation has a live exchange
    #[must_use]
    pub fn is_streaming(&self, conversation_id: &ConversationId) -> bool {
        self.active.is_active(conversation_id)
    }

    /// The single-active-stream guard set
    #[must_use]
    pub fn active_streams(&self) -> &ActiveStreams {
        &self.active
    }

    /// Submit input to the selected conversation and run the exchange
    pub async fn submit(&self, input: &str) -> SubmitOutcome {
        match self.registry.selected() {
            Some(id) => self.submit_to(&id, input).await,
            None => self.ignore(None, IgnoreReason::NoConversation),
        }
    }

    /// Submit input to a specific conversation and run the exchange
    pub async fn submit_to(&self, conversation_id: &ConversationId, input: &str) -> SubmitOutcome {
        match self.begin(conversation_id, input) {
            Ok(exchange) => {
                let report = drive(
                    Arc::clone(&self.transport),
                    Arc::clone(&self.credentials),
                    exchange,
                )
                .await;
                SubmitOutcome::Finished(report)
            }
            Err(reason) => self.ignore(Some(conversation_id), reason),
        }
    }

    /// Submit input to the selected conversation and run the exchange on a
    /// background task
    ///
    /// Acceptance is decided before returning: once this returns `Ok`, the
    /// user message and placeholder are in the registry and the guard is
    /// held.
    pub fn spawn_submit(&self, input: &str) -> Result<JoinHandle<ExchangeReport>, IgnoreReason> {
        let Some(id) = self.registry.selected() else {
            self.ignore(None, IgnoreReason::NoConversation);
            return Err(IgnoreReason::NoConversation);
        };
        self.spawn_submit_to(&id, input)
    }

    /// Submit input to a specific conversation and run the exchange on a
    /// background task
    pub fn spawn_submit_to(
        &self,
        conversation_id: &ConversationId,
        input: &str,
    ) -> Result<JoinHandle<ExchangeReport>, IgnoreReason> {
        let exchange = match self.begin(conversation_id, input) {
            Ok(exchange) => exchange,
            Err(reason) => {
                self.ignore(Some(conversation_id), reason);
                return Err(reason);
            }
        };

        let transport = Arc::clone(&self.transport);
        let credentials = Arc::clone(&self.credentials);
        Ok(tokio::spawn(drive(transport, credentials, exchange)))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn begin(
        &self,
        conversation_id: &ConversationId,
        input: &str,
    ) -> Result<Exchange<R>, IgnoreReason> {
        let message = input.trim();
        if message.is_empty() {
            return Err(IgnoreReason::EmptyInput);
        }
        if message.chars().count() > self.max_input_chars {
            return Err(IgnoreReason::InputTooLong);
        }

        let guard = self
            .active
            .try_acquire(conversation_id)
            .ok_or(IgnoreReason::StreamActive)?;

        Exchange::begin(
            Arc::clone(&self.registry),
            self.events.clone(),
            guard,
            message.to_string(),
        )
        .map_err(|e| match e {
            RegistryError::UnknownConversation(_) => IgnoreReason::UnknownConversation,
            other => {
                tracing::warn!(error = %other, "Registry refused exchange");
                IgnoreReason::UnknownConversation
            }
        })
    }

    fn ignore(&self, conversation_id: Option<&ConversationId>, reason: IgnoreReason) -> SubmitOutcome {
        match reason {
            IgnoreReason::EmptyInput => {
                tracing::debug!(reason = reason.description(), "Submission ignored");
            }
            _ => tracing::warn!(
                conversation_id = ?conversation_id.map(ConversationId::as_str),
                reason = reason.description(),
                "Submission ignored"
            ),
        }
        SubmitOutcome::Ignored(reason)
    }
}

/// Run an accepted exchange to its terminal state
async fn drive<T, R>(
    transport: Arc<T>,
    credentials: Arc<dyn CredentialProvider>,
    mut exchange: Exchange<R>,
) -> ExchangeReport
where
    T: ChatTransport + ?Sized,
    R: ConversationRegistry,
{
    let Some(token) = credentials.bearer_token() else {
        let reason = TransportError::Unauthenticated.to_string();
        return exchange.finish(ExchangeOutcome::Failed(reason), None);
    };

    let request = ChatRequest::new(exchange.conversation_id(), exchange.message());
    tracing::debug!(
        conversation_id = %exchange.conversation_id(),
        transport = transport.name(),
        "Opening chat stream"
    );

    let body = match transport.open_stream(&request, &token).await {
        Ok(body) => body,
        Err(e) => return exchange.finish(ExchangeOutcome::Failed(e.to_string()), None),
    };

    exchange.start_streaming();
    let mut chunks = ChunkStream::new(body);

    while let Some(item) = chunks.next_chunk().await {
        match item {
            Ok(chunk) => {
                if let Some(outcome) = exchange.apply(chunk) {
                    return exchange.finish(outcome, chunks.end_reason());
                }
            }
            Err(e) => {
                return exchange.finish(
                    ExchangeOutcome::Failed(e.to_string()),
                    Some(StreamEnd::TransportFailure),
                );
            }
        }
    }

    if chunks.malformed_count() > 0 {
        tracing::debug!(
            conversation_id = %exchange.conversation_id(),
            skipped = chunks.malformed_count(),
            "Malformed frames skipped"
        );
    }

    debug_assert!(!exchange.state().is_terminal());
    exchange.finish(ExchangeOutcome::Complete, chunks.end_reason())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentials;
    use crate::decoder::ByteStream;
    use crate::messages::MessageRole;
    use crate::sync::exchange::ExchangeState;
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;

    /// Transport replaying a fixed response
    struct ScriptedTransport {
        response: Result<Vec<&'static str>, TransportError>,
        requests: Mutex<Vec<(ChatRequest, String)>>,
    }

    impl ScriptedTransport {
        fn body(reads: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(reads),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing(error: TransportError) -> Arc<Self> {
            Arc::new(Self {
                response: Err(error),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn request_count(&self) -> usize {
            self.requests.lock().len()
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn open_stream(
            &self,
            request: &ChatRequest,
            bearer_token: &str,
        ) -> Result<ByteStream, TransportError> {
            self.requests
                .lock()
                .push((request.clone(), bearer_token.to_string()));
            match &self.response {
                Ok(reads) => {
                    let items: Vec<Result<Bytes, TransportError>> = reads
                        .iter()
                        .map(|r| Ok(Bytes::from_static(r.as_bytes())))
                        .collect();
                    Ok(Box::pin(futures::stream::iter(items)))
                }
                Err(e) => Err(e.clone()),
            }
        }
    }

    fn synchronizer(
        transport: Arc<ScriptedTransport>,
    ) -> (ChatSynchronizer<ScriptedTransport>, ConversationId) {
        let store = Arc::new(ConversationStore::new());
        let id = ConversationId::from("conv-1");
        store.open(id.clone());
        store.select(id.clone());
        let sync = ChatSynchronizer::new(
            transport,
            store,
            Arc::new(StaticCredentials::new("secret")),
        );
        (sync, id)
    }

    #[tokio::test]
    async fn test_two_reads_complete_with_concatenated_tokens() {
        let transport = ScriptedTransport::body(vec![
            "data: {\"type\":\"token\",\"content\":\"Hel\"}\n",
            "data: {\"type\":\"token\",\"content\":\"lo\"}\ndata: [DONE]\n",
        ]);
        let (sync, id) = synchronizer(Arc::clone(&transport));

        let report = sync.submit("  hi there  ").await.into_report().unwrap();

        assert_eq!(report.state(), ExchangeState::Complete);
        assert_eq!(report.stream_end, Some(StreamEnd::Sentinel));
        assert_eq!(report.token_count, 2);
        let messages = sync.registry().messages(&id);
        assert_eq!(messages[0].content(), "hi there");
        assert_eq!(messages[1].role(), MessageRole::Agent);
        assert_eq!(messages[1].content(), "Hello");
        assert!(!sync.is_streaming(&id));

        let requests = transport.requests.lock();
        assert_eq!(requests[0].0.session_id, "conv-1");
        assert_eq!(requests[0].0.message, "hi there");
        assert_eq!(requests[0].1, "secret");
    }

    #[tokio::test]
    async fn test_status_failure_annotates_empty_placeholder() {
        let transport = ScriptedTransport::failing(TransportError::Status {
            status: 500,
            body: "server error".to_string(),
        });
        let (sync, id) = synchronizer(transport);

        let report = sync.submit("hi").await.into_report().unwrap();

        assert_eq!(
            report.outcome,
            ExchangeOutcome::Failed("HTTP 500: server error".to_string())
        );
        assert_eq!(report.stream_end, None);
        assert_eq!(
            sync.registry().tail(&id).unwrap().content(),
            "\n[Error: HTTP 500: server error]"
        );
    }

    #[tokio::test]
    async fn test_error_chunk_fails_exchange() {
        let transport = ScriptedTransport::body(vec![
            "data: {\"type\":\"error\",\"error\":\"rate limited\"}\n",
        ]);
        let (sync, id) = synchronizer(transport);

        let report = sync.submit("hi").await.into_report().unwrap();

        assert_eq!(report.state(), ExchangeState::Failed);
        assert_eq!(report.stream_end, Some(StreamEnd::ErrorChunk));
        assert!(sync
            .registry()
            .tail(&id)
            .unwrap()
            .content()
            .ends_with("[Error: rate limited]"));
    }

    #[tokio::test]
    async fn test_end_of_stream_without_terminal_frame_completes() {
        let transport =
            ScriptedTransport::body(vec!["data: {\"type\":\"token\",\"content\":\"ok\"}\n"]);
        let (sync, id) = synchronizer(transport);

        let report = sync.submit("hi").await.into_report().unwrap();

        assert_eq!(report.state(), ExchangeState::Complete);
        assert_eq!(report.stream_end, Some(StreamEnd::EndOfStream));
        assert_eq!(sync.registry().tail(&id).unwrap().content(), "ok");
    }

    #[tokio::test]
    async fn test_missing_credential_fails_without_request() {
        let transport = ScriptedTransport::body(vec!["data: [DONE]\n"]);
        let store = Arc::new(ConversationStore::new());
        let id = ConversationId::from("conv-1");
        store.open(id.clone());
        store.select(id.clone());
        let sync = ChatSynchronizer::new(
            Arc::clone(&transport),
            store,
            Arc::new(StaticCredentials::unauthenticated()),
        );

        let report = sync.submit("hi").await.into_report().unwrap();

        assert_eq!(
            report.outcome,
            ExchangeOutcome::Failed("not authenticated".to_string())
        );
        assert_eq!(transport.request_count(), 0);
        assert_eq!(
            sync.registry().tail(&id).unwrap().content(),
            "\n[Error: not authenticated]"
        );
    }

    #[tokio::test]
    async fn test_precondition_failures_are_silent() {
        let transport = ScriptedTransport::body(vec!["data: [DONE]\n"]);
        let (sync, id) = synchronizer(Arc::clone(&transport));
        let sync = sync.with_max_input_chars(5);

        assert!(matches!(
            sync.submit("   ").await,
            SubmitOutcome::Ignored(IgnoreReason::EmptyInput)
        ));
        assert!(matches!(
            sync.submit("too long").await,
            SubmitOutcome::Ignored(IgnoreReason::InputTooLong)
        ));

        sync.registry().deselect();
        assert!(matches!(
            sync.submit("hi").await,
            SubmitOutcome::Ignored(IgnoreReason::NoConversation)
        ));

        assert!(matches!(
            sync.submit_to(&ConversationId::from("nope"), "hi").await,
            SubmitOutcome::Ignored(IgnoreReason::UnknownConversation)
        ));

        assert!(sync.registry().messages(&id).is_empty());
        assert_eq!(transport.request_count(), 0);
        assert!(!sync.is_streaming(&ConversationId::from("nope")));
    }

    #[tokio::test]
    async fn test_submit_while_active_is_ignored() {
        let transport = ScriptedTransport::body(vec!["data: [DONE]\n"]);
        let (sync, id) = synchronizer(Arc::clone(&transport));

        let _held = sync.active_streams().try_acquire(&id).unwrap();
        let outcome = sync.submit("hi").await;

        assert!(matches!(
            outcome,
            SubmitOutcome::Ignored(IgnoreReason::StreamActive)
        ));
        assert!(sync.registry().messages(&id).is_empty());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_spawn_submit_releases_guard_when_done() {
        let transport = ScriptedTransport::body(vec![
            "data: {\"type\":\"start\",\"session_id\":\"srv-1\"}\n",
            "data: {\"type\":\"token\",\"content\":\"yo\"}\n",
            "data: {\"type\":\"done\",\"message_id\":\"m-1\"}\n",
        ]);
        let (sync, id) = synchronizer(transport);

        let handle = sync.spawn_submit("hi").unwrap();
        assert_eq!(sync.registry().messages(&id).len(), 2);

        let report = handle.await.unwrap();
        assert_eq!(report.state(), ExchangeState::Complete);
        assert_eq!(report.server_session_id.as_deref(), Some("srv-1"));
        assert_eq!(report.server_message_id.as_deref(), Some("m-1"));
        assert!(!sync.is_streaming(&id));
        assert_eq!(sync.registry().tail(&id).unwrap().content(), "yo");
    }

    #[tokio::test]
    async fn test_events_follow_exchange() {
        let transport = ScriptedTransport::body(vec![
            "data: {\"type\":\"token\",\"content\":\"a\"}\ndata: [DONE]\n",
        ]);
        let (sync, _id) = synchronizer(transport);
        let (tx, mut rx) = mpsc::channel(8);
        let sync = sync.with_events(tx);

        sync.submit("hi").await;

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event {
                ChatEvent::ExchangeStarted { .. } => "started",
                ChatEvent::Token { .. } => "token",
                ChatEvent::StreamEnd { .. } => "end",
                ChatEvent::StreamError { .. } => "error",
            });
        }
        assert_eq!(kinds, vec!["started", "token", "end"]);
    }
}
