//! Chat Transport Traits
//!
//! The synchronizer talks to the backend only through [`ChatTransport`], so
//! tests and alternative clients can script the byte stream directly.
//!
//! # Design Philosophy
//!
//! A transport does exactly two things: send the request, and hand back the
//! body as raw bytes once the status is known to be successful. It never
//! parses frames; that is the decoder's job.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::decoder::ByteStream;
use crate::error::TransportError;
use crate::messages::ConversationId;

/// Body of a streaming chat request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Conversation the message belongs to
    pub session_id: String,
    /// The user's message
    pub message: String,
}

impl ChatRequest {
    /// Create a request for a conversation
    pub fn new(conversation_id: &ConversationId, message: impl Into<String>) -> Self {
        Self {
            session_id: conversation_id.as_str().to_string(),
            message: message.into(),
        }
    }
}

/// Transport for the streaming chat endpoint
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Transport name for logs (e.g., "HTTP")
    fn name(&self) -> &str;

    /// Send the request and open the response body
    ///
    /// Returns `TransportError::Status` for a non-success status, with the
    /// response body text; no frame has been read at that point.
    async fn open_stream(
        &self,
        request: &ChatRequest,
        bearer_token: &str,
    ) -> Result<ByteStream, TransportError>;
}
