//! Error Types
//!
//! Library errors are typed with `thiserror`. Only [`TransportError`] ever
//! reaches a user, and then only as the text appended to an agent message.

use thiserror::Error;

use crate::messages::ConversationId;

/// Failures opening or reading the chat stream
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// No credential was available; nothing was sent
    #[error("not authenticated")]
    Unauthenticated,

    /// The backend answered with a non-success status before any frame
    #[error("HTTP {status}: {body}")]
    Status {
        /// Numeric HTTP status code
        status: u16,
        /// Response body text (may be empty)
        body: String,
    },

    /// The connection failed or broke mid-stream
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a success status but no body to stream
    /// (e.g. `204 No Content`)
    #[error("response body is not readable")]
    MissingBody,

    /// The request could not be built
    #[error("invalid request: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::Request(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Errors from the conversation registry's mutation API
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The conversation was never opened in this registry
    #[error("unknown conversation: {0}")]
    UnknownConversation(ConversationId),

    /// The tail of the conversation is not an agent message
    #[error("conversation {0} has no agent message at its tail")]
    NoAgentTail(ConversationId),

    /// History can only be loaded into an empty conversation
    #[error("conversation {0} already has messages")]
    NotEmpty(ConversationId),
}
