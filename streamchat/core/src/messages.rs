//! Chat Messages and Identifiers
//!
//! Identifier newtypes shared by every module, the message roles, and the
//! [`ChatEvent`] notifications the synchronizer emits for UI surfaces.
//!
//! # Design Philosophy
//!
//! The synchronizer owns the conversation log; a UI only renders it. Events
//! are a courtesy for redraws: a surface that misses one can always re-read
//! the conversation from the store.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Conversation identifier
///
/// Opaque to the client. The same string is sent to the backend as the
/// `session_id` of every chat request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    /// Generate a new random conversation ID
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConversationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Message identifier (client-side, never sent on the wire)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new unique message ID
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        Self(format!("msg_{id}"))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User input
    User,
    /// The backend agent
    Agent,
}

/// Notifications emitted while an exchange runs
///
/// Sent to the optional event channel given to the synchronizer. Delivery
/// is best-effort and never influences the exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    /// User and placeholder agent messages were appended
    ExchangeStarted {
        /// Conversation the exchange belongs to
        conversation_id: ConversationId,
        /// Placeholder agent message that will receive tokens
        message_id: MessageId,
    },

    /// A token was appended to the agent message
    Token {
        /// Conversation the exchange belongs to
        conversation_id: ConversationId,
        /// Agent message the token was appended to
        message_id: MessageId,
        /// The token text
        text: String,
    },

    /// Stream completed normally
    StreamEnd {
        /// Conversation the exchange belongs to
        conversation_id: ConversationId,
        /// Agent message that completed
        message_id: MessageId,
    },

    /// Stream failed; the reason was appended to the agent message
    StreamError {
        /// Conversation the exchange belongs to
        conversation_id: ConversationId,
        /// Agent message that carries the annotation
        message_id: MessageId,
        /// Failure description
        error: String,
    },
}

impl ChatEvent {
    /// The conversation this event belongs to
    #[must_use]
    pub fn conversation_id(&self) -> &ConversationId {
        match self {
            Self::ExchangeStarted {
                conversation_id, ..
            }
            | Self::Token {
                conversation_id, ..
            }
            | Self::StreamEnd {
                conversation_id, ..
            }
            | Self::StreamError {
                conversation_id, ..
            } => conversation_id,
        }
    }
}
