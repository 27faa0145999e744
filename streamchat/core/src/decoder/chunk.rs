//! Chunk Types
//!
//! The typed application events carried by `data:` frames.

use serde::{Deserialize, Serialize};

/// Fallback text for an `error` chunk that carries no message
pub const UNKNOWN_ERROR: &str = "unknown error";

/// One decoded application event
///
/// Wire shape (JSON, one object per `data:` frame):
///
/// ```text
/// { "type": "start"|"token"|"done"|"error",
///   "content"?: string, "session_id"?: string,
///   "message_id"?: string, "error"?: string }
/// ```
///
/// Fields that do not belong to a variant are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Chunk {
    /// The backend accepted the message and started replying
    Start {
        /// Backend session the reply belongs to
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        /// Backend message identifier
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },

    /// A fragment of the reply text
    Token {
        /// The fragment (absent or null is treated as empty)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },

    /// The reply is complete
    Done {
        /// Backend session the reply belongs to
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        /// Backend identifier of the stored reply
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },

    /// The backend gave up on the reply
    Error {
        /// Human-readable reason
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl Chunk {
    /// Build a token chunk
    pub fn token(content: impl Into<String>) -> Self {
        Self::Token {
            content: Some(content.into()),
        }
    }

    /// Build an error chunk
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: Some(message.into()),
        }
    }

    /// Whether this chunk ends its sequence
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    /// Text fragment of a token chunk (empty for other kinds)
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Token {
                content: Some(content),
            } => content,
            _ => "",
        }
    }

    /// Error message of an error chunk, with a fallback for empty messages
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { error } => Some(
                error
                    .as_deref()
                    .filter(|e| !e.is_empty())
                    .unwrap_or(UNKNOWN_ERROR),
            ),
            _ => None,
        }
    }

    /// Kind name as it appears in the `type` field
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Token { .. } => "token",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}
