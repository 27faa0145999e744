//! Conversation State
//!
//! The in-memory conversation log the synchronizer writes into and UI
//! surfaces read from.
//!
//! # Design Philosophy
//!
//! A conversation only grows. Messages are appended, and the one mutation
//! allowed afterwards is appending text to the agent message at the tail.
//! Nothing is replaced, removed, or reordered, so a surface can render
//! incrementally from the last index it has seen.
//!
//! [`ConversationRegistry`] is the seam between the synchronizer and
//! whoever owns the conversation list; [`ConversationStore`] is the
//! in-memory implementation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::messages::{ConversationId, MessageId, MessageRole};

/// A message in the conversation
///
/// Role and timestamp are fixed at construction; content can only grow,
/// and only through the owning [`Conversation`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    role: MessageRole,
    content: String,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

impl Message {
    /// A user message stamped with the current time
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: MessageRole::User,
            content: content.into(),
            timestamp: Some(Utc::now()),
        }
    }

    /// An empty agent message that tokens will be appended to
    #[must_use]
    pub fn agent_placeholder() -> Self {
        Self {
            id: MessageId::new(),
            role: MessageRole::Agent,
            content: String::new(),
            timestamp: Some(Utc::now()),
        }
    }

    /// A message loaded from previously stored history
    pub fn from_history(
        role: MessageRole,
        content: impl Into<String>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            timestamp,
        }
    }

    /// Client-side message ID
    #[must_use]
    pub fn id(&self) -> &MessageId {
        &self.id
    }

    /// Who sent the message
    #[must_use]
    pub fn role(&self) -> MessageRole {
        self.role
    }

    /// Current content
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// When the message was created, if known
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
}

/// One conversation's ordered message log
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation ID
    pub id: ConversationId,
    messages: Vec<Message>,
    /// When the conversation was opened in this store
    pub created_at: DateTime<Utc>,
    /// When the log last changed
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create an empty conversation
    #[must_use]
    pub fn new(id: ConversationId) -> Self {
        let now = Utc::now();
        Self {
            id,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// All messages in order
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recently appended message
    #[must_use]
    pub fn tail(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the conversation has no messages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append a message, returning its ID
    pub fn append(&mut self, message: Message) -> MessageId {
        let id = message.id.clone();
        self.messages.push(message);
        self.touch();
        id
    }

    /// Append text to the agent message at the tail
    pub fn append_to_agent_tail(&mut self, text: &str) -> Result<&Message, RegistryError> {
        match self.messages.last_mut() {
            Some(msg) if msg.role == MessageRole::Agent => {
                msg.content.push_str(text);
                self.updated_at = Utc::now();
                Ok(msg)
            }
            _ => Err(RegistryError::NoAgentTail(self.id.clone())),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// The conversation owner, as seen by the synchronizer
///
/// Implementations must keep the append-only contract: no method here may
/// remove, reorder, or rewrite a message.
pub trait ConversationRegistry: Send + Sync {
    /// The conversation the user currently has selected
    fn selected(&self) -> Option<ConversationId>;

    /// Append a message to a conversation
    fn append_message(
        &self,
        id: &ConversationId,
        message: Message,
    ) -> Result<MessageId, RegistryError>;

    /// Append text to the agent message at the tail of a conversation
    fn append_to_tail(&self, id: &ConversationId, text: &str) -> Result<(), RegistryError>;

    /// The most recent message of a conversation
    fn tail(&self, id: &ConversationId) -> Option<Message>;
}

/// In-memory conversation registry
///
/// Shared behind an `Arc`; every method takes `&self`. Locks are held only
/// for the duration of a single mutation.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: RwLock<HashMap<ConversationId, Conversation>>,
    selected: RwLock<Option<ConversationId>>,
}

impl ConversationStore {
    /// Create an empty store with nothing selected
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a conversation, creating it empty if it is not known yet
    pub fn open(&self, id: ConversationId) {
        self.conversations
            .write()
            .entry(id.clone())
            .or_insert_with(|| Conversation::new(id));
    }

    /// Open a conversation with previously stored history
    ///
    /// Fails if the conversation already holds messages: history is only
    /// ever loaded once, before the first exchange.
    pub fn open_with_history(
        &self,
        id: ConversationId,
        history: Vec<Message>,
    ) -> Result<(), RegistryError> {
        let mut conversations = self.conversations.write();
        let conversation = conversations
            .entry(id.clone())
            .or_insert_with(|| Conversation::new(id.clone()));

        if !conversation.is_empty() {
            return Err(RegistryError::NotEmpty(id));
        }

        for message in history {
            conversation.append(message);
        }
        Ok(())
    }

    /// Select a conversation, opening it if needed
    ///
    /// Selection only decides where new submissions go; exchanges already
    /// running in other conversations keep writing to them.
    pub fn select(&self, id: ConversationId) {
        self.open(id.clone());
        *self.selected.write() = Some(id);
    }

    /// Clear the selection
    pub fn deselect(&self) {
        *self.selected.write() = None;
    }

    /// Whether the store knows a conversation
    #[must_use]
    pub fn contains(&self, id: &ConversationId) -> bool {
        self.conversations.read().contains_key(id)
    }

    /// Snapshot of a conversation's messages
    #[must_use]
    pub fn messages(&self, id: &ConversationId) -> Vec<Message> {
        self.conversations
            .read()
            .get(id)
            .map(|c| c.messages().to_vec())
            .unwrap_or_default()
    }

    /// Messages appended after the first `from` ones
    ///
    /// Lets a surface render incrementally; content of the last message it
    /// already has may still have grown, so callers re-read that one too.
    #[must_use]
    pub fn messages_since(&self, id: &ConversationId, from: usize) -> Vec<Message> {
        self.conversations
            .read()
            .get(id)
            .map(|c| c.messages().iter().skip(from).cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of a whole conversation
    #[must_use]
    pub fn snapshot(&self, id: &ConversationId) -> Option<Conversation> {
        self.conversations.read().get(id).cloned()
    }

    /// IDs of every open conversation, sorted
    #[must_use]
    pub fn conversation_ids(&self) -> Vec<ConversationId> {
        let mut ids: Vec<_> = self.conversations.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl ConversationRegistry for ConversationStore {
    fn selected(&self) -> Option<ConversationId> {
        self.selected.read().clone()
    }

    fn append_message(
        &self,
        id: &ConversationId,
        message: Message,
    ) -> Result<MessageId, RegistryError> {
        let mut conversations = self.conversations.write();
        let conversation = conversations
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownConversation(id.clone()))?;
        Ok(conversation.append(message))
    }

    fn append_to_tail(&self, id: &ConversationId, text: &str) -> Result<(), RegistryError> {
        let mut conversations = self.conversations.write();
        let conversation = conversations
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownConversation(id.clone()))?;
        conversation.append_to_agent_tail(text).map(|_| ())
    }

    fn tail(&self, id: &ConversationId) -> Option<Message> {
        self.conversations
            .read()
            .get(id)
            .and_then(|c| c.tail().cloned())
    }
}
