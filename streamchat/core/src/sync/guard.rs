//! Single-Active-Stream Guard
//!
//! One flag per conversation. Acquiring the flag yields an [`ActiveStream`];
//! dropping it clears the flag, whichever way the exchange ended.

use std::sync::Arc;

use dashmap::DashSet;

use crate::messages::ConversationId;

/// Set of conversations that currently have a live exchange
#[derive(Clone, Debug, Default)]
pub struct ActiveStreams {
    streaming: Arc<DashSet<ConversationId>>,
}

impl ActiveStreams {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the conversation, or `None` if it already has a live exchange
    #[must_use]
    pub fn try_acquire(&self, conversation_id: &ConversationId) -> Option<ActiveStream> {
        if self.streaming.insert(conversation_id.clone()) {
            Some(ActiveStream {
                conversation_id: conversation_id.clone(),
                streaming: Arc::clone(&self.streaming),
            })
        } else {
            None
        }
    }

    /// Whether the conversation has a live exchange
    #[must_use]
    pub fn is_active(&self, conversation_id: &ConversationId) -> bool {
        self.streaming.contains(conversation_id)
    }

    /// Number of conversations with a live exchange
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.streaming.len()
    }

    /// IDs of conversations with a live exchange, sorted
    #[must_use]
    pub fn active_ids(&self) -> Vec<ConversationId> {
        let mut ids: Vec<_> = self.streaming.iter().map(|id| id.key().clone()).collect();
        ids.sort();
        ids
    }
}

/// Proof that a conversation's flag is held
///
/// Released on drop.
#[derive(Debug)]
pub struct ActiveStream {
    conversation_id: ConversationId,
    streaming: Arc<DashSet<ConversationId>>,
}

impl ActiveStream {
    /// The conversation this guard holds
    #[must_use]
    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        self.streaming.remove(&self.conversation_id);
    }
}
