//! Per-session conversation tracking.
//!
//! A conversation is created lazily on the first message of a session and
//! only ever extended afterwards. The tracker is independent of retrieval:
//! losing a transcript entry must never fail a chat turn that already has
//! an answer, so the orchestration layer logs and swallows append errors.

use std::sync::Arc;

use crate::error::Result;
use crate::models::{ChatMessage, Conversation, Role};
use crate::store::ConversationStore;

pub struct ConversationTracker {
    store: Arc<dyn ConversationStore>,
}

impl ConversationTracker {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    /// Return the existing conversation id, or create a conversation
    /// scoped to `(source_id, session_id)`.
    pub async fn get_or_create(
        &self,
        source_id: Option<&str>,
        session_id: &str,
        conversation_id: Option<&str>,
    ) -> Result<String> {
        match conversation_id {
            Some(id) => Ok(id.to_string()),
            None => self.store.create_conversation(source_id, session_id).await,
        }
    }

    pub async fn append(&self, conversation_id: &str, role: Role, content: &str) -> Result<()> {
        self.store
            .append_message(conversation_id, role, content)
            .await
    }

    pub async fn history(&self, conversation_id: &str) -> Result<Vec<ChatMessage>> {
        self.store.messages(conversation_id).await
    }

    /// The conversation's record, if it exists.
    pub async fn conversation(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        self.store.conversation(conversation_id).await
    }
}
