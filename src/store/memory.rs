//! In-memory [`KnowledgeStore`] and [`ConversationStore`] for testing.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Vector search is brute-force cosine similarity over all stored vectors.
//! Unified search can be switched off to exercise the retriever's degraded
//! single-source mode.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::embedding::cosine_similarity;
use crate::error::{Error, Result};
use crate::models::{ChatMessage, Chunk, Conversation, RetrievedMatch, Role, SourceKind, SourceMeta};

use super::{rank_matches, ConversationStore, KnowledgeStore, SearchScope};

struct StoredSource {
    kind: SourceKind,
    meta: Option<SourceMeta>,
}

pub struct InMemoryStore {
    sources: RwLock<HashMap<String, StoredSource>>,
    chunks: RwLock<Vec<Chunk>>,
    conversations: RwLock<HashMap<String, Conversation>>,
    messages: RwLock<Vec<ChatMessage>>,
    unified_search: bool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(HashMap::new()),
            chunks: RwLock::new(Vec::new()),
            conversations: RwLock::new(HashMap::new()),
            messages: RwLock::new(Vec::new()),
            unified_search: true,
        }
    }

    /// A store that only answers single-source scoped queries, for
    /// exercising the retriever's fallback path.
    pub fn without_unified_search() -> Self {
        Self {
            unified_search: false,
            ..Self::new()
        }
    }

    pub fn chunk_count(&self, source_id: &str) -> usize {
        self.chunks
            .read()
            .expect("lock poisoned")
            .iter()
            .filter(|c| c.source_id == source_id)
            .count()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn in_scope(chunk: &Chunk, scope: &SearchScope) -> bool {
    match scope {
        SearchScope::Unified { source_id: None } => chunk.source_kind.is_curated(),
        SearchScope::Unified {
            source_id: Some(id),
        } => chunk.source_kind.is_curated() || chunk.source_id == *id,
        SearchScope::SourceOnly(id) => chunk.source_id == *id,
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn register_source(
        &self,
        source_id: &str,
        kind: SourceKind,
        meta: Option<&SourceMeta>,
    ) -> Result<()> {
        let mut sources = self.sources.write().expect("lock poisoned");
        sources.insert(
            source_id.to_string(),
            StoredSource {
                kind,
                meta: meta.cloned(),
            },
        );
        Ok(())
    }

    async fn ingest(&self, source_id: &str, kind: SourceKind, chunks: &[Chunk]) -> Result<()> {
        {
            let mut sources = self.sources.write().expect("lock poisoned");
            sources
                .entry(source_id.to_string())
                .or_insert(StoredSource { kind, meta: None });
        }
        let mut stored = self.chunks.write().expect("lock poisoned");
        stored.retain(|c| c.source_id != source_id);
        stored.extend(chunks.iter().cloned());
        Ok(())
    }

    async fn delete_source(&self, source_id: &str) -> Result<()> {
        self.sources
            .write()
            .expect("lock poisoned")
            .remove(source_id);
        self.chunks
            .write()
            .expect("lock poisoned")
            .retain(|c| c.source_id != source_id);
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        scope: &SearchScope,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<RetrievedMatch>> {
        if !self.unified_search && matches!(scope, SearchScope::Unified { .. }) {
            return Err(Error::Internal(
                "unified search not supported by this backend".into(),
            ));
        }

        let chunks = self.chunks.read().expect("lock poisoned");
        let matches: Vec<RetrievedMatch> = chunks
            .iter()
            .filter(|c| in_scope(c, scope))
            .map(|c| RetrievedMatch {
                chunk: c.clone(),
                similarity: cosine_similarity(query, &c.embedding),
            })
            .collect();

        Ok(rank_matches(matches, threshold, limit))
    }

    fn supports_unified_search(&self) -> bool {
        self.unified_search
    }

    async fn source_meta(&self, source_id: &str) -> Result<Option<SourceMeta>> {
        let sources = self.sources.read().expect("lock poisoned");
        Ok(sources.get(source_id).and_then(|s| s.meta.clone()))
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn create_conversation(
        &self,
        source_id: Option<&str>,
        session_id: &str,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let mut conversations = self.conversations.write().expect("lock poisoned");
        conversations.insert(
            id.clone(),
            Conversation {
                id: id.clone(),
                source_id: source_id.map(str::to_string),
                session_id: session_id.to_string(),
                created_at: Utc::now().timestamp(),
            },
        );
        Ok(id)
    }

    async fn conversation(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        let conversations = self.conversations.read().expect("lock poisoned");
        Ok(conversations.get(conversation_id).cloned())
    }

    async fn append_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> Result<()> {
        {
            let conversations = self.conversations.read().expect("lock poisoned");
            if !conversations.contains_key(conversation_id) {
                return Err(Error::ConversationNotFound(conversation_id.to_string()));
            }
        }
        let mut messages = self.messages.write().expect("lock poisoned");
        messages.push(ChatMessage {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now().timestamp(),
        });
        Ok(())
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<ChatMessage>> {
        let messages = self.messages.read().expect("lock poisoned");
        Ok(messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }
}
