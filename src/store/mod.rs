//! Storage abstraction for docchat.
//!
//! [`KnowledgeStore`] defines the write path (atomic replace-on-ingest,
//! cascading delete) and the read path (cosine similarity search) over
//! pluggable backends. [`ConversationStore`] persists chat transcripts.
//! Both are implemented by the SQLite backend and the in-memory backend.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ChatMessage, Chunk, Conversation, RetrievedMatch, Role, SourceKind, SourceMeta};

/// Which stored vectors a similarity query runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchScope {
    /// Curated knowledge across all sources, plus (optionally) one
    /// document's chunks, in the same query.
    Unified { source_id: Option<String> },
    /// A single source's chunks only. The degraded mode used when the
    /// backend lacks unified search.
    SourceOnly(String),
}

/// Abstract knowledge storage backend.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Record or update a source's display metadata.
    async fn register_source(
        &self,
        source_id: &str,
        kind: SourceKind,
        meta: Option<&SourceMeta>,
    ) -> Result<()>;

    /// Atomically associate `chunks` with `source_id`, replacing any chunks
    /// already stored for that source. Re-ingestion is idempotent per
    /// source; readers never observe a half-replaced chunk set.
    async fn ingest(&self, source_id: &str, kind: SourceKind, chunks: &[Chunk]) -> Result<()>;

    /// Remove the source and every chunk that references it.
    async fn delete_source(&self, source_id: &str) -> Result<()>;

    /// Cosine similarity search over stored vectors.
    ///
    /// Discards matches below `threshold`; returns the top `limit` ordered
    /// by similarity descending, ties broken by lower chunk index.
    async fn search(
        &self,
        query: &[f32],
        scope: &SearchScope,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<RetrievedMatch>>;

    /// Whether this backend can serve [`SearchScope::Unified`] queries.
    /// Checked once when the retriever is built.
    fn supports_unified_search(&self) -> bool;

    /// Display metadata for a source, if registered.
    async fn source_meta(&self, source_id: &str) -> Result<Option<SourceMeta>>;
}

/// Abstract conversation transcript backend.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create a conversation scoped to `(source_id, session_id)` and return
    /// its id.
    async fn create_conversation(
        &self,
        source_id: Option<&str>,
        session_id: &str,
    ) -> Result<String>;

    /// Look up a conversation's record by id.
    async fn conversation(&self, conversation_id: &str) -> Result<Option<Conversation>>;

    /// Append one message. Ordering is the call order, timestamped at
    /// append time.
    async fn append_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> Result<()>;

    /// Full transcript in append order.
    async fn messages(&self, conversation_id: &str) -> Result<Vec<ChatMessage>>;
}

/// Threshold filter, ranking, and truncation shared by all backends.
///
/// Results are strictly descending by similarity; ties prefer the lower
/// chunk index, since earlier chunks more often carry definitional content.
pub(crate) fn rank_matches(
    mut matches: Vec<RetrievedMatch>,
    threshold: f32,
    limit: usize,
) -> Vec<RetrievedMatch> {
    matches.retain(|m| m.similarity >= threshold);
    matches.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
    });
    matches.truncate(limit);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;

    fn matched(index: i64, similarity: f32) -> RetrievedMatch {
        RetrievedMatch {
            chunk: Chunk::new(
                "s1",
                SourceKind::Document,
                index,
                format!("chunk {index}"),
                vec![0.0; 3],
                serde_json::json!({}),
            ),
            similarity,
        }
    }

    #[test]
    fn drops_matches_below_threshold() {
        let ranked = rank_matches(vec![matched(0, 0.9), matched(1, 0.5)], 0.7, 10);
        assert_eq!(ranked.len(), 1);
        assert!(ranked.iter().all(|m| m.similarity >= 0.7));
    }

    #[test]
    fn orders_by_similarity_descending() {
        let ranked = rank_matches(
            vec![matched(0, 0.71), matched(1, 0.95), matched(2, 0.8)],
            0.7,
            10,
        );
        let sims: Vec<f32> = ranked.iter().map(|m| m.similarity).collect();
        assert_eq!(sims, vec![0.95, 0.8, 0.71]);
    }

    #[test]
    fn ties_prefer_lower_chunk_index() {
        let ranked = rank_matches(vec![matched(5, 0.8), matched(2, 0.8)], 0.7, 10);
        assert_eq!(ranked[0].chunk.chunk_index, 2);
        assert_eq!(ranked[1].chunk.chunk_index, 5);
    }

    #[test]
    fn truncates_to_limit() {
        let ranked = rank_matches(
            vec![matched(0, 0.9), matched(1, 0.8), matched(2, 0.75)],
            0.7,
            2,
        );
        assert_eq!(ranked.len(), 2);
    }
}
