//! Core data models used throughout docchat.
//!
//! These types represent the chunks, retrieval matches, conversations, and
//! chat inputs/outputs that flow through the ingestion and retrieval
//! pipeline.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Which knowledge category a chunk belongs to.
///
/// `Document` chunks are scoped to one uploaded document; the remaining
/// kinds form the curated company knowledge searched for every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Document,
    Knowledge,
    Faq,
    Service,
    CaseStudy,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Document => "document",
            SourceKind::Knowledge => "knowledge",
            SourceKind::Faq => "faq",
            SourceKind::Service => "service",
            SourceKind::CaseStudy => "case_study",
        }
    }

    pub fn parse(s: &str) -> Option<SourceKind> {
        match s {
            "document" => Some(SourceKind::Document),
            "knowledge" => Some(SourceKind::Knowledge),
            "faq" => Some(SourceKind::Faq),
            "service" => Some(SourceKind::Service),
            "case_study" => Some(SourceKind::CaseStudy),
            _ => None,
        }
    }

    /// Curated kinds are searched globally, without a source scope.
    pub fn is_curated(&self) -> bool {
        !matches!(self, SourceKind::Document)
    }
}

/// A bounded segment of source text with its own embedding.
///
/// Created at ingestion, immutable thereafter, destroyed only when its
/// source is deleted. `chunk_index` is a contiguous 0-based sequence per
/// source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub source_id: String,
    pub source_kind: SourceKind,
    pub chunk_index: i64,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: serde_json::Value,
    pub hash: String,
}

impl Chunk {
    /// Build a chunk with a fresh UUID and a SHA-256 content hash for
    /// staleness detection.
    pub fn new(
        source_id: &str,
        source_kind: SourceKind,
        chunk_index: i64,
        content: String,
        embedding: Vec<f32>,
        metadata: serde_json::Value,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        let hash = format!("{:x}", hasher.finalize());

        Chunk {
            id: Uuid::new_v4().to_string(),
            source_id: source_id.to_string(),
            source_kind,
            chunk_index,
            content,
            embedding,
            metadata,
            hash,
        }
    }
}

/// A chunk matched by a similarity query. Ephemeral, never persisted.
#[derive(Debug, Clone)]
pub struct RetrievedMatch {
    pub chunk: Chunk,
    /// Cosine similarity against the query embedding, in `[0, 1]` for the
    /// thresholds used here.
    pub similarity: f32,
}

/// Display metadata for the parent document, used to personalize prompts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceMeta {
    pub title: String,
    pub client_name: String,
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// A conversation scoped to `(source_id, session_id)`, created lazily on
/// the first message of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub source_id: Option<String>,
    pub session_id: String,
    pub created_at: i64,
}

/// One transcript entry. Append-only; ordering is insertion order,
/// timestamped at append time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: i64,
}

/// A chat turn as handed over by the surrounding application.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub source_id: Option<String>,
    pub session_id: String,
    pub conversation_id: Option<String>,
}

/// A snippet that grounded the answer, truncated for display.
#[derive(Debug, Clone, Serialize)]
pub struct SourcePreview {
    pub content: String,
    pub metadata: serde_json::Value,
}

/// The result of a chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub conversation_id: String,
    pub sources: Vec<SourcePreview>,
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    /// Chunks produced by the chunker.
    pub chunks: usize,
    /// Chunks that embedded successfully and were stored.
    pub embedded: usize,
    /// Chunks dropped because their embedding call failed.
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_round_trips() {
        for kind in [
            SourceKind::Document,
            SourceKind::Knowledge,
            SourceKind::Faq,
            SourceKind::Service,
            SourceKind::CaseStudy,
        ] {
            assert_eq!(SourceKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SourceKind::parse("proposal"), None);
    }

    #[test]
    fn only_document_is_scoped() {
        assert!(!SourceKind::Document.is_curated());
        assert!(SourceKind::Faq.is_curated());
        assert!(SourceKind::CaseStudy.is_curated());
    }

    #[test]
    fn chunk_hash_is_content_derived() {
        let a = Chunk::new(
            "s1",
            SourceKind::Document,
            0,
            "same text".into(),
            vec![0.0; 4],
            serde_json::json!({}),
        );
        let b = Chunk::new(
            "s1",
            SourceKind::Document,
            1,
            "same text".into(),
            vec![0.0; 4],
            serde_json::json!({}),
        );
        assert_eq!(a.hash, b.hash);
        assert_ne!(a.id, b.id);
    }
}
