//! Ingestion pipeline orchestration.
//!
//! Coordinates the full write path: raw text → chunking → concurrent
//! embedding (non-fatal per item) → atomic store replace. The surrounding
//! application performs text extraction before calling in; this module
//! never sees file formats.

use std::sync::Arc;

use tracing::info;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embedding::{embed_batch, EmbeddingProvider};
use crate::error::Result;
use crate::models::{Chunk, IngestReport, SourceKind, SourceMeta};
use crate::store::KnowledgeStore;

/// Chunk, embed, and store one source's text.
///
/// Chunks whose embedding fails are skipped and the survivors re-indexed,
/// so `chunk_index` stays a contiguous 0-based sequence per source.
/// Re-running for the same `source_id` replaces the previous chunk set.
pub async fn ingest_text(
    store: &Arc<dyn KnowledgeStore>,
    embedder: &Arc<dyn EmbeddingProvider>,
    config: &Config,
    source_id: &str,
    kind: SourceKind,
    text: &str,
    meta: Option<&SourceMeta>,
) -> Result<IngestReport> {
    let pieces = chunk_text(text, config.chunking.chunk_size, config.chunking.overlap);
    let total = pieces.len();

    let embedded = embed_batch(embedder, &pieces, config.embedding.fan_out).await?;
    let stored = embedded.len();

    let chunks: Vec<Chunk> = embedded
        .into_iter()
        .enumerate()
        .map(|(index, (content, embedding))| {
            let metadata = serde_json::json!({
                "title": meta.map(|m| m.title.clone()),
                "position": index,
                "total_chunks": stored,
            });
            Chunk::new(source_id, kind, index as i64, content, embedding, metadata)
        })
        .collect();

    store.register_source(source_id, kind, meta).await?;
    store.ingest(source_id, kind, &chunks).await?;

    let report = IngestReport {
        chunks: total,
        embedded: stored,
        skipped: total - stored,
    };
    info!(
        source_id,
        kind = kind.as_str(),
        chunks = report.chunks,
        embedded = report.embedded,
        skipped = report.skipped,
        "ingestion complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChunkingConfig, Config, DbConfig};
    use crate::error::Error;
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::path::PathBuf;

    fn test_config() -> Config {
        Config {
            db: DbConfig {
                path: PathBuf::from(":memory:"),
            },
            chunking: ChunkingConfig {
                chunk_size: 100,
                overlap: 20,
            },
            retrieval: Default::default(),
            embedding: Default::default(),
            completion: Default::default(),
        }
    }

    /// Embeds everything to a constant vector; fails on texts containing a
    /// marker string.
    struct MarkerEmbedder;

    #[async_trait]
    impl EmbeddingProvider for MarkerEmbedder {
        fn model_name(&self) -> &str {
            "marker"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, text: &str) -> crate::error::Result<Vec<f32>> {
            if text.contains("POISON") {
                return Err(Error::Embedding {
                    text: text.chars().take(16).collect(),
                    reason: "marker".into(),
                });
            }
            Ok(vec![1.0, 0.0, 0.0])
        }
    }

    #[tokio::test]
    async fn stores_contiguous_indices_after_skips() {
        let memory = Arc::new(InMemoryStore::new());
        let store: Arc<dyn KnowledgeStore> = memory.clone();
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(MarkerEmbedder);

        // Three sentences long enough to become three chunks; the middle
        // one fails to embed.
        let text = format!(
            "{}. \n{} POISON {}. \n{}.",
            "a".repeat(90),
            "b".repeat(40),
            "b".repeat(40),
            "c".repeat(90)
        );
        let report = ingest_text(
            &store,
            &embedder,
            &test_config(),
            "doc-1",
            SourceKind::Document,
            &text,
            None,
        )
        .await
        .unwrap();

        assert!(report.chunks >= 3);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.embedded, report.chunks - 1);
        assert_eq!(memory.chunk_count("doc-1"), report.embedded);
    }

    #[tokio::test]
    async fn reingest_replaces_not_appends() {
        let memory = Arc::new(InMemoryStore::new());
        let store: Arc<dyn KnowledgeStore> = memory.clone();
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(MarkerEmbedder);
        let text = "short text that fits one chunk";

        for _ in 0..2 {
            ingest_text(
                &store,
                &embedder,
                &test_config(),
                "doc-1",
                SourceKind::Document,
                text,
                None,
            )
            .await
            .unwrap();
        }

        assert_eq!(memory.chunk_count("doc-1"), 1);
    }

    #[tokio::test]
    async fn metadata_carries_position_and_total() {
        let memory = Arc::new(InMemoryStore::new());
        let store: Arc<dyn KnowledgeStore> = memory.clone();
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(MarkerEmbedder);
        let meta = SourceMeta {
            title: "Handbook".into(),
            client_name: String::new(),
        };

        ingest_text(
            &store,
            &embedder,
            &test_config(),
            "kb-1",
            SourceKind::Knowledge,
            "a tiny knowledge entry",
            Some(&meta),
        )
        .await
        .unwrap();

        let matches = memory
            .search(
                &[1.0, 0.0, 0.0],
                &crate::store::SearchScope::Unified { source_id: None },
                0.5,
                10,
            )
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        let md = &matches[0].chunk.metadata;
        assert_eq!(md["title"], "Handbook");
        assert_eq!(md["position"], 0);
        assert_eq!(md["total_chunks"], 1);
    }
}
