//! Query-time retrieval.
//!
//! Embeds the user's query and runs it against the knowledge store: curated
//! company knowledge across all sources plus, when a document is in scope,
//! that document's chunks, merged into one ranked list. Backends without
//! unified search degrade to a single-source query; that capability is
//! checked once when the retriever is built, not per call.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::models::RetrievedMatch;
use crate::store::{KnowledgeStore, SearchScope};

pub struct Retriever {
    store: Arc<dyn KnowledgeStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    threshold: f32,
    knowledge_threshold: Option<f32>,
    limit: usize,
    unified: bool,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &RetrievalConfig,
    ) -> Self {
        let unified = store.supports_unified_search();
        if !unified {
            warn!("knowledge store lacks unified search; retrieval degrades to single-source scope");
        }
        Self {
            store,
            embedder,
            threshold: config.threshold,
            knowledge_threshold: config.knowledge_threshold,
            limit: config.limit,
            unified,
        }
    }

    /// Retrieve the most relevant chunks for `query`.
    ///
    /// An empty result is valid: it means no stored chunk cleared the
    /// similarity floor, and callers fall back to an ungrounded prompt.
    pub async fn retrieve(
        &self,
        query: &str,
        source_id: Option<&str>,
    ) -> Result<Vec<RetrievedMatch>> {
        let query_vec = self.embedder.embed(query).await?;

        let scope = if self.unified {
            SearchScope::Unified {
                source_id: source_id.map(str::to_string),
            }
        } else {
            match source_id {
                Some(id) => SearchScope::SourceOnly(id.to_string()),
                None => {
                    debug!("no source scope and no unified search; returning no matches");
                    return Ok(Vec::new());
                }
            }
        };

        // With a per-kind override the store filters at the loosest
        // threshold and without a row cap, so near-miss chunks of the other
        // kind cannot occupy result slots. The kind-aware filter and the
        // limit are applied here, where the chunk's kind is known.
        let (floor, fetch_limit) = match self.knowledge_threshold {
            Some(kt) => (kt.min(self.threshold), usize::MAX),
            None => (self.threshold, self.limit),
        };

        let mut matches = self
            .store
            .search(&query_vec, &scope, floor, fetch_limit)
            .await?;

        if let Some(kt) = self.knowledge_threshold {
            matches.retain(|m| {
                let min = if m.chunk.source_kind.is_curated() {
                    kt
                } else {
                    self.threshold
                };
                m.similarity >= min
            });
            matches.truncate(self.limit);
        }

        debug!(
            matches = matches.len(),
            scoped = source_id.is_some(),
            "retrieval complete"
        );
        Ok(matches)
    }
}
