//! Chat turn orchestration.
//!
//! Wires the read path together: conversation bookkeeping, retrieval,
//! prompt assembly, the completion call, and transcript appends. The turn
//! always produces an answer (possibly ungrounded) or a clearly retryable
//! error; it never silently returns an empty message.

use std::sync::Arc;

use tracing::warn;

use crate::config::Config;
use crate::conversation::ConversationTracker;
use crate::completion::CompletionProvider;
use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::models::{ChatAnswer, ChatRequest, Role, SourcePreview};
use crate::prompt::build_prompt;
use crate::retrieve::Retriever;
use crate::store::{ConversationStore, KnowledgeStore};

/// How much of each grounding snippet is echoed back for display.
const SOURCE_PREVIEW_CHARS: usize = 100;

pub struct ChatEngine {
    store: Arc<dyn KnowledgeStore>,
    tracker: ConversationTracker,
    retriever: Retriever,
    completer: Arc<dyn CompletionProvider>,
}

impl ChatEngine {
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        conversations: Arc<dyn ConversationStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        completer: Arc<dyn CompletionProvider>,
        config: &Config,
    ) -> Self {
        let retriever = Retriever::new(Arc::clone(&store), embedder, &config.retrieval);
        Self {
            store,
            tracker: ConversationTracker::new(conversations),
            retriever,
            completer,
        }
    }

    /// Run one chat turn.
    ///
    /// Retrieval failure degrades to an ungrounded prompt; transcript
    /// appends are logged and swallowed so a computed answer is never lost
    /// to bookkeeping. Completion failures surface to the caller, retryable
    /// where the provider outage is.
    pub async fn handle(&self, request: ChatRequest) -> Result<ChatAnswer> {
        if request.message.trim().is_empty() {
            return Err(Error::InvalidRequest("message must not be empty".into()));
        }

        let conversation_id = self
            .tracker
            .get_or_create(
                request.source_id.as_deref(),
                &request.session_id,
                request.conversation_id.as_deref(),
            )
            .await?;

        if let Err(e) = self
            .tracker
            .append(&conversation_id, Role::User, &request.message)
            .await
        {
            warn!(%conversation_id, error = %e, "failed to record user message");
        }

        let matches = match self
            .retriever
            .retrieve(&request.message, request.source_id.as_deref())
            .await
        {
            Ok(matches) => matches,
            Err(e) => {
                warn!(error = %e, "retrieval failed; answering ungrounded");
                Vec::new()
            }
        };

        let source_meta = match request.source_id.as_deref() {
            Some(id) => match self.store.source_meta(id).await {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(source_id = id, error = %e, "failed to load source metadata");
                    None
                }
            },
            None => None,
        };

        let prompt = build_prompt(&matches, &request.message, source_meta.as_ref());
        let answer = self.completer.complete(&prompt).await?;

        if answer.trim().is_empty() {
            return Err(Error::ProviderUnavailable {
                provider: self.completer.name().to_string(),
                reason: "provider returned an empty completion".into(),
            });
        }

        if let Err(e) = self
            .tracker
            .append(&conversation_id, Role::Assistant, &answer)
            .await
        {
            warn!(%conversation_id, error = %e, "failed to record assistant message");
        }

        let sources = matches
            .iter()
            .map(|m| SourcePreview {
                content: truncate_chars(&m.chunk.content, SOURCE_PREVIEW_CHARS),
                metadata: m.chunk.metadata.clone(),
            })
            .collect();

        Ok(ChatAnswer {
            answer,
            conversation_id,
            sources,
        })
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
