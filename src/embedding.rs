//! Embedding provider abstraction and the OpenAI-backed implementation.
//!
//! The [`EmbeddingProvider`] trait is the single opaque seam between the
//! pipeline and the embedding model: `embed(text) -> vector`. Any provider
//! producing fixed-length vectors is substitutable without touching the
//! rest of the crate.
//!
//! [`embed_batch`] fans calls out concurrently and deliberately survives
//! partial failure: one malformed chunk must not abort ingestion of the
//! rest of a document.
//!
//! Also provides vector utilities:
//! - [`cosine_similarity`] — similarity between two embedding vectors
//! - [`vec_to_blob`] / [`blob_to_vec`] — little-endian f32 encoding for
//!   SQLite BLOB storage
//!
//! # Retry Strategy
//!
//! The OpenAI provider uses exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a single text into a fixed-length dense vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embed a batch of texts concurrently, tolerating per-item failure.
///
/// Up to `fan_out` calls run at once; the merge step waits for every
/// outstanding call. Items whose embedding fails are logged and skipped,
/// and the surviving `(text, vector)` pairs come back in input order.
///
/// # Errors
///
/// Only total failure is an error: when no item succeeded and the provider
/// was unreachable for every call, the outage propagates as
/// [`Error::ProviderUnavailable`].
pub async fn embed_batch(
    provider: &Arc<dyn EmbeddingProvider>,
    texts: &[String],
    fan_out: usize,
) -> Result<Vec<(String, Vec<f32>)>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let semaphore = Arc::new(Semaphore::new(fan_out.max(1)));
    let mut set: JoinSet<(usize, String, Result<Vec<f32>>)> = JoinSet::new();

    for (index, text) in texts.iter().enumerate() {
        let provider = Arc::clone(provider);
        let semaphore = Arc::clone(&semaphore);
        let text = text.clone();
        set.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return (
                        index,
                        text,
                        Err(Error::Internal("embedding semaphore closed".into())),
                    )
                }
            };
            let result = provider.embed(&text).await;
            (index, text, result)
        });
    }

    let mut successes: Vec<(usize, String, Vec<f32>)> = Vec::with_capacity(texts.len());
    let mut failures: Vec<Error> = Vec::new();

    while let Some(joined) = set.join_next().await {
        let (index, text, result) =
            joined.map_err(|e| Error::Internal(format!("embedding task panicked: {e}")))?;
        match result {
            Ok(vector) => successes.push((index, text, vector)),
            Err(e) => {
                warn!(index, error = %e, "skipping chunk: embedding failed");
                failures.push(e);
            }
        }
    }

    if successes.is_empty() && !failures.is_empty() {
        let all_unreachable = failures
            .iter()
            .all(|e| matches!(e, Error::ProviderUnavailable { .. }));
        if all_unreachable {
            if let Some(Error::ProviderUnavailable { provider, reason }) = failures.pop() {
                return Err(Error::ProviderUnavailable { provider, reason });
            }
        }
    }

    successes.sort_by_key(|(index, _, _)| *index);
    Ok(successes
        .into_iter()
        .map(|(_, text, vector)| (text, vector))
        .collect())
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Calls `POST /v1/embeddings` with the configured model. Requires the
/// `OPENAI_API_KEY` environment variable to be set.
pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    /// Create a new OpenAI embedder from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `OPENAI_API_KEY` is not in the environment or
    /// the HTTP client cannot be built.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::Config("OPENAI_API_KEY environment variable not set".into()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post("https://api.openai.com/v1/embeddings")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await.map_err(|e| {
                            Error::ProviderUnavailable {
                                provider: "openai".into(),
                                reason: format!("invalid response body: {e}"),
                            }
                        })?;
                        return parse_embedding_response(&json, text, self.dims);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(Error::ProviderUnavailable {
                            provider: "openai".into(),
                            reason: format!("HTTP {status}: {body_text}"),
                        });
                        continue;
                    }

                    // Client error (not 429) — this text will never embed
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(Error::Embedding {
                        text: preview(text),
                        reason: format!("HTTP {status}: {body_text}"),
                    });
                }
                Err(e) => {
                    last_err = Some(Error::ProviderUnavailable {
                        provider: "openai".into(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::ProviderUnavailable {
            provider: "openai".into(),
            reason: "embedding failed after retries".into(),
        }))
    }
}

fn parse_embedding_response(
    json: &serde_json::Value,
    text: &str,
    expected_dims: usize,
) -> Result<Vec<f32>> {
    let vector: Vec<f32> = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| Error::Embedding {
            text: preview(text),
            reason: "response missing data[0].embedding".into(),
        })?
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect();

    if vector.len() != expected_dims {
        return Err(Error::Embedding {
            text: preview(text),
            reason: format!("expected {} dims, got {}", expected_dims, vector.len()),
        });
    }

    Ok(vector)
}

/// First few characters of the failing text, to identify it in errors.
fn preview(text: &str) -> String {
    text.chars().take(48).collect()
}

// ============ Vector utilities ============

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
