//! Completion provider abstraction and the Anthropic-backed implementation.
//!
//! The [`CompletionProvider`] trait is the second opaque provider seam:
//! `complete(prompt) -> text`. The chat engine calls it with a fully
//! assembled grounded prompt and treats the provider as a black box.
//!
//! Retry strategy matches the embedding provider: 429/5xx/network errors
//! retry with exponential backoff, other 4xx fail immediately.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::CompletionConfig;
use crate::error::{Error, Result};

/// Trait for language-model completion providers.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// A human-readable provider name (e.g. `"anthropic"`).
    fn name(&self) -> &str;

    /// Generate a completion for the given prompt.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Completion provider using the Anthropic Messages API.
///
/// Requires the `ANTHROPIC_API_KEY` environment variable to be set.
pub struct AnthropicCompleter {
    model: String,
    max_tokens: u32,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl AnthropicCompleter {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| Error::Config("ANTHROPIC_API_KEY environment variable not set".into()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl CompletionProvider for AnthropicCompleter {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });

        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post("https://api.anthropic.com/v1/messages")
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
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
                                provider: "anthropic".into(),
                                reason: format!("invalid response body: {e}"),
                            }
                        })?;
                        return parse_completion_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(Error::ProviderUnavailable {
                            provider: "anthropic".into(),
                            reason: format!("HTTP {status}: {body_text}"),
                        });
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    return Err(Error::Provider {
                        provider: "anthropic".into(),
                        status: status.as_u16(),
                        message: body_text,
                    });
                }
                Err(e) => {
                    last_err = Some(Error::ProviderUnavailable {
                        provider: "anthropic".into(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::ProviderUnavailable {
            provider: "anthropic".into(),
            reason: "completion failed after retries".into(),
        }))
    }
}

fn parse_completion_response(json: &serde_json::Value) -> Result<String> {
    let text = json
        .get("content")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|block| block.get("text"))
        .and_then(|t| t.as_str())
        .ok_or_else(|| Error::ProviderUnavailable {
            provider: "anthropic".into(),
            reason: "response missing content[0].text".into(),
        })?;

    Ok(text.to_string())
}
