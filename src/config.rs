use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Minimum cosine similarity for a match to count as relevant.
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Maximum matches returned per query.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Optional override applied to curated knowledge kinds (faq, service,
    /// case_study, knowledge) instead of the global threshold.
    #[serde(default)]
    pub knowledge_threshold: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            limit: default_limit(),
            knowledge_threshold: None,
        }
    }
}

fn default_threshold() -> f32 {
    0.7
}
fn default_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// Concurrent embedding calls during batch ingestion.
    #[serde(default = "default_fan_out")]
    pub fan_out: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            fan_out: default_fan_out(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_fan_out() -> usize {
    4
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_provider")]
    pub provider: String,
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_completion_retries")]
    pub max_retries: u32,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_completion_provider(),
            model: default_completion_model(),
            max_tokens: default_max_tokens(),
            max_retries: default_completion_retries(),
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

fn default_completion_provider() -> String {
    "anthropic".to_string()
}
fn default_completion_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_completion_retries() -> u32 {
    3
}
fn default_completion_timeout_secs() -> u64 {
    60
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("failed to read config file {}: {}", path.display(), e))
    })?;

    let config: Config =
        toml::from_str(&content).map_err(|e| Error::Config(format!("failed to parse config: {e}")))?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        return Err(Error::Config("chunking.chunk_size must be > 0".into()));
    }

    // Overlap at or beyond half the window would stall the chunker's
    // forward progress.
    if config.chunking.overlap * 2 >= config.chunking.chunk_size {
        return Err(Error::Config(
            "chunking.overlap must be less than half of chunking.chunk_size".into(),
        ));
    }

    if config.retrieval.limit < 1 {
        return Err(Error::Config("retrieval.limit must be >= 1".into()));
    }

    if !(0.0..=1.0).contains(&config.retrieval.threshold) {
        return Err(Error::Config("retrieval.threshold must be in [0.0, 1.0]".into()));
    }

    if let Some(kt) = config.retrieval.knowledge_threshold {
        if !(0.0..=1.0).contains(&kt) {
            return Err(Error::Config(
                "retrieval.knowledge_threshold must be in [0.0, 1.0]".into(),
            ));
        }
    }

    if config.embedding.dims == 0 {
        return Err(Error::Config("embedding.dims must be > 0".into()));
    }

    if config.embedding.fan_out == 0 {
        return Err(Error::Config("embedding.fan_out must be >= 1".into()));
    }

    match config.embedding.provider.as_str() {
        "openai" => {}
        other => {
            return Err(Error::Config(format!(
                "unknown embedding provider: '{other}'. Must be openai."
            )))
        }
    }

    match config.completion.provider.as_str() {
        "anthropic" => {}
        other => {
            return Err(Error::Config(format!(
                "unknown completion provider: '{other}'. Must be anthropic."
            )))
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            db: DbConfig {
                path: PathBuf::from("/tmp/docchat.sqlite"),
            },
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            completion: CompletionConfig::default(),
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn rejects_oversized_overlap() {
        let mut config = base_config();
        config.chunking.chunk_size = 100;
        config.chunking.overlap = 50;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut config = base_config();
        config.retrieval.threshold = 1.5;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn parses_minimal_toml() {
        let config: Config = toml::from_str(
            r#"
            [db]
            path = "/tmp/docchat.sqlite"
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert!((config.retrieval.threshold - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.retrieval.limit, 10);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
    }
}
