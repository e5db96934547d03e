use crate::error::RagError;
use anyhow::Result;
use clap::ValueEnum;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_STORE_PATH: &str = "./rag_store";
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 150;
pub const DEFAULT_TOP_K: usize = 4;
pub const DEFAULT_HASHING_DIMENSIONS: usize = 384;

/// How passages are embedded
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbeddingBackend {
    /// Remote embedding endpoint of the OpenAI compatible API
    Openai,
    /// Offline feature-hashing embedder
    Hashing,
}

/// How extracted text is split into passages
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChunkPolicy {
    /// Blank-line delimited paragraphs
    Paragraph,
    /// Fixed character windows with overlap
    Fixed,
}

/// Where collections live
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub model: String,
    pub hashing_dimensions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub policy: ChunkPolicy,
    pub chunk_size: usize,
    pub overlap: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

/// Settings for the OpenAI compatible HTTP API (embeddings and chat)
#[derive(Clone, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Clone, PartialEq)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub local_path: PathBuf,
    pub remote_url: Option<String>,
    pub remote_api_key: Option<String>,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("backend", &self.backend)
            .field("local_path", &self.local_path)
            .field("remote_url", &self.remote_url)
            .field(
                "remote_api_key",
                &self.remote_api_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Full application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RagConfig {
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
    pub top_k: usize,
    pub generation: GenerationConfig,
    pub api: ApiConfig,
    pub store: StoreConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        RagConfig {
            embedding: EmbeddingConfig {
                backend: EmbeddingBackend::Openai,
                model: DEFAULT_EMBEDDING_MODEL.to_string(),
                hashing_dimensions: DEFAULT_HASHING_DIMENSIONS,
            },
            chunking: ChunkingConfig {
                policy: ChunkPolicy::Paragraph,
                chunk_size: DEFAULT_CHUNK_SIZE,
                overlap: DEFAULT_CHUNK_OVERLAP,
            },
            top_k: DEFAULT_TOP_K,
            generation: GenerationConfig {
                model: DEFAULT_CHAT_MODEL.to_string(),
                temperature: 0.7,
                max_tokens: 500,
                timeout_secs: 60,
            },
            api: ApiConfig {
                base_url: DEFAULT_API_BASE_URL.to_string(),
                api_key: None,
            },
            store: StoreConfig {
                backend: StoreBackend::Local,
                local_path: PathBuf::from(DEFAULT_STORE_PATH),
                remote_url: None,
                remote_api_key: None,
            },
        }
    }
}

impl RagConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup, starting from defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = RagConfig::default();

        if let Some(v) = get("RAG_EMBEDDER") {
            config.embedding.backend = parse_enum("RAG_EMBEDDER", &v)?;
        }
        if let Some(v) = get("RAG_EMBEDDING_MODEL") {
            config.embedding.model = v;
        }
        if let Some(v) = get("RAG_HASHING_DIMENSIONS") {
            config.embedding.hashing_dimensions = parse_number("RAG_HASHING_DIMENSIONS", &v)?;
        }
        if let Some(v) = get("RAG_CHUNK_POLICY") {
            config.chunking.policy = parse_enum("RAG_CHUNK_POLICY", &v)?;
        }
        if let Some(v) = get("RAG_CHUNK_SIZE") {
            config.chunking.chunk_size = parse_number("RAG_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = get("RAG_CHUNK_OVERLAP") {
            config.chunking.overlap = parse_number("RAG_CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = get("RAG_TOP_K") {
            config.top_k = parse_number("RAG_TOP_K", &v)?;
        }
        if let Some(v) = get("RAG_CHAT_MODEL") {
            config.generation.model = v;
        }
        if let Some(v) = get("RAG_TEMPERATURE") {
            config.generation.temperature = parse_number("RAG_TEMPERATURE", &v)?;
        }
        if let Some(v) = get("RAG_MAX_TOKENS") {
            config.generation.max_tokens = parse_number("RAG_MAX_TOKENS", &v)?;
        }
        if let Some(v) = get("RAG_TIMEOUT_SECS") {
            config.generation.timeout_secs = parse_number("RAG_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            config.api.base_url = v.trim_end_matches('/').to_string();
        }
        config.api.api_key = get("OPENAI_API_KEY");
        if let Some(v) = get("RAG_STORE_PATH") {
            config.store.local_path = PathBuf::from(v);
        }
        config.store.remote_url = get("QDRANT_URL");
        config.store.remote_api_key = get("QDRANT_API_KEY");

        Ok(config)
    }

    /// Check value ranges. Credentials are checked separately, per action.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(invalid("chunk size must be greater than zero"));
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            return Err(invalid(&format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunking.overlap, self.chunking.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(invalid("top-k must be at least 1"));
        }
        if self.embedding.hashing_dimensions == 0 {
            return Err(invalid("hashing dimensions must be at least 1"));
        }
        if self.embedding.model.trim().is_empty() {
            return Err(invalid("embedding model must not be empty"));
        }
        if self.generation.timeout_secs == 0 {
            return Err(invalid("request timeout must be at least one second"));
        }
        Ok(())
    }

    /// The API key, or a missing-credential error.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api
            .api_key
            .as_deref()
            .ok_or_else(|| RagError::MissingCredential("OPENAI_API_KEY").into())
    }

    /// The remote store endpoint and optional token, or a missing-credential error.
    pub fn require_remote(&self) -> Result<(&str, Option<&str>)> {
        let url = self
            .store
            .remote_url
            .as_deref()
            .ok_or(RagError::MissingCredential("QDRANT_URL"))?;
        Ok((url, self.store.remote_api_key.as_deref()))
    }

    /// Whether the embedding step needs the API key
    pub fn embeds_remotely(&self) -> bool {
        self.embedding.backend == EmbeddingBackend::Openai
    }
}

fn invalid(message: &str) -> anyhow::Error {
    RagError::InvalidConfig(message.to_string()).into()
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(&format!("{} has an invalid value '{}'", key, value)))
}

fn parse_enum<T: ValueEnum>(key: &str, value: &str) -> Result<T> {
    T::from_str(value.trim(), true)
        .map_err(|_| invalid(&format!("{} has an unknown value '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RagConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, RagConfig::default());
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.overlap, 150);
        assert_eq!(config.top_k, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = RagConfig::from_lookup(lookup(&[
            ("RAG_EMBEDDER", "hashing"),
            ("RAG_CHUNK_POLICY", "FIXED"),
            ("RAG_CHUNK_SIZE", "200"),
            ("RAG_CHUNK_OVERLAP", "20"),
            ("RAG_TOP_K", "2"),
            ("OPENAI_BASE_URL", "http://localhost:8080/v1/"),
            ("QDRANT_URL", "http://localhost:6334"),
        ]))
        .unwrap();
        assert_eq!(config.embedding.backend, EmbeddingBackend::Hashing);
        assert_eq!(config.chunking.policy, ChunkPolicy::Fixed);
        assert_eq!(config.chunking.chunk_size, 200);
        assert_eq!(config.top_k, 2);
        assert_eq!(config.api.base_url, "http://localhost:8080/v1");
        assert_eq!(config.require_remote().unwrap().0, "http://localhost:6334");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(RagConfig::from_lookup(lookup(&[("RAG_TOP_K", "many")])).is_err());
        assert!(RagConfig::from_lookup(lookup(&[("RAG_EMBEDDER", "magic")])).is_err());

        let mut config = RagConfig::default();
        config.chunking.overlap = config.chunking.chunk_size;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_missing_credentials() {
        let config = RagConfig::default();
        let err = config.require_api_key().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::MissingCredential("OPENAI_API_KEY"))
        ));
        let err = config.require_remote().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::MissingCredential("QDRANT_URL"))
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = RagConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-secret")])).unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("sk-secret"));
    }
}
