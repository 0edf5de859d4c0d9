//! QnA Configuration Management
//!
//! Handles configuration from environment variables (and an optional `.env`
//! file), an optional TOML config file, and defaults matching the hosted
//! deployment: 10 model calls per 60 seconds, 500-token chunks, top-7 retrieval.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Chat model configuration
    pub llm: LlmConfig,

    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Chunking and retrieval settings
    pub rag: RagSettings,

    /// Outbound model call quota
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Load the startup configuration.
    ///
    /// Reads `.env` if present, then the TOML file named by `QNA_CONFIG` (if
    /// set), then applies environment overrides and validates the result.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self::load_unvalidated(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Same layering as [`AppConfig::load`] without the startup checks, for
    /// commands that never call the chat model. `env_file` replaces the `.env`
    /// lookup in the current directory and its parents.
    pub fn load_unvalidated(env_file: Option<&Path>) -> Result<Self, ConfigError> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::ParseError {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                tracing::debug!("Loaded environment from {}", path.display());
            }
            None => {
                if let Ok(path) = dotenvy::dotenv() {
                    tracing::debug!("Loaded environment from {}", path.display());
                }
            }
        }

        match std::env::var("QNA_CONFIG") {
            Ok(path) => Self::from_file(path)?.with_env_override(),
            Err(_) => Self::from_env(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(host) = lookup("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            self.server.port = parse_value("API_PORT", port)?;
        }
        if let Some(bytes) = lookup("MAX_UPLOAD_BYTES") {
            self.server.max_upload_bytes = parse_value("MAX_UPLOAD_BYTES", bytes)?;
        }
        if let Some(dir) = lookup("UPLOAD_DIR") {
            self.server.upload_dir = Some(PathBuf::from(dir));
        }
        // CORS origins from environment variable (comma-separated)
        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Chat model
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.openai_api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.llm.openai_base_url = url;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(secs) = lookup("LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_value("LLM_TIMEOUT_SECS", secs)?;
        }

        // Embeddings
        if let Some(provider) = lookup("EMBEDDING_PROVIDER") {
            self.embedding.provider = provider.parse()?;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            self.embedding.ollama_url = url;
        }

        // Chunking and retrieval
        if let Some(size) = lookup("CHUNK_SIZE") {
            self.rag.chunk_size = parse_value("CHUNK_SIZE", size)?;
        }
        if let Some(overlap) = lookup("CHUNK_OVERLAP") {
            self.rag.chunk_overlap = parse_value("CHUNK_OVERLAP", overlap)?;
        }
        if let Some(k) = lookup("RETRIEVAL_TOP_K") {
            self.rag.top_k = parse_value("RETRIEVAL_TOP_K", k)?;
        }

        // Rate limit
        if let Some(requests) = lookup("RATE_LIMIT_REQUESTS") {
            self.rate_limit.requests = parse_value("RATE_LIMIT_REQUESTS", requests)?;
        }
        if let Some(period) = lookup("RATE_LIMIT_PERIOD_SECS") {
            self.rate_limit.period_secs = parse_value("RATE_LIMIT_PERIOD_SECS", period)?;
        }

        Ok(self)
    }

    /// Check the invariants the service relies on at startup
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.llm.openai_api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => return Err(ConfigError::MissingRequired("OPENAI_API_KEY".to_string())),
        }

        if self.rate_limit.requests == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RATE_LIMIT_REQUESTS".to_string(),
                value: "0".to_string(),
            });
        }
        if self.rate_limit.period_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RATE_LIMIT_PERIOD_SECS".to_string(),
                value: "0".to_string(),
            });
        }
        if self.rag.chunk_size == 0 || self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(ConfigError::InvalidValue {
                key: "CHUNK_OVERLAP".to_string(),
                value: format!(
                    "{} (must be smaller than chunk size {})",
                    self.rag.chunk_overlap, self.rag.chunk_size
                ),
            });
        }
        if self.rag.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RETRIEVAL_TOP_K".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum multipart body size in bytes
    pub max_upload_bytes: usize,

    /// Parent directory for per-request upload directories
    pub upload_dir: Option<PathBuf>,

    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_bytes: 25 * 1024 * 1024, // 25MB
            upload_dir: None,
            cors_origins: vec![],
        }
    }
}

/// Chat model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// OpenAI API base URL (for compatible APIs)
    pub openai_base_url: String,

    /// Chat model name
    pub model: String,

    /// Temperature for generation
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which embedding backend to use
    pub provider: EmbeddingProvider,

    /// Embedding model name
    pub model: String,

    /// Ollama server URL
    pub ollama_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Ollama,
            model: "all-minilm".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Supported embedding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local model served by Ollama
    Ollama,
    /// OpenAI embeddings endpoint
    OpenAI,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            _ => Err(ConfigError::InvalidValue {
                key: "EMBEDDING_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Chunking and retrieval settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// Maximum chunk length in tokens
    pub chunk_size: usize,

    /// Tokens shared between consecutive chunks
    pub chunk_overlap: usize,

    /// Chunks retrieved per question
    pub top_k: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 10,
            top_k: 7,
        }
    }
}

/// Outbound model call quota
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Calls allowed per window
    pub requests: u32,

    /// Window length in seconds
    pub period_secs: u64,
}

impl RateLimitConfig {
    pub fn period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.period_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: 10,
            period_secs: 60,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
