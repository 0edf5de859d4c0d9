//! QnA Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout the QnA service:
//! - Document chunks and their source metadata
//! - Chat messages exchanged with the language model
//! - The common error type
//! - The `LlmClient` trait implemented by chat-model backends
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, ConfigError, EmbeddingConfig, EmbeddingProvider, LlmConfig, RagSettings,
    RateLimitConfig, ServerConfig,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for QnA operations
#[derive(Error, Debug)]
pub enum QnaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Document load error: {0}")]
    DocumentLoad(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Model invocation error: {0}")]
    ModelInvocation(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for QnaError {
    fn from(err: ConfigError) -> Self {
        QnaError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, QnaError>;

// ============================================================================
// Document Chunks
// ============================================================================

/// Where a chunk came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Path of the originating document
    pub source: String,

    /// 1-based page number, when the format has pages
    pub page: Option<u32>,

    /// Byte offset of the chunk within its page (or the whole text)
    pub start_index: usize,
}

/// A contiguous span of extracted document text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Chunk text
    pub content: String,

    /// Position of the chunk in document order
    pub index: u32,

    /// Source metadata
    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    /// Create a chunk without page information
    pub fn new(content: impl Into<String>, index: u32, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            index,
            metadata: ChunkMetadata {
                source: source.into(),
                page: None,
                start_index: 0,
            },
        }
    }

    /// Set the page number
    pub fn with_page(mut self, page: u32) -> Self {
        self.metadata.page = Some(page);
        self
    }

    /// Set the start offset
    pub fn with_start_index(mut self, start_index: usize) -> Self {
        self.metadata.start_index = start_index;
        self
    }
}

// ============================================================================
// Chat Messages
// ============================================================================

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single message of a chat-style model request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for chat-model backends
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a chat request and return the raw completion text
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Model identifier, used in logs
    fn model_name(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_builder() {
        let chunk = DocumentChunk::new("Some text", 3, "report.pdf")
            .with_page(2)
            .with_start_index(120);

        assert_eq!(chunk.index, 3);
        assert_eq!(chunk.metadata.source, "report.pdf");
        assert_eq!(chunk.metadata.page, Some(2));
        assert_eq!(chunk.metadata.start_index, 120);
    }

    #[test]
    fn test_chat_role_serialization() {
        let msg = ChatMessage::system("be precise");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "be precise");

        let json = serde_json::to_value(ChatMessage::user("q")).unwrap();
        assert_eq!(json["role"], "user");
    }

    #[test]
    fn test_config_error_conversion() {
        let err: QnaError = ConfigError::MissingRequired("OPENAI_API_KEY".to_string()).into();
        assert!(matches!(err, QnaError::Config(_)));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
