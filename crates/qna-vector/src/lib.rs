//! QnA Vector - Embeddings and similarity search
//!
//! Converts document chunks into vectors through an `EmbeddingClient`
//! and keeps them in an `InMemoryVectorIndex` that lives for one request.

pub mod embedding;
pub mod index;

pub use embedding::{create_embedding_client, EmbeddingClient, OllamaEmbedding, OpenAiEmbedding};
pub use index::{InMemoryVectorIndex, ScoredChunk};
