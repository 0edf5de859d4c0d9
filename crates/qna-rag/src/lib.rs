//! QnA RAG - Retrieval-augmented answering over uploaded documents
//!
//! This crate ties document chunking, the per-request vector index and the
//! chat model together:
//! - `QnaPipeline`: index a document once, answer its questions in order
//! - `ChatPromptTemplate`: the contextual answer-extraction prompt
//! - `OpenAiClient`: chat completions over HTTP
//! - `RateLimiter`: process-wide sliding window around model calls

pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod rate_limit;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use llm::OpenAiClient;
pub use pipeline::{AnswerRecord, QnaPipeline};
pub use prompt::{ChatPromptTemplate, NOT_FOUND_ANSWER};
pub use rate_limit::RateLimiter;
