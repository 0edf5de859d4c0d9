//! Deterministic embedding and chat doubles
//!
//! `KeywordEmbedding` hashes content words into a fixed number of buckets, so
//! texts sharing words land close together. `ExtractiveChatModel` answers with
//! the context sentence that best covers the question's content words, or
//! `Information not found` when none covers at least half of them.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use qna_core::{ChatMessage, ChatRole, LlmClient, QnaError, Result};
use qna_vector::EmbeddingClient;

use crate::prompt::NOT_FOUND_ANSWER;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "did", "do", "does", "for", "from", "how",
    "in", "is", "it", "of", "on", "or", "the", "to", "was", "what", "when", "where", "which",
    "who", "why", "with",
];

/// Lowercased alphanumeric words minus stopwords
fn content_words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Bag-of-words embedding over hashed buckets
#[derive(Debug)]
pub struct KeywordEmbedding {
    dimension: usize,
    batch_calls: AtomicUsize,
    query_calls: AtomicUsize,
}

impl KeywordEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            batch_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
        }
    }

    /// Number of `embed_batch` calls so far
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// Number of `embed` calls so far
    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        for word in content_words(text) {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            vector[(hasher.finish() % self.dimension as u64) as usize] += 1.0;
        }
        vector
    }
}

impl Default for KeywordEmbedding {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingClient for KeywordEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn model_name(&self) -> &str {
        "keyword-hash"
    }
}

/// Chat model that quotes the best-matching context sentence
#[derive(Debug, Default)]
pub struct ExtractiveChatModel {
    calls: AtomicUsize,
}

impl ExtractiveChatModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `chat` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Pull the `Context:` and `Question:` sections out of a rendered user message
fn sections(prompt: &str) -> Option<(&str, &str)> {
    let (_, rest) = prompt.split_once("Context:\n")?;
    let (context, rest) = rest.split_once("\n\nQuestion:\n")?;
    let question = rest
        .split_once("\n\nPlease provide")
        .map(|(q, _)| q)
        .unwrap_or(rest);
    Some((context, question))
}

fn extract_answer(context: &str, question: &str) -> String {
    let wanted = content_words(question);
    if wanted.is_empty() {
        return NOT_FOUND_ANSWER.to_string();
    }

    let best = context
        .split(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|sentence| {
            let words = content_words(sentence);
            let hits = wanted.iter().filter(|w| words.contains(w)).count();
            (hits, sentence)
        })
        .fold(None, |best: Option<(usize, &str)>, candidate| match best {
            Some(b) if b.0 >= candidate.0 => Some(b),
            _ => Some(candidate),
        });

    match best {
        Some((hits, sentence)) if hits > 0 && hits * 2 >= wanted.len() => format!("{sentence}."),
        _ => NOT_FOUND_ANSWER.to_string(),
    }
}

#[async_trait]
impl LlmClient for ExtractiveChatModel {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let prompt = messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .ok_or_else(|| QnaError::ModelInvocation("No user message".to_string()))?;

        // Surrounding whitespace exercises output parsing
        Ok(match sections(&prompt.content) {
            Some((context, question)) => format!("  {}\n", extract_answer(context, question)),
            None => NOT_FOUND_ANSWER.to_string(),
        })
    }

    fn model_name(&self) -> &str {
        "extractive"
    }
}

/// Chat model whose every call fails
#[derive(Debug, Default)]
pub struct FailingChatModel;

#[async_trait]
impl LlmClient for FailingChatModel {
    async fn chat(&self, _messages: &[ChatMessage]) -> Result<String> {
        Err(QnaError::ModelInvocation(
            "Request failed: connection refused".to_string(),
        ))
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}
