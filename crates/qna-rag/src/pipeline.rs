//! Document question-answering pipeline
//!
//! load → split → embed → (per question) retrieve → prompt → rate-limit → chat

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use qna_core::{AppConfig, DocumentChunk, LlmClient, QnaError, Result};
use qna_parser::DocumentChunker;
use qna_vector::{create_embedding_client, EmbeddingClient, InMemoryVectorIndex};
use serde::Serialize;

use crate::llm::OpenAiClient;
use crate::prompt::{format_context, parse_answer, ChatPromptTemplate};
use crate::rate_limit::RateLimiter;

/// One answered question
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerRecord {
    pub question: String,
    pub answer: String,
}

/// Retrieval-augmented answering over a single document
pub struct QnaPipeline {
    chunker: Arc<DocumentChunker>,
    embedder: Arc<dyn EmbeddingClient>,
    llm: Arc<dyn LlmClient>,
    limiter: Arc<RateLimiter>,
    prompt: ChatPromptTemplate,
    top_k: usize,
}

impl QnaPipeline {
    pub fn new(
        chunker: Arc<DocumentChunker>,
        embedder: Arc<dyn EmbeddingClient>,
        llm: Arc<dyn LlmClient>,
        limiter: Arc<RateLimiter>,
        top_k: usize,
    ) -> Self {
        Self {
            chunker,
            embedder,
            llm,
            limiter,
            prompt: ChatPromptTemplate::default(),
            top_k: top_k.max(1),
        }
    }

    /// Wire the OpenAI chat client, the configured embedding provider and a
    /// fresh limiter from config
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let chunker = DocumentChunker::with_tiktoken(config.rag.chunk_size, config.rag.chunk_overlap)?;
        let embedder: Arc<dyn EmbeddingClient> = Arc::from(create_embedding_client(config)?);
        let llm = OpenAiClient::from_config(&config.llm)?;

        tracing::info!(
            chat_model = llm.model_name(),
            embedding_model = embedder.model_name(),
            chunk_size = config.rag.chunk_size,
            chunk_overlap = config.rag.chunk_overlap,
            top_k = config.rag.top_k,
            rate_limit = config.rate_limit.requests,
            rate_period_secs = config.rate_limit.period_secs,
            "QnA pipeline configured"
        );

        Ok(Self::new(
            Arc::new(chunker),
            embedder,
            Arc::new(llm),
            Arc::new(RateLimiter::from_config(&config.rate_limit)),
            config.rag.top_k,
        ))
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Load and split a document on the blocking pool
    pub async fn extract_chunks(&self, path: &Path) -> Result<Vec<DocumentChunk>> {
        let chunker = self.chunker.clone();
        let path: PathBuf = path.to_path_buf();

        tokio::task::spawn_blocking(move || chunker.extract_chunks(&path))
            .await
            .map_err(|e| QnaError::Other(anyhow::anyhow!("Document loading task failed: {e}")))?
            .map_err(QnaError::from)
    }

    /// Embed chunks into a fresh index
    pub async fn embed_chunks(&self, chunks: Vec<DocumentChunk>) -> Result<InMemoryVectorIndex> {
        InMemoryVectorIndex::build(chunks, self.embedder.as_ref()).await
    }

    /// Load, split and index a document
    pub async fn process_document(&self, path: &Path) -> Result<InMemoryVectorIndex> {
        let start = Instant::now();

        let chunks = self.extract_chunks(path).await?;
        if chunks.is_empty() {
            return Err(QnaError::DocumentLoad(
                "document contains no extractable text".to_string(),
            ));
        }

        let index = self.embed_chunks(chunks).await?;

        tracing::info!(
            path = %path.display(),
            chunks = index.len(),
            dimension = index.dimension(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Document indexed"
        );

        Ok(index)
    }

    /// Answer one question about a document
    pub async fn answer(&self, path: &Path, question: &str) -> Result<String> {
        validate_question(question)?;
        let index = self.process_document(path).await?;
        self.answer_with_index(&index, question).await
    }

    /// Answer one question against an already built index
    pub async fn answer_with_index(
        &self,
        index: &InMemoryVectorIndex,
        question: &str,
    ) -> Result<String> {
        validate_question(question)?;
        let start = Instant::now();

        let retrieved = index
            .similarity_search(self.embedder.as_ref(), question, self.top_k)
            .await?;
        let context = format_context(&retrieved);
        let messages = self.prompt.format_messages(&context, question);

        self.limiter.acquire().await;
        let raw = self.llm.chat(&messages).await?;
        let answer = parse_answer(&raw);

        tracing::debug!(
            retrieved = retrieved.len(),
            top_score = retrieved.first().map(|r| r.score).unwrap_or(0.0),
            model = self.llm.model_name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Question answered"
        );

        Ok(answer)
    }

    /// Index the document once and answer every question in order
    ///
    /// Questions are validated before the document is touched. An empty
    /// question list does no work at all.
    pub async fn answer_all(&self, path: &Path, questions: &[String]) -> Result<Vec<AnswerRecord>> {
        for (i, question) in questions.iter().enumerate() {
            if question.trim().is_empty() {
                return Err(QnaError::Validation(format!("Question {i} is empty")));
            }
        }
        if questions.is_empty() {
            return Ok(Vec::new());
        }

        let index = self.process_document(path).await?;

        let mut records = Vec::with_capacity(questions.len());
        for (i, question) in questions.iter().enumerate() {
            tracing::info!(question_index = i, total = questions.len(), "Answering question");
            let answer = self.answer_with_index(&index, question).await?;
            records.push(AnswerRecord {
                question: question.clone(),
                answer,
            });
        }

        Ok(records)
    }
}

fn validate_question(question: &str) -> Result<()> {
    if question.trim().is_empty() {
        return Err(QnaError::Validation("Question cannot be empty".to_string()));
    }
    Ok(())
}
