//! In-memory similarity index over the chunks of a single document
//!
//! Vectors are L2-normalised on insert, so a query is one matrix-vector
//! product followed by a sort.

use ndarray::{Array1, Array2, ArrayView1};
use qna_core::{DocumentChunk, QnaError, Result};

use crate::EmbeddingClient;

/// A chunk returned by a similarity query
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,

    /// Cosine similarity to the query, in `[-1, 1]`
    pub score: f32,
}

/// Ephemeral vector index scoped to one document
#[derive(Debug)]
pub struct InMemoryVectorIndex {
    chunks: Vec<DocumentChunk>,
    vectors: Array2<f32>,
}

impl InMemoryVectorIndex {
    /// Embed every chunk and index the results
    pub async fn build(chunks: Vec<DocumentChunk>, embedder: &dyn EmbeddingClient) -> Result<Self> {
        if chunks.is_empty() {
            return Err(QnaError::Embedding("No chunks to embed".to_string()));
        }
        if let Some(blank) = chunks.iter().find(|c| c.content.trim().is_empty()) {
            return Err(QnaError::Embedding(format!(
                "Chunk {} has no text to embed",
                blank.index
            )));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;

        tracing::debug!(
            chunks = chunks.len(),
            model = embedder.model_name(),
            "Embedded document chunks"
        );

        Self::from_embeddings(chunks, vectors)
    }

    /// Index pre-computed embeddings (one per chunk, all the same dimension)
    pub fn from_embeddings(chunks: Vec<DocumentChunk>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(QnaError::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        if dimension == 0 {
            return Err(QnaError::Embedding("Embeddings are empty".to_string()));
        }
        if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dimension) {
            return Err(QnaError::Embedding(format!(
                "Embedding {i} has dimension {}, expected {dimension}",
                v.len()
            )));
        }

        let flat: Vec<f32> = vectors.into_iter().flat_map(normalized).collect();
        let vectors = Array2::from_shape_vec((chunks.len(), dimension), flat)
            .map_err(|e| QnaError::Embedding(format!("Invalid embedding matrix: {e}")))?;

        Ok(Self { chunks, vectors })
    }

    /// Number of indexed chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Embedding dimension
    pub fn dimension(&self) -> usize {
        self.vectors.ncols()
    }

    /// Top-`k` chunks by cosine similarity; ties keep document order
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if query.len() != self.dimension() {
            return Err(QnaError::Embedding(format!(
                "Query embedding has dimension {}, index has {}",
                query.len(),
                self.dimension()
            )));
        }

        let query = Array1::from(normalized(query.to_vec()));
        let scores = self.vectors.dot(&query);

        let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(i, score)| ScoredChunk {
                chunk: self.chunks[i].clone(),
                score,
            })
            .collect())
    }

    /// Embed `query` and return the top-`k` most similar chunks
    pub async fn similarity_search(
        &self,
        embedder: &dyn EmbeddingClient,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let vector = embedder.embed(query).await?;
        self.search(&vector, k)
    }
}

/// Scale to unit length; zero vectors stay zero
fn normalized(vector: Vec<f32>) -> Vec<f32> {
    let norm = ArrayView1::from(&vector).dot(&ArrayView1::from(&vector)).sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return vector;
    }
    vector.into_iter().map(|x| x / norm).collect()
}
