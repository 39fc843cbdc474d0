//! Embedding service client trait (§4.4 step 2, §5).

use crate::error::Result;
use async_trait::async_trait;

/// A generated embedding plus the dimension and model identity it carries.
/// The dimension drives the Retrieval Engine's table-provisioning
/// invariant (`V1`): the table is re-created whenever this disagrees with
/// the table's declared column width.
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub embedding: Vec<f32>,
    pub model: String,
    pub dimension: usize,
}

impl EmbeddingResult {
    #[must_use]
    pub fn new(embedding: Vec<f32>, model: impl Into<String>) -> Self {
        let dimension = embedding.len();
        Self {
            embedding,
            model: model.into(),
            dimension,
        }
    }
}

/// Implemented by whatever converts text to vectors. The only network-facing
/// dependency the Retrieval Engine and Orchestrator treat as soft-failing
/// (§4.4: "fail soft — proceed without retrieved context").
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed a single text. Idempotent: callers may retry under
    /// [`crate::retry::RetryPolicy`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::EmbeddingUnavailable`] on timeout or
    /// upstream error.
    async fn embed(&self, text: &str) -> Result<EmbeddingResult>;

    /// Embed a batch of texts. Default implementation embeds sequentially;
    /// implementations backed by a batching API should override this.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingResult>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// The dimension of the active model, without generating an embedding.
    /// Used by table provisioning (`V1`) to check whether a re-create is
    /// needed before doing any real work.
    fn dimension(&self) -> usize;

    /// Stable identifier for the active model, surfaced in metadata and
    /// logs.
    fn model_name(&self) -> &str;
}

/// Cosine similarity in `[-1, 1]`; callers clamp to `[0, 1]` before
/// treating the result as a similarity score (§4.4 step 6).
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// A deterministic mock used by tests and as a development fallback: hashes
/// the text into a fixed-dimension vector so that identical inputs always
/// produce identical embeddings, satisfying the determinism invariant
/// (`V4`/§8) without a live model.
pub struct MockEmbeddingClient {
    dimension: usize,
}

impl MockEmbeddingClient {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for MockEmbeddingClient {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<EmbeddingResult> {
        let mut vector = vec![0.0_f32; self.dimension];
        for (i, byte) in text.bytes().enumerate() {
            let slot = i % self.dimension;
            vector[slot] += f32::from(byte) / 255.0;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(EmbeddingResult::new(vector, "mock-embedding-v1"))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embedding-v1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_vectors_is_zero() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_mismatched_length_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[tokio::test]
    async fn mock_client_is_deterministic() {
        let client = MockEmbeddingClient::new(16);
        let a = client.embed("hello world").await.unwrap();
        let b = client.embed("hello world").await.unwrap();
        assert_eq!(a.embedding, b.embedding);
        assert_eq!(a.dimension, 16);
    }

    #[tokio::test]
    async fn mock_client_distinguishes_different_inputs() {
        let client = MockEmbeddingClient::new(16);
        let a = client.embed("hello").await.unwrap();
        let b = client.embed("goodbye").await.unwrap();
        assert_ne!(a.embedding, b.embedding);
    }
}
