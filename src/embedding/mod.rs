//! Text-to-vector embedding clients.
//!
//! Provides the [`EmbeddingProvider`] trait, the HTTP [`ollama::OllamaEmbedder`]
//! implementation, and the little-endian blob codec used for the
//! `sentences.embedding` column.

pub mod ollama;

use crate::error::EmbeddingError;

pub use ollama::OllamaEmbedder;

/// Prefix recommended by retrieval-tuned models for the query side of a search.
pub const QUERY_PREFIX: &str = "Represent this sentence for searching relevant passages: ";

/// Trait for embedding text into vectors.
///
/// All methods are blocking and may be called from many threads at once.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Model identifier recorded alongside the stored vectors.
    fn model(&self) -> &str;

    /// Embed and serialize to the on-disk blob format.
    fn embed_blob(&self, text: &str) -> Result<Vec<u8>, EmbeddingError> {
        self.embed(text).map(|v| embedding_to_bytes(&v))
    }
}

/// Serialize a vector as consecutive little-endian `f32` values.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Inverse of [`embedding_to_bytes`]. Fails if the blob is not a whole number of floats.
pub fn bytes_to_embedding(blob: &[u8]) -> Result<Vec<f32>, EmbeddingError> {
    if blob.len() % 4 != 0 {
        return Err(EmbeddingError::Format(format!(
            "embedding blob of {} bytes is not a multiple of 4",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Cosine similarity of two equal-length vectors. Zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
