/// Embedding provider trait and supporting types
///
/// Provides a pluggable interface for text embedding generation.
/// Supports local fastembed models (default, no API key) and OpenAI API.
/// The scoring engine never calls a provider itself: the request pipeline embeds
/// items and topics first and hands the vectors to the engine.

pub mod local;
pub mod openai;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// fastembed model initialization failure
    #[error("Model initialization error: {0}")]
    ModelInit(String),

    /// Embedding generation failure (inference error)
    #[error("Embedding generation error: {0}")]
    Generation(String),

    /// API provider returned an HTTP error
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Provider not configured (e.g., missing API key)
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Core trait for embedding text into fixed-dimension float vectors.
///
/// Implementations must be Send + Sync to support use in async contexts
/// and across thread boundaries (e.g., Arc<dyn EmbeddingProvider>).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for the given text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Generate embeddings for several texts, in input order.
    ///
    /// The default implementation embeds one text at a time.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Return the model name identifier (e.g., "all-MiniLM-L6-v2").
    fn model_name(&self) -> &str;

    /// Return the dimension of the embedding vectors produced by this model.
    fn dimension(&self) -> usize;
}
