//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Why a text is being embedded.
///
/// Backends with asymmetric encoders embed stored passages and search
/// queries differently. Backends without that distinction ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedPurpose {
    /// A passage that will be stored in a collection.
    Document,
    /// A search query.
    Query,
}

/// A provider that generates vector embeddings from text input.
///
/// Every vector produced by one configured instance has length
/// [`embedding_size`](EmbeddingProvider::embedding_size); collections are
/// created with that dimensionality. An `Err` is the "no result" signal:
/// callers treat it as an empty vector.
///
/// # Example
///
/// ```rust,ignore
/// use unirag::{EmbedPurpose, EmbeddingProvider};
///
/// let vector = provider.embed("hello world", EmbedPurpose::Query).await?;
/// assert_eq!(Some(vector.len()), provider.embedding_size());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short provider name used in logs and errors.
    fn name(&self) -> &str;

    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str, purpose: EmbedPurpose) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially and stops at the first failure.
    async fn embed_batch(&self, texts: &[&str], purpose: EmbedPurpose) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text, purpose).await?);
        }
        Ok(results)
    }

    /// Dimensionality of the configured embedding model, `None` while unconfigured.
    fn embedding_size(&self) -> Option<usize>;
}

/// Check a backend vector against the configured dimensionality.
pub(crate) fn check_vector(provider: &str, vector: Vec<f32>, expected: usize) -> Result<Vec<f32>> {
    if vector.is_empty() {
        return Err(RagError::EmbeddingError {
            provider: provider.into(),
            message: "backend returned an empty embedding".into(),
        });
    }
    if vector.len() != expected {
        return Err(RagError::EmbeddingError {
            provider: provider.into(),
            message: format!(
                "backend returned {} dimensions, model is configured for {expected}",
                vector.len()
            ),
        });
    }
    Ok(vector)
}
