//! Error types for the `unirag` crate.

use thiserror::Error;

/// Errors that can occur in retrieval, generation and indexing.
///
/// Gateway errors ([`EmbeddingError`](RagError::EmbeddingError) and
/// [`GenerationError`](RagError::GenerationError)) are the "no result" signal
/// of the provider contracts. The orchestrator never surfaces them as a query
/// failure; it turns them into an empty [`PipelineResult`](crate::PipelineResult).
#[derive(Debug, Error)]
pub enum RagError {
    /// The embedding backend produced no usable vector.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The generation backend produced no usable answer.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The named collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// The store was used before `connect` or after `disconnect`.
    #[error("Vector store ({backend}) is not connected")]
    NotConnected {
        /// The vector store backend.
        backend: String,
    },

    /// A vector did not match the collection dimensionality.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality of the collection.
        expected: usize,
        /// Dimensionality of the offending vector.
        actual: usize,
    },

    /// A batched write stopped part-way. Batches already written stay written.
    #[error(
        "Partial write to '{collection}': {written_batches}/{total_batches} batches written: {message}"
    )]
    PartialWrite {
        /// Target collection.
        collection: String,
        /// Number of batches that were written before the failure.
        written_batches: usize,
        /// Number of batches the write was split into.
        total_batches: usize,
        /// The underlying failure.
        message: String,
    },

    /// A template could not be found or rendered.
    #[error("Template error: {0}")]
    TemplateError(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in the RAG pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
