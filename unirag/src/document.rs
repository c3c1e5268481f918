//! Data types for passages, retrieval results and pipeline requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RagError, Result};
use crate::generation::ChatMessage;

/// Limit sent by callers that want "all documents".
///
/// This is an ordinary large integer, not an unbounded mode: the search
/// engine still caps recall at [`MAX_CANDIDATES`](crate::search::MAX_CANDIDATES).
pub const UNBOUNDED_LIMIT: usize = 999_999;

/// A passage waiting to be indexed: text plus metadata, not yet embedded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Passage {
    /// Record id the passage is stored under.
    pub id: u64,
    /// The passage text.
    pub text: String,
    /// Arbitrary metadata carried in the store payload.
    #[serde(default)]
    pub metadata: Value,
}

/// A unit of indexed content as written to the vector store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PassageRecord {
    /// Record id inside the collection.
    pub id: u64,
    /// The passage text.
    pub text: String,
    /// Arbitrary metadata carried in the store payload.
    pub metadata: Value,
    /// Embedding of `text`; its length equals the collection dimensionality.
    pub vector: Vec<f32>,
}

/// A passage returned by a search, scored by similarity in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedDocument {
    /// Similarity to the query (1.0 is a perfect match).
    pub score: f32,
    /// The passage text.
    pub text: String,
}

/// One invocation of the answering pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryRequest {
    /// The user question.
    pub text: String,
    /// Maximum number of documents to retrieve. Falls back to the configured default.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Minimum similarity a document must reach. Falls back to the configured default.
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
    /// Rerank retrieved documents when a reranker is configured.
    #[serde(default)]
    pub use_rerank: bool,
    /// Run the refinement pass after a successful first pass.
    #[serde(default)]
    pub second_pass: bool,
}

impl QueryRequest {
    /// Create a request with the given text and every option unset.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            limit: None,
            similarity_threshold: None,
            use_rerank: false,
            second_pass: false,
        }
    }

    /// Set the retrieval limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Request every document the store can return.
    pub fn unbounded(mut self) -> Self {
        self.limit = Some(UNBOUNDED_LIMIT);
        self
    }

    /// Set the similarity threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    /// Enable reranking.
    pub fn with_rerank(mut self, use_rerank: bool) -> Self {
        self.use_rerank = use_rerank;
        self
    }

    /// Enable the refinement pass.
    pub fn with_second_pass(mut self, second_pass: bool) -> Self {
        self.second_pass = second_pass;
        self
    }

    /// Check the per-request overrides.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `limit` is zero or
    /// `similarity_threshold` is not within `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if self.limit == Some(0) {
            return Err(RagError::ConfigError("limit must be greater than zero".into()));
        }
        if let Some(threshold) = self.similarity_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(RagError::ConfigError(format!(
                    "similarity_threshold ({threshold}) must be within [0, 1]"
                )));
            }
        }
        Ok(())
    }
}

/// Output of one retrieve-then-generate pass.
///
/// When retrieval yields no documents every field is empty: this is the
/// "no answer" terminal state, not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PipelineResult {
    /// The generated answer, absent when generation produced nothing.
    pub answer: Option<String>,
    /// The full prompt body sent to the generation backend.
    pub prompt: Option<String>,
    /// The chat history the prompt was sent with.
    pub chat_history: Option<Vec<ChatMessage>>,
    /// Documents the prompt was built from, in descending similarity.
    pub used_documents: Vec<RetrievedDocument>,
}

impl PipelineResult {
    /// The "no answer" result.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Return `true` if this pass produced non-empty answer text.
    pub fn has_answer(&self) -> bool {
        self.answer.as_deref().is_some_and(|answer| !answer.trim().is_empty())
    }

    /// Reduce the result to what the API layer returns.
    pub fn into_response(self) -> AnswerResponse {
        AnswerResponse { answer: self.answer, used_documents: self.used_documents }
    }
}

/// The payload returned to callers of the pipeline entry point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerResponse {
    /// The generated answer, if any.
    pub answer: Option<String>,
    /// Documents used to build the prompt.
    pub used_documents: Vec<RetrievedDocument>,
}
