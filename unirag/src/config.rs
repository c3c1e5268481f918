//! Configuration for the retrieval-and-answering pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Separator placed between the original query and the first-pass answer
/// when building the refined second-pass query.
pub const DEFAULT_REFINEMENT_SEPARATOR: &str = " | Additional context from first pass: ";

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Number of documents retrieved when a request does not set a limit.
    pub default_limit: usize,
    /// Minimum similarity applied when a request does not set a threshold.
    pub similarity_threshold: Option<f32>,
    /// How many more documents the second pass retrieves than the first.
    pub refinement_limit_increment: usize,
    /// Maximum number of characters of the first-pass answer spliced into
    /// the second-pass query.
    pub refinement_answer_chars: usize,
    /// Literal joining the original query and the first-pass answer.
    pub refinement_separator: String,
    /// Number of records per store write when indexing.
    pub batch_size: usize,
    /// Background context rendered into the system prompt.
    pub background_context: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            similarity_threshold: None,
            refinement_limit_increment: 10,
            refinement_answer_chars: 250,
            refinement_separator: DEFAULT_REFINEMENT_SEPARATOR.to_string(),
            batch_size: 50,
            background_context: String::new(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check the invariants enforced by [`RagConfigBuilder::build`].
    pub fn validate(&self) -> Result<()> {
        if self.default_limit == 0 {
            return Err(RagError::ConfigError("default_limit must be greater than zero".into()));
        }
        if self.batch_size == 0 {
            return Err(RagError::ConfigError("batch_size must be greater than zero".into()));
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

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the number of documents retrieved when a request has no limit.
    pub fn default_limit(mut self, limit: usize) -> Self {
        self.config.default_limit = limit;
        self
    }

    /// Set the fallback minimum similarity threshold.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = Some(threshold);
        self
    }

    /// Set the second-pass limit increment.
    pub fn refinement_limit_increment(mut self, increment: usize) -> Self {
        self.config.refinement_limit_increment = increment;
        self
    }

    /// Set how much of the first-pass answer feeds the second-pass query.
    pub fn refinement_answer_chars(mut self, chars: usize) -> Self {
        self.config.refinement_answer_chars = chars;
        self
    }

    /// Set the separator between the query and the first-pass answer.
    pub fn refinement_separator(mut self, separator: impl Into<String>) -> Self {
        self.config.refinement_separator = separator.into();
        self
    }

    /// Set the indexing batch size.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set the background context rendered into the system prompt.
    pub fn background_context(mut self, context: impl Into<String>) -> Self {
        self.config.background_context = context.into();
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `default_limit == 0`
    /// - `batch_size == 0`
    /// - `similarity_threshold` is outside `[0, 1]`
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
