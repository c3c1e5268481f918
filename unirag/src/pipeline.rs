//! Retrieval-augmented answering.
//!
//! The [`RagOrchestrator`] composes an [`EmbeddingProvider`], a
//! [`GenerationProvider`], a [`SearchEngine`] over a [`VectorStore`], a
//! [`PromptAssembler`] and an optional [`Reranker`].
//!
//! A query runs one mandatory pass (embed → search → assemble → generate)
//! and, when [`QueryRequest::second_pass`] is set and the first pass produced
//! answer text, a second pass with a refined query and a larger limit.
//!
//! # Example
//!
//! ```rust,ignore
//! use unirag::{RagOrchestrator, RagConfig, InMemoryVectorStore, QueryRequest};
//!
//! let orchestrator = RagOrchestrator::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(embedder)
//!     .generation_provider(generator)
//!     .vector_store(Arc::new(InMemoryVectorStore::default()))
//!     .build()?;
//!
//! orchestrator.index_into_collection("42", &passages, false).await?;
//! let answer = orchestrator
//!     .answer_with_refinement("42", &QueryRequest::new("What changed?").with_second_pass(true))
//!     .await?;
//! ```

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::RagConfig;
use crate::document::{AnswerResponse, Passage, PipelineResult, QueryRequest, RetrievedDocument};
use crate::embedding::{EmbedPurpose, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::generation::{GenerationOptions, GenerationProvider};
use crate::prompt::PromptAssembler;
use crate::reranker::Reranker;
use crate::search::{SearchEngine, build_records};
use crate::templates::{TemplateParser, TemplateRenderer};
use crate::vectorstore::{CollectionInfo, VectorStore};

/// Which pass produced a final result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerPass {
    /// The mandatory first pass.
    First,
    /// The refinement pass.
    Second,
}

/// Outcome of [`RagOrchestrator::answer_with_refinement`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagAnswer {
    /// The final result.
    pub result: PipelineResult,
    /// The first-pass result, kept for diagnostics when a second pass ran.
    pub first_pass: Option<PipelineResult>,
    /// The pass that produced `result`.
    pub pass: AnswerPass,
}

impl RagAnswer {
    fn first(result: PipelineResult) -> Self {
        Self { result, first_pass: None, pass: AnswerPass::First }
    }

    /// Reduce to the API response.
    pub fn into_response(self) -> AnswerResponse {
        self.result.into_response()
    }
}

/// The retrieval-augmented answering orchestrator.
///
/// Holds no per-request mutable state: independent queries may run
/// concurrently against one orchestrator. Construct one via
/// [`RagOrchestrator::builder()`].
pub struct RagOrchestrator {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    generation_provider: Arc<dyn GenerationProvider>,
    search: SearchEngine,
    prompts: PromptAssembler,
    reranker: Option<Arc<dyn Reranker>>,
}

impl RagOrchestrator {
    /// Create a new [`RagOrchestratorBuilder`].
    pub fn builder() -> RagOrchestratorBuilder {
        RagOrchestratorBuilder::default()
    }

    /// Collection name for a project: `collection_<project_id>`.
    pub fn collection_name(project_id: &str) -> String {
        format!("collection_{}", project_id.trim())
    }

    /// Return a reference to the orchestrator configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the search engine.
    pub fn search_engine(&self) -> &SearchEngine {
        &self.search
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the generation provider.
    pub fn generation_provider(&self) -> &Arc<dyn GenerationProvider> {
        &self.generation_provider
    }

    /// Embed and store passages in the project's collection.
    ///
    /// Creates the collection with the embedding provider's dimensionality if
    /// needed (`do_reset` drops it first). Returns the number of passages written.
    ///
    /// # Errors
    ///
    /// Fails if the embedding model is unconfigured, any passage fails to
    /// embed, or a batch write fails ([`RagError::PartialWrite`]). Batches
    /// written before a failure are kept.
    pub async fn index_into_collection(
        &self,
        project_id: &str,
        passages: &[Passage],
        do_reset: bool,
    ) -> Result<usize> {
        let collection = Self::collection_name(project_id);
        let dimensions = self.embedding_provider.embedding_size().ok_or_else(|| {
            error!(provider = self.embedding_provider.name(), "embedding size is not configured");
            RagError::ConfigError("embedding model size is not configured".to_string())
        })?;

        let texts: Vec<&str> = passages.iter().map(|p| p.text.as_str()).collect();
        let embedder = &self.embedding_provider;
        let vectors = embedder.embed_batch(&texts, EmbedPurpose::Document).await.map_err(|e| {
            error!(collection = %collection, error = %e, "embedding failed during indexing");
            e
        })?;

        self.search.create_collection(&collection, dimensions, do_reset).await?;

        let records = build_records(
            passages.iter().map(|p| p.text.clone()).collect(),
            vectors,
            Some(passages.iter().map(|p| p.metadata.clone()).collect()),
            Some(passages.iter().map(|p| p.id).collect()),
        )?;
        let written = self.search.insert_many(&collection, &records).await?;

        info!(collection = %collection, written, "indexed passages");
        Ok(written)
    }

    /// Drop the project's collection. Returns `false` if it did not exist.
    pub async fn reset_collection(&self, project_id: &str) -> Result<bool> {
        self.search.delete_collection(&Self::collection_name(project_id)).await
    }

    /// Describe the project's collection.
    pub async fn collection_info(&self, project_id: &str) -> Result<CollectionInfo> {
        let collection = self.require_collection(project_id).await?;
        self.search.collection_info(&collection).await
    }

    /// Retrieve documents for `text` without generating an answer.
    ///
    /// Embedding and store failures yield an empty list. A zero `limit` or a
    /// threshold outside `[0, 1]` is a [`RagError::ConfigError`].
    pub async fn search_collection(
        &self,
        project_id: &str,
        text: &str,
        limit: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<RetrievedDocument>> {
        let request = QueryRequest {
            limit: Some(limit),
            similarity_threshold: threshold,
            ..QueryRequest::new(text)
        };
        request.validate()?;
        let collection = self.require_collection(project_id).await?;
        Ok(self.retrieve(&collection, text, limit, threshold, false).await)
    }

    /// Answer a query with a single pass.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the request's limit or threshold
    /// is invalid, [`RagError::CollectionNotFound`] if the project has no
    /// collection and [`RagError::TemplateError`] if a prompt template is
    /// missing. Gateway failures and empty retrieval are not errors: they
    /// produce a result without an answer.
    pub async fn answer(&self, project_id: &str, request: &QueryRequest) -> Result<PipelineResult> {
        request.validate()?;
        let collection = self.require_collection(project_id).await?;
        self.run_pass(&collection, &request.text, self.limit_for(request), request).await
    }

    /// Answer a query, running the refinement pass when requested.
    ///
    /// The second pass runs only if `request.second_pass` is set and the
    /// first pass produced non-empty answer text. It searches with
    /// [`refine_query`](Self::refine_query) and a limit raised by
    /// `refinement_limit_increment`, with the same threshold.
    pub async fn answer_with_refinement(
        &self,
        project_id: &str,
        request: &QueryRequest,
    ) -> Result<RagAnswer> {
        request.validate()?;
        let collection = self.require_collection(project_id).await?;
        let limit = self.limit_for(request);

        let first = self.run_pass(&collection, &request.text, limit, request).await?;
        if !request.second_pass {
            return Ok(RagAnswer::first(first));
        }

        if !first.has_answer() {
            debug!(collection = %collection, "first pass produced no answer, skipping refinement");
            return Ok(RagAnswer::first(first));
        }

        let refined = self.refine_query(&request.text, first.answer.as_deref().unwrap_or_default());
        let second_limit = limit.saturating_add(self.config.refinement_limit_increment);
        info!(collection = %collection, limit = second_limit, "starting refinement pass");

        let second = self.run_pass(&collection, &refined, second_limit, request).await?;
        Ok(RagAnswer { result: second, first_pass: Some(first), pass: AnswerPass::Second })
    }

    /// Build the second-pass query from the original query and a first-pass answer.
    pub fn refine_query(&self, query: &str, first_answer: &str) -> String {
        let excerpt: String =
            first_answer.chars().take(self.config.refinement_answer_chars).collect();
        format!("{query}{}{excerpt}", self.config.refinement_separator)
    }

    fn limit_for(&self, request: &QueryRequest) -> usize {
        request.limit.unwrap_or(self.config.default_limit)
    }

    async fn require_collection(&self, project_id: &str) -> Result<String> {
        let collection = Self::collection_name(project_id);
        if !self.search.collection_exists(&collection).await? {
            warn!(collection = %collection, "collection not found");
            return Err(RagError::CollectionNotFound(collection));
        }
        Ok(collection)
    }

    /// One retrieve-then-generate cycle.
    async fn run_pass(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
        request: &QueryRequest,
    ) -> Result<PipelineResult> {
        let threshold = request.similarity_threshold.or(self.config.similarity_threshold);
        let documents =
            self.retrieve(collection, query, limit, threshold, request.use_rerank).await;
        if documents.is_empty() {
            debug!(collection, "no documents retrieved, returning empty result");
            return Ok(PipelineResult::empty());
        }

        let generation = self.generation_provider.as_ref();
        let prompt = self.prompts.assemble(generation, &documents, query)?;
        let mut chat_history = vec![prompt.system];

        let options = GenerationOptions::default();
        let answer = match generation.generate(&prompt.body, &mut chat_history, options).await {
            Ok(answer) => Some(answer),
            Err(e) => {
                error!(provider = generation.name(), error = %e, "generation produced no answer");
                None
            }
        };

        debug!(
            collection,
            documents = documents.len(),
            answered = answer.is_some(),
            "pass completed"
        );
        Ok(PipelineResult {
            answer,
            prompt: Some(prompt.body),
            chat_history: Some(chat_history),
            used_documents: documents,
        })
    }

    /// Embed, search and optionally rerank. Failures yield no documents.
    async fn retrieve(
        &self,
        collection: &str,
        text: &str,
        limit: usize,
        threshold: Option<f32>,
        use_rerank: bool,
    ) -> Vec<RetrievedDocument> {
        if text.trim().is_empty() {
            debug!(collection, "empty query text");
            return Vec::new();
        }

        let vector = match self.embedding_provider.embed(text, EmbedPurpose::Query).await {
            Ok(vector) if !vector.is_empty() => vector,
            Ok(_) => {
                debug!(collection, "query embedding is empty");
                return Vec::new();
            }
            Err(e) => {
                error!(
                    provider = self.embedding_provider.name(),
                    error = %e,
                    "query embedding failed"
                );
                return Vec::new();
            }
        };

        let documents = match self.search.search(collection, &vector, limit, threshold).await {
            Ok(documents) => documents,
            Err(e) => {
                error!(collection, error = %e, "vector search failed");
                return Vec::new();
            }
        };

        let reranker = match &self.reranker {
            Some(reranker) if use_rerank && !documents.is_empty() => reranker,
            _ => return documents,
        };
        match reranker.rerank(text, documents.clone()).await {
            Ok(reranked) => rerank_cleanup(reranked, limit, threshold),
            Err(e) => {
                warn!(error = %e, "reranking failed, keeping vector ranking");
                documents
            }
        }
    }
}

/// Restore threshold, descending order and limit after a reranker.
fn rerank_cleanup(
    mut documents: Vec<RetrievedDocument>,
    limit: usize,
    threshold: Option<f32>,
) -> Vec<RetrievedDocument> {
    documents.retain(|doc| !doc.score.is_nan() && threshold.is_none_or(|t| doc.score >= t));
    documents.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    documents.truncate(limit);
    documents
}

/// Builder for constructing a [`RagOrchestrator`].
///
/// The embedding provider, generation provider and vector store are
/// required. Templates default to the built-in English set, config to
/// [`RagConfig::default`].
#[derive(Default)]
pub struct RagOrchestratorBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    generation_provider: Option<Arc<dyn GenerationProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    templates: Option<Arc<dyn TemplateRenderer>>,
    reranker: Option<Arc<dyn Reranker>>,
}

impl RagOrchestratorBuilder {
    /// Set the orchestrator configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the generation provider.
    pub fn generation_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.generation_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the template renderer.
    pub fn templates(mut self, templates: Arc<dyn TemplateRenderer>) -> Self {
        self.templates = Some(templates);
        self
    }

    /// Set a reranker, used for requests with `use_rerank`.
    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Build the [`RagOrchestrator`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required component is missing
    /// or the config is invalid.
    pub fn build(self) -> Result<RagOrchestrator> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let generation_provider = self
            .generation_provider
            .ok_or_else(|| RagError::ConfigError("generation_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let templates = self.templates.unwrap_or_else(|| Arc::new(TemplateParser::default()));

        Ok(RagOrchestrator {
            search: SearchEngine::new(vector_store).with_batch_size(config.batch_size),
            prompts: PromptAssembler::new(templates, config.background_context.clone()),
            config,
            embedding_provider,
            generation_provider,
            reranker: self.reranker,
        })
    }
}
