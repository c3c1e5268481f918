//! # unirag
//!
//! Retrieval-augmented question answering over per-project passage collections.
//!
//! ## Overview
//!
//! - [`EmbeddingProvider`] and [`GenerationProvider`] gateways with OpenAI
//!   (and OpenAI-compatible), DeepSeek and Cohere implementations in [`providers`]
//! - [`VectorStore`] backends: [`InMemoryVectorStore`] with an optional JSON
//!   snapshot, and Qdrant behind the `qdrant` feature
//! - [`SearchEngine`]: candidate over-fetch, distance to similarity conversion,
//!   threshold filtering, ordering and limit
//! - [`PromptAssembler`] over [`templates`]
//! - [`RagOrchestrator`]: one- or two-pass answering
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use unirag::{QueryRequest, RagOrchestrator, Settings, factory};
//!
//! let settings = Settings::from_env()?;
//! let store = factory::vector_store(&settings)?;
//! store.connect().await?;
//!
//! let orchestrator = RagOrchestrator::builder()
//!     .config(settings.rag_config()?)
//!     .embedding_provider(factory::embedding_provider(&settings)?)
//!     .generation_provider(factory::generation_provider(&settings)?)
//!     .vector_store(store)
//!     .templates(std::sync::Arc::new(settings.template_parser()))
//!     .build()?;
//!
//! let answer = orchestrator.answer("1", &QueryRequest::new("What happened?")).await?;
//! ```

pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod factory;
pub mod generation;
pub mod inmemory;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod reranker;
pub mod search;
pub mod settings;
pub mod templates;
pub mod vectorstore;

#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use config::{RagConfig, RagConfigBuilder};
pub use document::{
    AnswerResponse, Passage, PassageRecord, PipelineResult, QueryRequest, RetrievedDocument,
    UNBOUNDED_LIMIT,
};
pub use embedding::{EmbedPurpose, EmbeddingProvider};
pub use error::{RagError, Result};
pub use generation::{
    ChatMessage, GenerationOptions, GenerationProvider, Role, RoleVocabulary, truncate_and_trim,
};
pub use inmemory::InMemoryVectorStore;
pub use pipeline::{AnswerPass, RagAnswer, RagOrchestrator, RagOrchestratorBuilder};
pub use prompt::{AssembledPrompt, PromptAssembler};
pub use providers::{CohereProvider, DeepSeekProvider, OpenAiProvider, ProviderDefaults};
pub use reranker::{NoOpReranker, Reranker, TermOverlapReranker};
pub use search::{MAX_CANDIDATES, SearchEngine};
pub use settings::{ProviderBackend, Settings, StoreBackend};
pub use templates::{TemplateParser, TemplateRenderer};
pub use vectorstore::{CollectionInfo, DistanceMetric, StoreHit, VectorStore};

#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorStore;
