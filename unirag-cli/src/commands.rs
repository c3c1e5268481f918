//! Command-line definitions and handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing::info;
use unirag::{
    QueryRequest, RagError, RagOrchestrator, SearchEngine, Settings, TermOverlapReranker,
    UNBOUNDED_LIMIT, VectorStore, factory,
};

use crate::passages::load_passages;

/// Retrieval-augmented answering over project collections.
#[derive(Parser, Debug)]
#[command(name = "unirag", version, about, long_about = None)]
pub struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Environment file to load before reading settings
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Embed and store passages from a JSON-lines file
    Index {
        /// Project identifier
        #[arg(short, long)]
        project: String,
        /// Passage file, one `{id, text, metadata}` object per line
        #[arg(short, long)]
        file: PathBuf,
        /// Drop the existing collection first
        #[arg(long)]
        reset: bool,
    },
    /// Retrieve passages without generating an answer
    Search {
        #[arg(short, long)]
        project: String,
        /// Query text
        #[arg(short, long)]
        text: String,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
        /// Minimum similarity in [0, 1]
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Answer a question from the project's passages
    Answer {
        #[arg(short, long)]
        project: String,
        #[arg(short, long)]
        text: String,
        /// Maximum number of passages in the prompt
        #[arg(short, long, conflicts_with = "all")]
        limit: Option<usize>,
        /// Use every retrievable passage
        #[arg(long)]
        all: bool,
        #[arg(long)]
        threshold: Option<f32>,
        /// Rerank passages by query term overlap
        #[arg(long)]
        rerank: bool,
        /// Refine the query with the first answer and answer again
        #[arg(long)]
        second_pass: bool,
    },
    /// Describe the project's collection
    Info {
        #[arg(short, long)]
        project: String,
    },
    /// Drop the project's collection
    Reset {
        #[arg(short, long)]
        project: String,
    },
}

impl Command {
    /// `true` for commands served by the store alone.
    pub fn is_store_only(&self) -> bool {
        matches!(self, Self::Info { .. } | Self::Reset { .. })
    }

    fn query_request(
        text: &str,
        limit: Option<usize>,
        all: bool,
        threshold: Option<f32>,
        rerank: bool,
        second_pass: bool,
    ) -> QueryRequest {
        let request = QueryRequest::new(text).with_rerank(rerank).with_second_pass(second_pass);
        let request = match (all, limit) {
            (true, _) => request.with_limit(UNBOUNDED_LIMIT),
            (false, Some(limit)) => request.with_limit(limit),
            (false, None) => request,
        };
        match threshold {
            Some(threshold) => request.with_threshold(threshold),
            None => request,
        }
    }
}

/// Build an orchestrator from settings over an already constructed store.
pub fn build_orchestrator(
    settings: &Settings,
    store: Arc<dyn VectorStore>,
) -> Result<RagOrchestrator> {
    Ok(RagOrchestrator::builder()
        .config(settings.rag_config()?)
        .embedding_provider(factory::embedding_provider(settings)?)
        .generation_provider(factory::generation_provider(settings)?)
        .vector_store(store)
        .templates(Arc::new(settings.template_parser()))
        .reranker(Arc::new(TermOverlapReranker::default()))
        .build()?)
}

/// Run a command that only touches the store (`info`, `reset`).
pub async fn manage(search: &SearchEngine, command: Command) -> Result<Value> {
    match command {
        Command::Info { project } => {
            let collection = RagOrchestrator::collection_name(&project);
            if !search.collection_exists(&collection).await? {
                return Err(RagError::CollectionNotFound(collection).into());
            }
            Ok(serde_json::to_value(search.collection_info(&collection).await?)?)
        }
        Command::Reset { project } => {
            let collection = RagOrchestrator::collection_name(&project);
            let deleted = search.delete_collection(&collection).await?;
            info!(collection = %collection, deleted, "reset finished");
            Ok(json!({ "collection": collection, "deleted": deleted }))
        }
        other => bail!("{other:?} needs model providers"),
    }
}

/// Run one command and return its JSON output.
pub async fn execute(orchestrator: &RagOrchestrator, command: Command) -> Result<Value> {
    match command {
        Command::Index { project, file, reset } => {
            let passages = load_passages(&file).await?;
            let written = orchestrator.index_into_collection(&project, &passages, reset).await?;
            info!(project = %project, written, "index finished");
            Ok(json!({
                "collection": RagOrchestrator::collection_name(&project),
                "inserted": written,
            }))
        }
        Command::Search { project, text, limit, threshold } => {
            let documents =
                orchestrator.search_collection(&project, &text, limit, threshold).await?;
            Ok(json!({ "results": documents }))
        }
        Command::Answer { project, text, limit, all, threshold, rerank, second_pass } => {
            let request = Command::query_request(&text, limit, all, threshold, rerank, second_pass);
            let answer = orchestrator.answer_with_refinement(&project, &request).await?;
            Ok(json!({
                "pass": answer.pass,
                "answer": answer.result.answer,
                "used_documents": answer.result.used_documents,
            }))
        }
        command => manage(orchestrator.search_engine(), command).await,
    }
}

/// Connect the configured store, run the command and disconnect.
///
/// `info` and `reset` never build model providers, so they work without API keys.
pub async fn run_with(settings: &Settings, command: Command) -> Result<Value> {
    let store = factory::vector_store(settings)?;
    store.connect().await?;

    let output = if command.is_store_only() {
        manage(&SearchEngine::new(store.clone()), command).await
    } else {
        match build_orchestrator(settings, store.clone()) {
            Ok(orchestrator) => execute(&orchestrator, command).await,
            Err(e) => Err(e),
        }
    };

    // Persists the snapshot of an on-disk memory store.
    store.disconnect().await?;
    output
}

/// Load settings from the environment and run the command.
pub async fn run(command: Command) -> Result<Value> {
    run_with(&Settings::from_env()?, command).await
}
