//! Process-level settings read from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `GENERATION_BACKEND`, `EMBEDDING_BACKEND` | `OPENAI` (`OPENAI`, `DEEPSEEK`, `COHERE`) |
//! | `OPENAI_API_KEY`, `OPENAI_API_URL` | unset |
//! | `DEEPSEEK_API_KEY`, `DEEPSEEK_API_URL` | unset |
//! | `COHERE_API_KEY` | unset |
//! | `GENERATION_MODEL_ID`, `EMBEDDING_MODEL_ID`, `EMBEDDING_MODEL_SIZE` | unset |
//! | `INPUT_DEFAULT_MAX_CHARACTERS` | `1000` |
//! | `GENERATION_DEFAULT_MAX_TOKENS` | `1000` |
//! | `GENERATION_DEFAULT_TEMPERATURE` | `0.1` |
//! | `VECTOR_DB_BACKEND` | `MEMORY` (`MEMORY`, `QDRANT`) |
//! | `VECTOR_DB_PATH`, `VECTOR_DB_URL` | unset |
//! | `VECTOR_DB_DISTANCE_METHOD` | `cosine` (`cosine`, `dot`) |
//! | `PRIMARY_LANG`, `DEFAULT_LANG` | `en` |
//! | `RAG_BACKGROUND_CONTEXT` | empty |
//!
//! Empty values count as unset.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::RagConfig;
use crate::error::{RagError, Result};
use crate::providers::ProviderDefaults;
use crate::templates::{DEFAULT_LANGUAGE, TemplateParser};
use crate::vectorstore::DistanceMetric;

/// Embedding / generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderBackend {
    /// OpenAI or an OpenAI-compatible server.
    #[default]
    OpenAi,
    /// DeepSeek.
    DeepSeek,
    /// Cohere.
    Cohere,
}

impl FromStr for ProviderBackend {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OPENAI" => Ok(Self::OpenAi),
            "DEEPSEEK" => Ok(Self::DeepSeek),
            "COHERE" => Ok(Self::Cohere),
            other => Err(RagError::ConfigError(format!("unknown LLM backend '{other}'"))),
        }
    }
}

impl fmt::Display for ProviderBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OpenAi => "OPENAI",
            Self::DeepSeek => "DEEPSEEK",
            Self::Cohere => "COHERE",
        })
    }
}

/// Vector store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreBackend {
    /// [`InMemoryVectorStore`](crate::InMemoryVectorStore), optionally snapshotted to disk.
    #[default]
    Memory,
    /// Qdrant over gRPC.
    Qdrant,
}

impl FromStr for StoreBackend {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "MEMORY" => Ok(Self::Memory),
            "QDRANT" => Ok(Self::Qdrant),
            other => Err(RagError::ConfigError(format!("unknown vector db backend '{other}'"))),
        }
    }
}

/// Settings for building providers, the vector store and the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Backend answering generation calls (`GENERATION_BACKEND`).
    pub generation_backend: ProviderBackend,
    /// Backend answering embedding calls (`EMBEDDING_BACKEND`).
    pub embedding_backend: ProviderBackend,

    /// `OPENAI_API_KEY`.
    pub openai_api_key: Option<String>,
    /// Base URL for models served by an OpenAI-compatible server (`OPENAI_API_URL`).
    pub openai_api_url: Option<String>,
    /// `DEEPSEEK_API_KEY`.
    pub deepseek_api_key: Option<String>,
    /// Overrides the DeepSeek base URL (`DEEPSEEK_API_URL`).
    pub deepseek_api_url: Option<String>,
    /// `COHERE_API_KEY`.
    pub cohere_api_key: Option<String>,

    /// Generation model id. Without it generation yields no answer.
    pub generation_model_id: Option<String>,
    /// Embedding model id, used together with `embedding_model_size`.
    pub embedding_model_id: Option<String>,
    /// Output dimensionality of the embedding model.
    pub embedding_model_size: Option<usize>,
    /// Character budget and generation defaults shared by the providers.
    pub provider_defaults: ProviderDefaults,

    /// Vector store backend (`VECTOR_DB_BACKEND`).
    pub vector_db_backend: StoreBackend,
    /// Snapshot directory of the embedded store. Unset keeps it memory-only.
    pub vector_db_path: Option<PathBuf>,
    /// Qdrant gRPC URL.
    pub vector_db_url: Option<String>,
    /// Distance metric for new collections and score conversion.
    pub vector_db_distance: DistanceMetric,

    /// Language templates are looked up in first.
    pub primary_lang: String,
    /// Language used when a template is missing in `primary_lang`.
    pub default_lang: String,
    /// Fills `$context` in the system prompt.
    pub background_context: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            generation_backend: ProviderBackend::default(),
            embedding_backend: ProviderBackend::default(),
            openai_api_key: None,
            openai_api_url: None,
            deepseek_api_key: None,
            deepseek_api_url: None,
            cohere_api_key: None,
            generation_model_id: None,
            embedding_model_id: None,
            embedding_model_size: None,
            provider_defaults: ProviderDefaults::default(),
            vector_db_backend: StoreBackend::default(),
            vector_db_path: None,
            vector_db_url: None,
            vector_db_distance: DistanceMetric::default(),
            primary_lang: DEFAULT_LANGUAGE.to_string(),
            default_lang: DEFAULT_LANGUAGE.to_string(),
            background_context: String::new(),
        }
    }
}

fn parse<T, V>(var: V, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    var(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| {
                RagError::ConfigError(format!("invalid value '{raw}' for {name}: {e}"))
            })
        })
        .transpose()
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`, which returns a variable's value if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        let fallback = defaults.provider_defaults;
        let provider_defaults = ProviderDefaults {
            input_max_characters: parse(&var, "INPUT_DEFAULT_MAX_CHARACTERS")?
                .unwrap_or(fallback.input_max_characters),
            max_output_tokens: parse(&var, "GENERATION_DEFAULT_MAX_TOKENS")?
                .unwrap_or(fallback.max_output_tokens),
            temperature: parse(&var, "GENERATION_DEFAULT_TEMPERATURE")?
                .unwrap_or(fallback.temperature),
        };

        Ok(Self {
            generation_backend: parse(&var, "GENERATION_BACKEND")?
                .unwrap_or(defaults.generation_backend),
            embedding_backend: parse(&var, "EMBEDDING_BACKEND")?
                .unwrap_or(defaults.embedding_backend),
            openai_api_key: var("OPENAI_API_KEY"),
            openai_api_url: var("OPENAI_API_URL"),
            deepseek_api_key: var("DEEPSEEK_API_KEY"),
            deepseek_api_url: var("DEEPSEEK_API_URL"),
            cohere_api_key: var("COHERE_API_KEY"),
            generation_model_id: var("GENERATION_MODEL_ID"),
            embedding_model_id: var("EMBEDDING_MODEL_ID"),
            embedding_model_size: parse(&var, "EMBEDDING_MODEL_SIZE")?,
            provider_defaults,
            vector_db_backend: parse(&var, "VECTOR_DB_BACKEND")?
                .unwrap_or(defaults.vector_db_backend),
            vector_db_path: var("VECTOR_DB_PATH").map(PathBuf::from),
            vector_db_url: var("VECTOR_DB_URL"),
            vector_db_distance: parse(&var, "VECTOR_DB_DISTANCE_METHOD")?
                .unwrap_or(defaults.vector_db_distance),
            primary_lang: var("PRIMARY_LANG").unwrap_or(defaults.primary_lang),
            default_lang: var("DEFAULT_LANG").unwrap_or(defaults.default_lang),
            background_context: var("RAG_BACKGROUND_CONTEXT").unwrap_or_default(),
        })
    }

    /// Orchestrator config carrying the background context.
    pub fn rag_config(&self) -> Result<RagConfig> {
        RagConfig::builder().background_context(self.background_context.clone()).build()
    }

    /// Template parser for the configured languages.
    pub fn template_parser(&self) -> TemplateParser {
        TemplateParser::new(self.primary_lang.clone(), self.default_lang.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(settings(&[]).unwrap(), Settings::default());
    }

    #[test]
    fn reads_backends_models_and_store() {
        let s = settings(&[
            ("GENERATION_BACKEND", "cohere"),
            ("EMBEDDING_BACKEND", "DEEPSEEK"),
            ("EMBEDDING_MODEL_ID", "text-embedding-3-small"),
            ("EMBEDDING_MODEL_SIZE", "1536"),
            ("GENERATION_DEFAULT_TEMPERATURE", "0"),
            ("VECTOR_DB_BACKEND", "QDRANT"),
            ("VECTOR_DB_DISTANCE_METHOD", "dot"),
            ("PRIMARY_LANG", "ar"),
            ("OPENAI_API_URL", ""),
        ])
        .unwrap();

        assert_eq!(s.generation_backend, ProviderBackend::Cohere);
        assert_eq!(s.embedding_backend, ProviderBackend::DeepSeek);
        assert_eq!(s.embedding_model_size, Some(1536));
        assert_eq!(s.provider_defaults.temperature, 0.0);
        assert_eq!(s.vector_db_backend, StoreBackend::Qdrant);
        assert_eq!(s.vector_db_distance, DistanceMetric::Dot);
        assert_eq!(s.template_parser().primary_language(), "ar");
        assert_eq!(s.openai_api_url, None);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for (name, value) in [
            ("EMBEDDING_MODEL_SIZE", "big"),
            ("GENERATION_BACKEND", "GEMINI"),
            ("VECTOR_DB_DISTANCE_METHOD", "euclid"),
        ] {
            let result = settings(&[(name, value)]);
            assert!(matches!(result, Err(RagError::ConfigError(_))), "{name}={value}");
        }
    }

    #[test]
    fn background_context_flows_into_config() {
        let s = settings(&[("RAG_BACKGROUND_CONTEXT", "Tweets about a visit.")]).unwrap();
        assert_eq!(s.rag_config().unwrap().background_context, "Tweets about a visit.");
    }
}
