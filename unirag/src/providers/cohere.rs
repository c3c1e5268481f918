//! Cohere provider.
//!
//! Cohere names the assistant role `CHATBOT` and encodes stored passages and
//! search queries asymmetrically (`search_document` / `search_query`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::http::{Gateway, post_json};
use super::{ModelSlots, ProviderDefaults, endpoint};
use crate::embedding::{EmbedPurpose, EmbeddingProvider, check_vector};
use crate::error::{RagError, Result};
use crate::generation::{
    ChatMessage, GenerationOptions, GenerationProvider, Role, RoleVocabulary, truncate_and_trim,
};

/// Default Cohere API base URL.
pub const COHERE_API_BASE: &str = "https://api.cohere.ai/v1";

const PROVIDER: &str = "Cohere";

/// Cohere `input_type` for an embedding purpose.
fn input_type(purpose: EmbedPurpose) -> &'static str {
    match purpose {
        EmbedPurpose::Document => "search_document",
        EmbedPurpose::Query => "search_query",
    }
}

#[derive(Debug, Serialize)]
struct CohereTurn<'a> {
    role: &'static str,
    message: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    message: &'a str,
    chat_history: Vec<CohereTurn<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: [&'a str; 1],
    input_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

/// An embedding and generation provider for the Cohere API.
pub struct CohereProvider {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    defaults: ProviderDefaults,
    models: ModelSlots,
}

impl CohereProvider {
    /// Create a provider against [`COHERE_API_BASE`].
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            api_url: COHERE_API_BASE.to_string(),
            defaults: ProviderDefaults::default(),
            models: ModelSlots::default(),
        }
    }

    /// Point the provider at another base URL.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Set provider-wide defaults.
    pub fn with_defaults(mut self, defaults: ProviderDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Select the generation model.
    pub fn set_generation_model(&mut self, model_id: impl Into<String>) {
        self.models.set_generation_model(model_id);
    }

    /// Select the embedding model and its output dimensionality.
    pub fn set_embedding_model(&mut self, model_id: impl Into<String>, embedding_size: usize) {
        self.models.set_embedding_model(model_id, embedding_size);
    }
}

#[async_trait]
impl GenerationProvider for CohereProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn roles(&self) -> RoleVocabulary {
        RoleVocabulary::COHERE
    }

    fn input_max_characters(&self) -> usize {
        self.defaults.input_max_characters
    }

    async fn generate(
        &self,
        prompt: &str,
        chat_history: &mut Vec<ChatMessage>,
        options: GenerationOptions,
    ) -> Result<String> {
        let Some(model) = self.models.generation_model_id.as_deref() else {
            error!(provider = PROVIDER, "generation model was not set");
            return Err(RagError::GenerationError {
                provider: PROVIDER.into(),
                message: "generation model was not set".into(),
            });
        };

        chat_history.push(self.construct_prompt(prompt, Role::User));

        // The newest user turn travels as `message`, earlier turns as history.
        let roles = self.roles();
        let (current, earlier) = match chat_history.split_last() {
            Some((last, rest)) => (last.content.as_str(), rest),
            None => (prompt, &[][..]),
        };
        let request = ChatRequest {
            model,
            message: current,
            chat_history: earlier
                .iter()
                .map(|m| CohereTurn { role: roles.literal(m.role), message: &m.content })
                .collect(),
            max_tokens: options.max_output_tokens.unwrap_or(self.defaults.max_output_tokens),
            temperature: options.temperature.unwrap_or(self.defaults.temperature),
        };

        debug!(provider = PROVIDER, model, "generating text");
        let response: ChatResponse = post_json(
            &self.client,
            &endpoint(&self.api_url, "chat"),
            &self.api_key,
            &request,
            PROVIDER,
            Gateway::Generation,
        )
        .await?;

        response.text.ok_or_else(|| {
            error!(provider = PROVIDER, "response has no text");
            Gateway::Generation.error(PROVIDER, "response has no text")
        })
    }
}

#[async_trait]
impl EmbeddingProvider for CohereProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn embed(&self, text: &str, purpose: EmbedPurpose) -> Result<Vec<f32>> {
        let (Some(model), Some(size)) =
            (self.models.embedding_model_id.as_deref(), self.models.embedding_size)
        else {
            error!(provider = PROVIDER, "embedding model was not set");
            return Err(RagError::EmbeddingError {
                provider: PROVIDER.into(),
                message: "embedding model was not set".into(),
            });
        };

        let request = EmbedRequest {
            model,
            texts: [truncate_and_trim(text, self.defaults.input_max_characters)],
            input_type: input_type(purpose),
        };
        let response: EmbedResponse = post_json(
            &self.client,
            &endpoint(&self.api_url, "embed"),
            &self.api_key,
            &request,
            PROVIDER,
            Gateway::Embedding,
        )
        .await?;

        let vector = response.embeddings.into_iter().next().ok_or_else(|| {
            error!(provider = PROVIDER, "response has no embeddings");
            Gateway::Embedding.error(PROVIDER, "response has no embeddings")
        })?;
        check_vector(PROVIDER, vector, size)
    }

    fn embedding_size(&self) -> Option<usize> {
        self.models.embedding_size
    }
}
