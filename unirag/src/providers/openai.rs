//! OpenAI and OpenAI-compatible (Ollama, vLLM, ...) provider.
//!
//! Models whose id starts with `gpt` go to the official OpenAI endpoint.
//! Everything else goes to the configured compatible base URL, which is how
//! a local Ollama server is reached.

use async_trait::async_trait;
use tracing::{debug, error};

use super::wire::{self, ChatCompletionRequest, EmbeddingRequest};
use super::{ModelSlots, ProviderDefaults, endpoint};
use crate::embedding::{EmbedPurpose, EmbeddingProvider, check_vector};
use crate::error::{RagError, Result};
use crate::generation::{
    ChatMessage, GenerationOptions, GenerationProvider, Role, RoleVocabulary, truncate_and_trim,
};

/// The official OpenAI API base URL.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1/";

const PROVIDER: &str = "OpenAI";

/// An embedding and generation provider for OpenAI-compatible APIs.
///
/// # Example
///
/// ```rust,ignore
/// use unirag::providers::OpenAiProvider;
///
/// let mut provider =
///     OpenAiProvider::new("sk-...").with_compatible_url("http://localhost:11434/v1/");
/// provider.set_generation_model("llama3.1");
/// provider.set_embedding_model("nomic-embed-text", 768);
/// ```
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    official_url: String,
    compatible_url: Option<String>,
    defaults: ProviderDefaults,
    models: ModelSlots,
}

impl OpenAiProvider {
    /// Create a provider with the given API key and default settings.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            official_url: OPENAI_API_BASE.to_string(),
            compatible_url: None,
            defaults: ProviderDefaults::default(),
            models: ModelSlots::default(),
        }
    }

    /// Create a provider using the `OPENAI_API_KEY` and optional `OPENAI_API_URL` variables.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            RagError::ConfigError("OPENAI_API_KEY environment variable not set".into())
        })?;
        let provider = Self::new(api_key);
        Ok(match std::env::var("OPENAI_API_URL") {
            Ok(url) => provider.with_compatible_url(url),
            Err(_) => provider,
        })
    }

    /// Set the base URL used for non-OpenAI models. Empty strings are ignored.
    pub fn with_compatible_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.compatible_url = if url.is_empty() { None } else { Some(url) };
        self
    }

    /// Override the official endpoint.
    pub fn with_official_url(mut self, url: impl Into<String>) -> Self {
        self.official_url = url.into();
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

    /// Base URL for a generation model.
    fn generation_base(&self, model_id: &str) -> Option<&str> {
        if model_id.starts_with("gpt") {
            Some(&self.official_url)
        } else {
            self.compatible_url.as_deref()
        }
    }

    /// Base URL for an embedding model.
    fn embedding_base(&self, model_id: &str) -> Option<&str> {
        if model_id.starts_with("gpt") || model_id.to_lowercase().contains("ada") {
            Some(&self.official_url)
        } else {
            self.compatible_url.as_deref()
        }
    }
}

#[async_trait]
impl GenerationProvider for OpenAiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn roles(&self) -> RoleVocabulary {
        RoleVocabulary::OPENAI
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

        let Some(base) = self.generation_base(model) else {
            error!(provider = PROVIDER, model, "no compatible base URL configured");
            return Err(RagError::GenerationError {
                provider: PROVIDER.into(),
                message: format!("no base URL configured for model '{model}'"),
            });
        };

        let request = ChatCompletionRequest {
            model,
            messages: wire::to_wire(chat_history, self.roles()),
            max_tokens: options.max_output_tokens.unwrap_or(self.defaults.max_output_tokens),
            temperature: options.temperature.unwrap_or(self.defaults.temperature),
        };

        debug!(provider = PROVIDER, model, messages = request.messages.len(), "generating text");
        wire::chat_completion(
            &self.client,
            &endpoint(base, "chat/completions"),
            &self.api_key,
            PROVIDER,
            &request,
        )
        .await
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn embed(&self, text: &str, _purpose: EmbedPurpose) -> Result<Vec<f32>> {
        let (Some(model), Some(size)) =
            (self.models.embedding_model_id.as_deref(), self.models.embedding_size)
        else {
            error!(provider = PROVIDER, "embedding model was not set");
            return Err(RagError::EmbeddingError {
                provider: PROVIDER.into(),
                message: "embedding model was not set".into(),
            });
        };

        let Some(base) = self.embedding_base(model) else {
            error!(provider = PROVIDER, model, "no compatible base URL configured");
            return Err(RagError::EmbeddingError {
                provider: PROVIDER.into(),
                message: format!("no base URL configured for model '{model}'"),
            });
        };

        let input = truncate_and_trim(text, self.defaults.input_max_characters);
        debug!(provider = PROVIDER, model, text_len = input.len(), "embedding text");

        let request = EmbeddingRequest { model, input };
        let url = endpoint(base, "embeddings");
        let vector = wire::embedding(&self.client, &url, &self.api_key, PROVIDER, &request).await?;
        check_vector(PROVIDER, vector, size)
    }

    fn embedding_size(&self) -> Option<usize> {
        self.models.embedding_size
    }
}
