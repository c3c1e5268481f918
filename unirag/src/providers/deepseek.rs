//! DeepSeek provider over its OpenAI-style REST API.

use async_trait::async_trait;
use tracing::{debug, error};

use super::wire::{self, ChatCompletionRequest, EmbeddingRequest};
use super::{ModelSlots, ProviderDefaults, endpoint};
use crate::embedding::{EmbedPurpose, EmbeddingProvider, check_vector};
use crate::error::{RagError, Result};
use crate::generation::{
    ChatMessage, GenerationOptions, GenerationProvider, Role, RoleVocabulary, truncate_and_trim,
};

/// Default DeepSeek API base URL.
pub const DEEPSEEK_API_BASE: &str = "https://api.deepseek.com/v1";

const PROVIDER: &str = "DeepSeek";

/// An embedding and generation provider for the DeepSeek API.
pub struct DeepSeekProvider {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    defaults: ProviderDefaults,
    models: ModelSlots,
}

impl DeepSeekProvider {
    /// Create a provider against [`DEEPSEEK_API_BASE`].
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            api_url: DEEPSEEK_API_BASE.to_string(),
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
impl GenerationProvider for DeepSeekProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn roles(&self) -> RoleVocabulary {
        RoleVocabulary::DEEPSEEK
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

        let request = ChatCompletionRequest {
            model,
            messages: wire::to_wire(chat_history, self.roles()),
            max_tokens: options.max_output_tokens.unwrap_or(self.defaults.max_output_tokens),
            temperature: options.temperature.unwrap_or(self.defaults.temperature),
        };

        debug!(provider = PROVIDER, model, "generating text");
        wire::chat_completion(
            &self.client,
            &endpoint(&self.api_url, "chat/completions"),
            &self.api_key,
            PROVIDER,
            &request,
        )
        .await
    }
}

#[async_trait]
impl EmbeddingProvider for DeepSeekProvider {
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

        let input = truncate_and_trim(text, self.defaults.input_max_characters);
        let request = EmbeddingRequest { model, input };
        let url = endpoint(&self.api_url, "embeddings");
        let vector = wire::embedding(&self.client, &url, &self.api_key, PROVIDER, &request).await?;
        check_vector(PROVIDER, vector, size)
    }

    fn embedding_size(&self) -> Option<usize> {
        self.models.embedding_size
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::providers::testing::FakeBackend;

    #[tokio::test]
    async fn generates_against_configured_url() {
        let backend = FakeBackend::spawn(
            json!({"choices": [{"message": {"role": "assistant", "content": "deep answer"}}]}),
            json!({"data": [{"embedding": [0.5, 0.5]}]}),
        )
        .await;
        let mut provider = DeepSeekProvider::new("ds-key").with_api_url(backend.url());
        provider.set_generation_model("deepseek-chat");
        provider.set_embedding_model("deepseek-embed", 2);

        let mut history = Vec::new();
        let answer =
            provider.generate("hi", &mut history, GenerationOptions::default()).await.unwrap();
        assert_eq!(answer, "deep answer");
        assert_eq!(history, vec![ChatMessage::new(Role::User, "hi")]);
        assert_eq!(backend.last_request("/chat/completions").unwrap()["model"], "deepseek-chat");

        let vector = provider.embed("hi", EmbedPurpose::Query).await.unwrap();
        assert_eq!(vector, vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn non_success_status_is_no_result() {
        let backend = FakeBackend::failing().await;
        let mut provider = DeepSeekProvider::new("ds-key").with_api_url(backend.url());
        provider.set_generation_model("deepseek-chat");
        provider.set_embedding_model("deepseek-embed", 2);

        let options = GenerationOptions::default();
        assert!(provider.generate("hi", &mut Vec::new(), options).await.is_err());
        assert!(provider.embed("hi", EmbedPurpose::Document).await.is_err());
    }

    #[tokio::test]
    async fn unconfigured_embedding_model_is_no_result() {
        let provider = DeepSeekProvider::new("ds-key");
        assert_eq!(provider.embedding_size(), None);
        assert!(matches!(
            provider.embed("hi", EmbedPurpose::Query).await,
            Err(RagError::EmbeddingError { .. })
        ));
    }
}
