//! HTTP-backed embedding and generation providers.
//!
//! Each provider implements both [`EmbeddingProvider`](crate::EmbeddingProvider)
//! and [`GenerationProvider`](crate::GenerationProvider). Models are configured
//! after construction with `set_generation_model` / `set_embedding_model`; a
//! call against an unconfigured model is a "no result", not a panic.

pub mod cohere;
pub mod deepseek;
mod http;
pub mod openai;
mod wire;

#[cfg(test)]
pub(crate) mod testing;

use serde::{Deserialize, Serialize};

pub use cohere::CohereProvider;
pub use deepseek::DeepSeekProvider;
pub use openai::OpenAiProvider;

/// Defaults shared by every provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProviderDefaults {
    /// Character budget for texts sent to the backend or placed into prompts.
    pub input_max_characters: usize,
    /// Generated token budget when a call does not set one.
    pub max_output_tokens: u32,
    /// Sampling temperature when a call does not set one.
    pub temperature: f32,
}

impl Default for ProviderDefaults {
    fn default() -> Self {
        Self { input_max_characters: 1000, max_output_tokens: 1000, temperature: 0.1 }
    }
}

/// The model slots a provider can be configured with.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ModelSlots {
    pub generation_model_id: Option<String>,
    pub embedding_model_id: Option<String>,
    pub embedding_size: Option<usize>,
}

impl ModelSlots {
    pub fn set_generation_model(&mut self, model_id: impl Into<String>) {
        self.generation_model_id = Some(model_id.into());
    }

    pub fn set_embedding_model(&mut self, model_id: impl Into<String>, embedding_size: usize) {
        self.embedding_model_id = Some(model_id.into());
        self.embedding_size = Some(embedding_size);
    }
}

/// Join a base URL and an endpoint path with exactly one slash.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
