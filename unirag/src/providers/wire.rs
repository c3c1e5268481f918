//! Wire format of OpenAI-compatible `/chat/completions` and `/embeddings`.

use serde::{Deserialize, Serialize};
use tracing::error;

use super::http::{Gateway, post_json};
use crate::error::Result;
use crate::generation::{ChatMessage, RoleVocabulary};

#[derive(Debug, Serialize)]
pub(crate) struct WireMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

pub(crate) fn to_wire(history: &[ChatMessage], roles: RoleVocabulary) -> Vec<WireMessage<'_>> {
    history
        .iter()
        .map(|m| WireMessage { role: roles.literal(m.role), content: &m.content })
        .collect()
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<WireMessage<'a>>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl ChatCompletionResponse {
    /// `choices[0].message.content`, if present.
    pub fn into_content(self) -> Option<String> {
        self.choices.into_iter().next()?.message?.content
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct EmbeddingRequest<'a> {
    pub model: &'a str,
    pub input: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Option<Vec<f32>>,
}

impl EmbeddingResponse {
    /// `data[0].embedding`, if present.
    pub fn into_embedding(self) -> Option<Vec<f32>> {
        self.data.into_iter().next()?.embedding
    }
}

/// Call `{url}` with an OpenAI-style chat completion request.
pub(crate) async fn chat_completion(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    provider: &str,
    request: &ChatCompletionRequest<'_>,
) -> Result<String> {
    let response: ChatCompletionResponse =
        post_json(client, url, api_key, request, provider, Gateway::Generation).await?;

    response.into_content().ok_or_else(|| {
        error!(provider, "response has no choices[0].message.content");
        Gateway::Generation.error(provider, "response has no message content")
    })
}

/// Call `{url}` with an OpenAI-style embedding request.
pub(crate) async fn embedding(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    provider: &str,
    request: &EmbeddingRequest<'_>,
) -> Result<Vec<f32>> {
    let response: EmbeddingResponse =
        post_json(client, url, api_key, request, provider, Gateway::Embedding).await?;

    response.into_embedding().ok_or_else(|| {
        error!(provider, "response has no data[0].embedding");
        Gateway::Embedding.error(provider, "response has no embedding")
    })
}
