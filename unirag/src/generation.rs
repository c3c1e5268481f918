//! Generation provider trait, chat messages and role vocabularies.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Abstract chat role. Providers map it to their own wire literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Instructions that frame the conversation.
    System,
    /// A message from the user.
    User,
    /// A message from the model.
    Assistant,
}

/// A provider-owned mapping from [`Role`] to the literal its API expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleVocabulary {
    /// Literal for [`Role::System`].
    pub system: &'static str,
    /// Literal for [`Role::User`].
    pub user: &'static str,
    /// Literal for [`Role::Assistant`].
    pub assistant: &'static str,
}

impl RoleVocabulary {
    /// Lowercase roles used by OpenAI-compatible APIs.
    pub const OPENAI: Self = Self { system: "system", user: "user", assistant: "assistant" };

    /// Roles used by the DeepSeek chat API.
    pub const DEEPSEEK: Self = Self::OPENAI;

    /// Roles used by the Cohere chat API.
    pub const COHERE: Self = Self { system: "SYSTEM", user: "USER", assistant: "CHATBOT" };

    /// The wire literal for `role`.
    pub fn literal(&self, role: Role) -> &'static str {
        match role {
            Role::System => self.system,
            Role::User => self.user,
            Role::Assistant => self.assistant,
        }
    }

    /// The abstract role for a wire literal, if it belongs to this vocabulary.
    pub fn role_for(&self, literal: &str) -> Option<Role> {
        [Role::System, Role::User, Role::Assistant]
            .into_iter()
            .find(|role| self.literal(*role) == literal)
    }
}

/// One turn of a chat history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Who produced the message.
    pub role: Role,
    /// The message text.
    pub content: String,
}

impl ChatMessage {
    /// Create a message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// Per-call generation overrides. Unset values use the provider defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationOptions {
    /// Upper bound on generated tokens.
    pub max_output_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

/// A provider that turns a chat history into a generated answer.
///
/// An `Err` from [`generate`](GenerationProvider::generate) is the "no result"
/// signal: unconfigured model, transport failure, or a response without the
/// expected message field.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Short provider name used in logs and errors.
    fn name(&self) -> &str;

    /// The provider's role vocabulary.
    fn roles(&self) -> RoleVocabulary;

    /// Character budget for text placed into prompts.
    fn input_max_characters(&self) -> usize;

    /// Truncate `text` to the provider's character budget and trim it.
    fn process_text(&self, text: &str) -> String {
        truncate_and_trim(text, self.input_max_characters()).to_string()
    }

    /// Build a chat message for `role`.
    fn construct_prompt(&self, prompt: &str, role: Role) -> ChatMessage {
        ChatMessage::new(role, prompt)
    }

    /// Generate an answer for `prompt`.
    ///
    /// Appends a [`Role::User`] message built from `prompt` to `chat_history`
    /// before dispatch, so the caller's history is modified.
    async fn generate(
        &self,
        prompt: &str,
        chat_history: &mut Vec<ChatMessage>,
        options: GenerationOptions,
    ) -> Result<String>;
}

/// Keep the first `max_chars` characters of `text`, then strip surrounding whitespace.
pub fn truncate_and_trim(text: &str, max_chars: usize) -> &str {
    let end = text.char_indices().nth(max_chars).map_or(text.len(), |(idx, _)| idx);
    text[..end].trim()
}
