//! Assemble retrieved documents and a query into a generation prompt.

use std::sync::Arc;

use crate::document::RetrievedDocument;
use crate::error::Result;
use crate::generation::{ChatMessage, GenerationProvider, Role};
use crate::templates::{RAG_NAMESPACE, TemplateRenderer, TemplateVars};

/// A prompt body plus the system message it is sent with.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    /// System-role message, independent of the retrieved documents.
    pub system: ChatMessage,
    /// Document blocks followed by the footer block.
    pub body: String,
}

/// Renders the `rag` templates into prompts.
#[derive(Clone)]
pub struct PromptAssembler {
    templates: Arc<dyn TemplateRenderer>,
    background_context: String,
}

impl PromptAssembler {
    /// Create an assembler. `background_context` fills `$context` in the system prompt.
    pub fn new(
        templates: Arc<dyn TemplateRenderer>,
        background_context: impl Into<String>,
    ) -> Self {
        Self { templates, background_context: background_context.into() }
    }

    /// Build the system message with the provider's role vocabulary.
    pub fn system_message(&self, generation: &dyn GenerationProvider) -> Result<ChatMessage> {
        let vars = TemplateVars::from([("context", self.background_context.clone())]);
        let system_prompt = self.templates.render(RAG_NAMESPACE, "system_prompt", &vars)?;
        Ok(generation.construct_prompt(&system_prompt, Role::System))
    }

    /// Render one block per document, in the given order, then the footer.
    ///
    /// Blocks carry the 1-based rank, the score to three decimals and the
    /// document text passed through [`GenerationProvider::process_text`].
    /// Blocks are joined with a newline, the footer is separated by a blank line.
    pub fn assemble(
        &self,
        generation: &dyn GenerationProvider,
        documents: &[RetrievedDocument],
        query: &str,
    ) -> Result<AssembledPrompt> {
        let blocks = documents
            .iter()
            .enumerate()
            .map(|(idx, doc)| {
                let vars = TemplateVars::from([
                    ("doc_num", (idx + 1).to_string()),
                    ("score", format!("{:.3}", doc.score)),
                    ("chunk_text", generation.process_text(&doc.text)),
                ]);
                self.templates.render(RAG_NAMESPACE, "document_prompt", &vars)
            })
            .collect::<Result<Vec<String>>>()?;

        let footer = self.templates.render(
            RAG_NAMESPACE,
            "footer_prompt",
            &TemplateVars::from([("query", query.to_string())]),
        )?;

        Ok(AssembledPrompt {
            system: self.system_message(generation)?,
            body: format!("{}\n\n{footer}", blocks.join("\n")),
        })
    }
}
