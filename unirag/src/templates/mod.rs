//! Prompt templates.
//!
//! Templates are addressed by `(namespace, key)` and rendered with `$name` or
//! `${name}` placeholders. A [`TemplateParser`] looks a template up in its
//! primary language first and falls back to the default language.
//!
//! ```rust,ignore
//! use std::collections::HashMap;
//! use unirag::templates::{TemplateParser, TemplateRenderer};
//!
//! let parser = TemplateParser::new("en", "en");
//! let vars = HashMap::from([("query", "What changed?".to_string())]);
//! let footer = parser.render("rag", "footer_prompt", &vars)?;
//! ```

mod en;

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::warn;

use crate::error::{RagError, Result};

/// Language used when none is configured.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Namespace of the retrieval-augmented answering prompts.
pub const RAG_NAMESPACE: &str = "rag";

/// Substitution variables, keyed by placeholder name.
pub type TemplateVars<'a> = HashMap<&'a str, String>;

/// Renders named templates. Rendering is pure: equal inputs give equal output.
pub trait TemplateRenderer: Send + Sync {
    /// Render template `key` from `namespace` with `vars` substituted.
    fn render(&self, namespace: &str, key: &str, vars: &TemplateVars<'_>) -> Result<String>;
}

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:(\$)|\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
        .expect("placeholder regex")
});

/// Substitute `$name` and `${name}` in `template`.
///
/// Unknown placeholders are left untouched and `$$` renders as a literal `$`.
pub fn substitute(template: &str, vars: &TemplateVars<'_>) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures<'_>| {
            if caps.get(1).is_some() {
                return "$".to_string();
            }
            let name = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            vars.get(name).cloned().unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

type Catalog = HashMap<(String, String), String>;

/// Built-in templates per language, with caller overrides on top.
#[derive(Debug, Clone)]
pub struct TemplateParser {
    primary_language: String,
    default_language: String,
    locales: HashMap<String, Catalog>,
}

impl TemplateParser {
    /// Create a parser preferring `primary_language`, falling back to `default_language`.
    pub fn new(primary_language: impl Into<String>, default_language: impl Into<String>) -> Self {
        let mut locales = HashMap::new();
        locales.insert(en::LANGUAGE.to_string(), catalog(en::TEMPLATES));
        Self {
            primary_language: primary_language.into(),
            default_language: default_language.into(),
            locales,
        }
    }

    /// The language looked up first.
    pub fn primary_language(&self) -> &str {
        &self.primary_language
    }

    /// Switch the primary language.
    pub fn set_language(&mut self, language: impl Into<String>) {
        self.primary_language = language.into();
    }

    /// Register or replace a template for `language`.
    pub fn with_template(
        mut self,
        language: &str,
        namespace: &str,
        key: &str,
        template: impl Into<String>,
    ) -> Self {
        self.locales
            .entry(language.to_string())
            .or_default()
            .insert((namespace.to_string(), key.to_string()), template.into());
        self
    }

    fn lookup(&self, namespace: &str, key: &str) -> Option<&str> {
        let id = (namespace.to_string(), key.to_string());
        let find = |language: &str| self.locales.get(language).and_then(|c| c.get(&id));

        if let Some(template) = find(&self.primary_language) {
            return Some(template.as_str());
        }
        let fallback = find(&self.default_language);
        if fallback.is_some() {
            warn!(
                language = %self.primary_language,
                fallback = %self.default_language,
                namespace,
                key,
                "template missing in primary language"
            );
        }
        fallback.map(String::as_str)
    }
}

impl Default for TemplateParser {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGE, DEFAULT_LANGUAGE)
    }
}

impl TemplateRenderer for TemplateParser {
    fn render(&self, namespace: &str, key: &str, vars: &TemplateVars<'_>) -> Result<String> {
        let template = self.lookup(namespace, key).ok_or_else(|| {
            RagError::TemplateError(format!(
                "template '{namespace}.{key}' not found for language '{}' or '{}'",
                self.primary_language, self.default_language
            ))
        })?;
        Ok(substitute(template, vars))
    }
}

fn catalog(entries: &[(&str, &str, &str)]) -> Catalog {
    entries
        .iter()
        .map(|(namespace, key, text)| ((namespace.to_string(), key.to_string()), text.to_string()))
        .collect()
}
