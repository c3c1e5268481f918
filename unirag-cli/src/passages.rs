//! JSON-lines passage files.
//!
//! One passage per line: `{"id": 0, "text": "...", "metadata": {...}}`.
//! `metadata` may be omitted; blank lines are skipped.

use std::path::Path;

use anyhow::{Context, Result, bail};
use unirag::Passage;

/// Parse passages from JSON-lines text.
pub fn parse_passages(contents: &str) -> Result<Vec<Passage>> {
    let mut passages = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let passage: Passage = serde_json::from_str(line)
            .with_context(|| format!("line {}: invalid passage", idx + 1))?;
        if passage.text.trim().is_empty() {
            bail!("line {}: passage {} has empty text", idx + 1, passage.id);
        }
        passages.push(passage);
    }
    Ok(passages)
}

/// Read and parse a JSON-lines passage file.
pub async fn load_passages(path: &Path) -> Result<Vec<Passage>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_passages(&contents).with_context(|| format!("in {}", path.display()))
}
