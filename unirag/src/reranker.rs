//! Rerankers reorder retrieved documents after vector search.
//!
//! A reranker may change scores and order. The orchestrator re-applies the
//! similarity threshold, descending order and limit to whatever comes back.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::document::RetrievedDocument;
use crate::error::Result;

/// Re-scores retrieved documents for a query.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Rerank `documents` for `query`. Scores must stay in `[0, 1]`.
    async fn rerank(
        &self,
        query: &str,
        documents: Vec<RetrievedDocument>,
    ) -> Result<Vec<RetrievedDocument>>;
}

/// Returns documents unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReranker;

#[async_trait]
impl Reranker for NoOpReranker {
    async fn rerank(
        &self,
        _query: &str,
        documents: Vec<RetrievedDocument>,
    ) -> Result<Vec<RetrievedDocument>> {
        Ok(documents)
    }
}

/// Blends vector similarity with the share of query terms found in the document.
///
/// `score = (1 - weight) * similarity + weight * overlap`, where `overlap` is
/// the fraction of distinct lowercase query terms present in the document.
#[derive(Debug, Clone, Copy)]
pub struct TermOverlapReranker {
    weight: f32,
}

impl TermOverlapReranker {
    /// Create a reranker giving `weight` (clamped to `[0, 1]`) to term overlap.
    pub fn new(weight: f32) -> Self {
        Self { weight: weight.clamp(0.0, 1.0) }
    }
}

impl Default for TermOverlapReranker {
    fn default() -> Self {
        Self::new(0.3)
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl Reranker for TermOverlapReranker {
    async fn rerank(
        &self,
        query: &str,
        mut documents: Vec<RetrievedDocument>,
    ) -> Result<Vec<RetrievedDocument>> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Ok(documents);
        }

        for doc in &mut documents {
            let doc_terms = terms(&doc.text);
            let shared = query_terms.intersection(&doc_terms).count() as f32;
            let overlap = shared / query_terms.len() as f32;
            doc.score = ((1.0 - self.weight) * doc.score + self.weight * overlap).clamp(0.0, 1.0);
        }
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(score: f32, text: &str) -> RetrievedDocument {
        RetrievedDocument { score, text: text.to_string() }
    }

    #[tokio::test]
    async fn noop_keeps_order_and_scores() {
        let docs = vec![doc(0.9, "a"), doc(0.4, "b")];
        assert_eq!(NoOpReranker.rerank("q", docs.clone()).await.unwrap(), docs);
    }

    #[tokio::test]
    async fn overlap_lifts_matching_documents() {
        let reranker = TermOverlapReranker::new(0.5);
        let docs = vec![doc(0.6, "unrelated words"), doc(0.5, "The Budget vote passed")];

        let out = reranker.rerank("budget vote", docs).await.unwrap();
        assert!((out[0].score - 0.3).abs() < 1e-6);
        assert!((out[1].score - 0.75).abs() < 1e-6);
    }

    #[tokio::test]
    async fn empty_query_leaves_scores() {
        let docs = vec![doc(0.7, "text")];
        let out = TermOverlapReranker::default().rerank("  ?! ", docs.clone()).await.unwrap();
        assert_eq!(out, docs);
    }
}
