//! Similarity search and collection management over a [`VectorStore`].
//!
//! The [`SearchEngine`] owns the ranking policy of the system:
//!
//! 1. pull [`MAX_CANDIDATES`] nearest neighbors from the store,
//! 2. convert each raw score to a similarity in `[0, 1]` with the store's
//!    [`DistanceMetric`](crate::DistanceMetric),
//! 3. drop candidates strictly below the threshold,
//! 4. sort by similarity, highest first,
//! 5. keep the first `limit`.

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::document::{PassageRecord, RetrievedDocument};
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionInfo, VectorStore};

/// Number of neighbors pulled from the store for every search.
///
/// Thresholding happens after the store answers, so the pool is fetched even
/// for small limits. It is also a hard ceiling on recall: a caller asking for
/// [`UNBOUNDED_LIMIT`](crate::UNBOUNDED_LIMIT) documents gets at most this many.
pub const MAX_CANDIDATES: usize = 1000;

/// Default number of records per store write.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Pair texts and vectors into records.
///
/// Missing `record_ids` default to `0..n`; missing `metadata` defaults to `null`.
///
/// # Errors
///
/// Returns [`RagError::PipelineError`] if the provided sequences differ in length.
pub fn build_records(
    texts: Vec<String>,
    vectors: Vec<Vec<f32>>,
    metadata: Option<Vec<Value>>,
    record_ids: Option<Vec<u64>>,
) -> Result<Vec<PassageRecord>> {
    let n = texts.len();
    let metadata = metadata.unwrap_or_else(|| vec![Value::Null; n]);
    let record_ids = record_ids.unwrap_or_else(|| (0..n as u64).collect());

    if vectors.len() != n || metadata.len() != n || record_ids.len() != n {
        return Err(RagError::PipelineError(format!(
            "mismatched record parts: {n} texts, {} vectors, {} metadata, {} ids",
            vectors.len(),
            metadata.len(),
            record_ids.len()
        )));
    }

    Ok(texts
        .into_iter()
        .zip(vectors)
        .zip(metadata)
        .zip(record_ids)
        .map(|(((text, vector), metadata), id)| PassageRecord { id, text, metadata, vector })
        .collect())
}

/// Ranked retrieval and idempotent collection management.
#[derive(Clone)]
pub struct SearchEngine {
    store: Arc<dyn VectorStore>,
    batch_size: usize,
}

impl SearchEngine {
    /// Create an engine over `store`.
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store, batch_size: DEFAULT_BATCH_SIZE }
    }

    /// Set the number of records per store write. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Return `true` if the collection exists.
    pub async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.store.collection_exists(name).await
    }

    /// Names of every collection.
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        self.store.list_collections().await
    }

    /// Describe a collection.
    pub async fn collection_info(&self, name: &str) -> Result<CollectionInfo> {
        self.store.collection_info(name).await
    }

    /// Create a collection if it does not exist yet.
    ///
    /// With `do_reset` the collection is deleted first. Returns `true` if a
    /// collection was created and `false` if it already existed, in which
    /// case its records are left untouched.
    pub async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        do_reset: bool,
    ) -> Result<bool> {
        if do_reset {
            self.delete_collection(name).await?;
        }

        if self.store.collection_exists(name).await? {
            debug!(collection = name, "collection already exists, skipping creation");
            return Ok(false);
        }

        self.store.create_collection(name, dimensions).await?;
        info!(
            collection = name,
            dimensions,
            metric = %self.store.distance_metric(),
            "created collection"
        );
        Ok(true)
    }

    /// Delete a collection. Returns `false` without error if it did not exist.
    pub async fn delete_collection(&self, name: &str) -> Result<bool> {
        if !self.store.collection_exists(name).await? {
            return Ok(false);
        }
        self.store.delete_collection(name).await?;
        info!(collection = name, "deleted collection");
        Ok(true)
    }

    /// Insert one record into an existing collection.
    pub async fn insert_one(&self, name: &str, record: PassageRecord) -> Result<()> {
        if !self.store.collection_exists(name).await? {
            error!(collection = name, "cannot insert into non-existent collection");
            return Err(RagError::CollectionNotFound(name.to_string()));
        }
        self.store.upload_records(name, std::slice::from_ref(&record)).await
    }

    /// Insert records in fixed-size batches.
    ///
    /// Batches are written in order. The first failing batch aborts the
    /// remaining ones and is reported as [`RagError::PartialWrite`]; batches
    /// written before it are not rolled back. Returns the number of records written.
    pub async fn insert_many(&self, name: &str, records: &[PassageRecord]) -> Result<usize> {
        if !self.store.collection_exists(name).await? {
            error!(collection = name, "cannot insert into non-existent collection");
            return Err(RagError::CollectionNotFound(name.to_string()));
        }

        let total_batches = records.len().div_ceil(self.batch_size);
        for (index, batch) in records.chunks(self.batch_size).enumerate() {
            if let Err(e) = self.store.upload_records(name, batch).await {
                error!(
                    collection = name,
                    batch = index,
                    total_batches,
                    error = %e,
                    "batch insert failed"
                );
                return Err(RagError::PartialWrite {
                    collection: name.to_string(),
                    written_batches: index,
                    total_batches,
                    message: e.to_string(),
                });
            }
            debug!(collection = name, batch = index, size = batch.len(), "inserted batch");
        }

        info!(collection = name, records = records.len(), total_batches, "inserted records");
        Ok(records.len())
    }

    /// Rank the passages of a collection against `vector`.
    ///
    /// Every returned document has `score >= threshold` (when a threshold is
    /// given), documents are ordered by descending score, and at most
    /// `min(limit, MAX_CANDIDATES)` documents are returned.
    pub async fn search(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<RetrievedDocument>> {
        let hits = self.store.search(name, vector, MAX_CANDIDATES).await?;
        if hits.is_empty() {
            debug!(collection = name, "store returned no candidates");
            return Ok(Vec::new());
        }

        let metric = self.store.distance_metric();
        let candidates = hits.len();
        let clamped = hits.iter().filter(|hit| metric.is_out_of_range(hit.score)).count();
        if clamped > 0 {
            warn!(
                collection = name,
                %metric,
                clamped,
                candidates,
                "raw scores outside the metric range were clamped; store unit-length embeddings"
            );
        }
        let mut documents: Vec<RetrievedDocument> = hits
            .into_iter()
            .map(|hit| RetrievedDocument { score: metric.to_similarity(hit.score), text: hit.text })
            .filter(|doc| !doc.score.is_nan())
            .filter(|doc| threshold.is_none_or(|t| doc.score >= t))
            .collect();

        documents.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        documents.truncate(limit);

        debug!(
            collection = name,
            candidates,
            returned = documents.len(),
            ?threshold,
            "search completed"
        );
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inmemory::InMemoryVectorStore;
    use crate::vectorstore::DistanceMetric;

    /// A unit vector at `cos_target` cosine similarity to `[1, 0]`.
    fn at_cosine(cos_target: f32) -> Vec<f32> {
        vec![cos_target, (1.0 - cos_target * cos_target).sqrt()]
    }

    /// Cosine value whose converted similarity is `similarity`.
    fn cos_for(similarity: f32) -> f32 {
        2.0 * similarity - 1.0
    }

    async fn engine_with(similarities: &[f32]) -> SearchEngine {
        let engine = SearchEngine::new(Arc::new(InMemoryVectorStore::new(DistanceMetric::Cosine)));
        engine.create_collection("c", 2, false).await.unwrap();
        let texts = similarities.iter().map(|s| format!("doc-{s}")).collect();
        let vectors = similarities.iter().map(|s| at_cosine(cos_for(*s))).collect();
        let records = build_records(texts, vectors, None, None).unwrap();
        engine.insert_many("c", &records).await.unwrap();
        engine
    }

    #[tokio::test]
    async fn threshold_and_limit_example() {
        let engine = engine_with(&[0.3, 0.9, 0.6]).await;
        let docs = engine.search("c", &[1.0, 0.0], 2, Some(0.5)).await.unwrap();

        let texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["doc-0.9", "doc-0.6"]);
        assert!((docs[0].score - 0.9).abs() < 1e-4);
        assert!((docs[1].score - 0.6).abs() < 1e-4);
    }

    #[tokio::test]
    async fn limit_larger_than_collection_returns_everything_sorted() {
        let engine = engine_with(&[0.2, 0.8]).await;
        let docs = engine.search("c", &[1.0, 0.0], 5, None).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].score >= docs[1].score);
    }

    #[tokio::test]
    async fn threshold_removing_everything_yields_empty() {
        let engine = engine_with(&[0.2, 0.4]).await;
        assert!(engine.search("c", &[1.0, 0.0], 10, Some(0.95)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn identical_vector_ranks_first_with_unit_similarity() {
        let engine = SearchEngine::new(Arc::new(InMemoryVectorStore::new(DistanceMetric::Cosine)));
        engine.create_collection("c", 3, false).await.unwrap();
        let texts = vec!["target".to_string(), "other".to_string()];
        let vectors = vec![vec![0.2, 0.3, 0.9], vec![1.0, 0.0, 0.0]];
        let records = build_records(texts, vectors, None, Some(vec![42, 1])).unwrap();
        engine.insert_many("c", &records).await.unwrap();

        let docs = engine.search("c", &[0.2, 0.3, 0.9], 10, None).await.unwrap();
        assert_eq!(docs[0].text, "target");
        assert!((docs[0].score - 1.0).abs() < 1e-5);
    }

    async fn dot_engine(vectors: Vec<Vec<f32>>) -> SearchEngine {
        let engine = SearchEngine::new(Arc::new(InMemoryVectorStore::new(DistanceMetric::Dot)));
        engine.create_collection("c", 2, false).await.unwrap();
        let texts = vec!["east".to_string(), "diagonal".to_string()];
        let records = build_records(texts, vectors, None, None).unwrap();
        engine.insert_many("c", &records).await.unwrap();
        engine
    }

    #[tokio::test]
    async fn dot_threshold_separates_unit_vectors() {
        let half = std::f32::consts::FRAC_1_SQRT_2;
        let engine = dot_engine(vec![vec![1.0, 0.0], vec![half, half]]).await;

        let docs = engine.search("c", &[1.0, 0.0], 10, Some(0.99)).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "east");
        assert!((docs[0].score - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn dot_scores_of_unnormalized_vectors_saturate() {
        let engine = dot_engine(vec![vec![2.0, 0.0], vec![5.0, 5.0]]).await;
        assert!(DistanceMetric::Dot.is_out_of_range(5.0));

        // Both raw products exceed 1, so both clamp to a perfect score.
        let docs = engine.search("c", &[1.0, 0.0], 10, Some(0.99)).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.score == 1.0));
    }

    #[tokio::test]
    async fn unbounded_limit_is_capped_by_candidate_ceiling() {
        let engine = SearchEngine::new(Arc::new(InMemoryVectorStore::new(DistanceMetric::Cosine)))
            .with_batch_size(500);
        engine.create_collection("c", 2, false).await.unwrap();
        let n = MAX_CANDIDATES + 50;
        let texts = (0..n).map(|i| format!("p{i}")).collect();
        let vectors = (0..n).map(|i| at_cosine(1.0 - i as f32 / n as f32)).collect();
        engine.insert_many("c", &build_records(texts, vectors, None, None).unwrap()).await.unwrap();

        let docs = engine.search("c", &[1.0, 0.0], crate::UNBOUNDED_LIMIT, None).await.unwrap();
        assert_eq!(docs.len(), MAX_CANDIDATES);
    }

    #[tokio::test]
    async fn create_collection_is_idempotent_and_reset_clears() {
        let engine = engine_with(&[0.5]).await;

        assert!(!engine.create_collection("c", 2, false).await.unwrap());
        assert_eq!(engine.collection_info("c").await.unwrap().points_count, 1);

        assert!(engine.create_collection("c", 2, true).await.unwrap());
        assert_eq!(engine.collection_info("c").await.unwrap().points_count, 0);
    }

    #[tokio::test]
    async fn deleting_missing_collection_is_noop() {
        let engine = SearchEngine::new(Arc::new(InMemoryVectorStore::default()));
        assert!(!engine.delete_collection("nope").await.unwrap());
    }

    #[tokio::test]
    async fn insert_into_missing_collection_fails() {
        let engine = SearchEngine::new(Arc::new(InMemoryVectorStore::default()));
        let record =
            PassageRecord { id: 0, text: "x".into(), metadata: Value::Null, vector: vec![1.0] };
        assert!(matches!(
            engine.insert_one("nope", record).await,
            Err(RagError::CollectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn insert_one_adds_a_searchable_record() {
        let engine = engine_with(&[0.2]).await;
        let record = PassageRecord {
            id: 9,
            text: "added".into(),
            metadata: Value::Null,
            vector: vec![1.0, 0.0],
        };
        engine.insert_one("c", record).await.unwrap();

        assert_eq!(engine.collection_info("c").await.unwrap().points_count, 2);
        let docs = engine.search("c", &[1.0, 0.0], 1, None).await.unwrap();
        assert_eq!(docs[0].text, "added");
    }

    #[tokio::test]
    async fn failing_batch_aborts_the_rest() {
        let engine = SearchEngine::new(Arc::new(InMemoryVectorStore::default())).with_batch_size(2);
        engine.create_collection("c", 2, false).await.unwrap();

        // The fourth record has the wrong dimensionality, so batch #1 fails.
        let v = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0], vec![1.0], vec![0.5, 0.5]];
        let texts = (0..5).map(|i| i.to_string()).collect();
        let records = build_records(texts, v, None, None).unwrap();

        let err = engine.insert_many("c", &records).await.unwrap_err();
        assert!(matches!(err, RagError::PartialWrite { written_batches: 1, total_batches: 3, .. }));
        assert_eq!(engine.collection_info("c").await.unwrap().points_count, 2);
    }

    #[test]
    fn build_records_defaults_and_validation() {
        let texts = vec!["a".into(), "b".into()];
        let records = build_records(texts, vec![vec![1.0], vec![2.0]], None, None).unwrap();
        assert_eq!(records[1].id, 1);
        assert_eq!(records[0].metadata, Value::Null);

        assert!(build_records(vec!["a".into()], vec![], None, None).is_err());
        assert!(build_records(vec!["a".into()], vec![vec![1.0]], None, Some(vec![1, 2])).is_err());
    }
}
