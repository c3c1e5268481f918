//! Embedded vector store with optional on-disk snapshots.
//!
//! [`InMemoryVectorStore`] keeps collections in a `HashMap` behind a
//! `tokio::sync::RwLock`. Searches hold the read lock for their whole
//! duration while `connect` / `disconnect` take the write lock, which makes a
//! reconnect exclusive with in-flight searches. A store opened with
//! [`InMemoryVectorStore::persistent`] loads a JSON snapshot on `connect` and
//! writes it back on `flush` and `disconnect`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::document::PassageRecord;
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionInfo, DistanceMetric, StoreHit, VectorStore};

const BACKEND: &str = "InMemory";

/// File name of the snapshot inside the store directory.
pub const SNAPSHOT_FILE: &str = "collections.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Collection {
    dimensions: usize,
    records: BTreeMap<u64, PassageRecord>,
}

type Collections = HashMap<String, Collection>;

/// An embedded vector store.
///
/// # Example
///
/// ```rust,ignore
/// use unirag::{DistanceMetric, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::persistent("./assets/vectordb", DistanceMetric::Cosine);
/// store.connect().await?;
/// ```
#[derive(Debug)]
pub struct InMemoryVectorStore {
    metric: DistanceMetric,
    path: Option<PathBuf>,
    state: RwLock<Option<Collections>>,
}

impl InMemoryVectorStore {
    /// Create a connected, empty, memory-only store.
    pub fn new(metric: DistanceMetric) -> Self {
        Self { metric, path: None, state: RwLock::new(Some(Collections::new())) }
    }

    /// Create a disconnected store backed by a snapshot in directory `path`.
    pub fn persistent(path: impl Into<PathBuf>, metric: DistanceMetric) -> Self {
        Self { metric, path: Some(path.into()), state: RwLock::new(None) }
    }

    /// Write the current collections to the snapshot file, if the store has one.
    pub async fn flush(&self) -> Result<()> {
        let state = self.state.read().await;
        match (&self.path, state.as_ref()) {
            (Some(path), Some(collections)) => write_snapshot(path, collections).await,
            (_, None) => Err(not_connected()),
            (None, Some(_)) => Ok(()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new(DistanceMetric::default())
    }
}

fn not_connected() -> RagError {
    RagError::NotConnected { backend: BACKEND.into() }
}

fn io_error(path: &Path, e: impl std::fmt::Display) -> RagError {
    RagError::VectorStoreError {
        backend: BACKEND.into(),
        message: format!("snapshot '{}': {e}", path.display()),
    }
}

async fn read_snapshot(dir: &Path) -> Result<Collections> {
    let file = dir.join(SNAPSHOT_FILE);
    match tokio::fs::read(&file).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| io_error(&file, e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Collections::new()),
        Err(e) => Err(io_error(&file, e)),
    }
}

async fn write_snapshot(dir: &Path, collections: &Collections) -> Result<()> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| io_error(dir, e))?;
    let file = dir.join(SNAPSHOT_FILE);
    let bytes = serde_json::to_vec(collections).map_err(|e| io_error(&file, e))?;
    tokio::fs::write(&file, bytes).await.map_err(|e| io_error(&file, e))?;
    debug!(path = %file.display(), collections = collections.len(), "wrote snapshot");
    Ok(())
}

/// Cosine similarity of two vectors; 0.0 if either has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    fn distance_metric(&self) -> DistanceMetric {
        self.metric
    }

    async fn connect(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if state.is_some() {
            return Ok(());
        }
        let collections = match &self.path {
            Some(path) => read_snapshot(path).await?,
            None => Collections::new(),
        };
        info!(backend = BACKEND, collections = collections.len(), "connected");
        *state = Some(collections);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if let (Some(path), Some(collections)) = (&self.path, state.as_ref()) {
            write_snapshot(path, collections).await?;
        }
        *state = None;
        info!(backend = BACKEND, "disconnected");
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let state = self.state.read().await;
        let collections = state.as_ref().ok_or_else(not_connected)?;
        Ok(collections.contains_key(name))
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let state = self.state.read().await;
        let collections = state.as_ref().ok_or_else(not_connected)?;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let mut state = self.state.write().await;
        let collections = state.as_mut().ok_or_else(not_connected)?;
        if collections.contains_key(name) {
            return Err(RagError::VectorStoreError {
                backend: BACKEND.into(),
                message: format!("collection '{name}' already exists"),
            });
        }
        collections.insert(name.to_string(), Collection { dimensions, records: BTreeMap::new() });
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let collections = state.as_mut().ok_or_else(not_connected)?;
        collections.remove(name);
        Ok(())
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo> {
        let state = self.state.read().await;
        let collections = state.as_ref().ok_or_else(not_connected)?;
        let collection =
            collections.get(name).ok_or_else(|| RagError::CollectionNotFound(name.to_string()))?;
        Ok(CollectionInfo {
            name: name.to_string(),
            dimensions: collection.dimensions,
            distance: self.metric,
            points_count: collection.records.len() as u64,
        })
    }

    async fn upload_records(&self, name: &str, records: &[PassageRecord]) -> Result<()> {
        let mut state = self.state.write().await;
        let collections = state.as_mut().ok_or_else(not_connected)?;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| RagError::CollectionNotFound(name.to_string()))?;

        if let Some(bad) = records.iter().find(|r| r.vector.len() != collection.dimensions) {
            return Err(RagError::DimensionMismatch {
                expected: collection.dimensions,
                actual: bad.vector.len(),
            });
        }
        for record in records {
            collection.records.insert(record.id, record.clone());
        }
        Ok(())
    }

    async fn search(&self, name: &str, vector: &[f32], limit: usize) -> Result<Vec<StoreHit>> {
        let state = self.state.read().await;
        let collections = state.as_ref().ok_or_else(not_connected)?;
        let collection =
            collections.get(name).ok_or_else(|| RagError::CollectionNotFound(name.to_string()))?;

        if vector.len() != collection.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: collection.dimensions,
                actual: vector.len(),
            });
        }

        let mut hits: Vec<StoreHit> = collection
            .records
            .values()
            .map(|record| {
                let score = match self.metric {
                    DistanceMetric::Cosine => 1.0 - cosine_similarity(&record.vector, vector),
                    DistanceMetric::Dot => dot_product(&record.vector, vector),
                };
                StoreHit {
                    id: record.id,
                    score,
                    text: record.text.clone(),
                    metadata: record.metadata.clone(),
                }
            })
            .collect();

        // Nearest first: smallest distance, or largest dot product.
        match self.metric {
            DistanceMetric::Cosine => {
                hits.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal))
            }
            DistanceMetric::Dot => {
                hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
            }
        }
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    fn record(id: u64, text: &str, vector: Vec<f32>) -> PassageRecord {
        PassageRecord { id, text: text.into(), metadata: json!({"page": id}), vector }
    }

    #[tokio::test]
    async fn cosine_search_returns_distances_nearest_first() {
        let store = InMemoryVectorStore::new(DistanceMetric::Cosine);
        store.create_collection("c", 2).await.unwrap();
        store
            .upload_records(
                "c",
                &[
                    record(1, "east", vec![1.0, 0.0]),
                    record(2, "north", vec![0.0, 1.0]),
                    record(3, "west", vec![-1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store.search("c", &[1.0, 0.0], 10).await.unwrap();
        let ids: Vec<u64> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(hits[0].score.abs() < 1e-6);
        assert!((hits[1].score - 1.0).abs() < 1e-6);
        assert!((hits[2].score - 2.0).abs() < 1e-6);
        assert_eq!(hits[0].metadata, json!({"page": 1}));

        assert_eq!(store.search("c", &[1.0, 0.0], 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn dot_search_orders_by_largest_product() {
        let store = InMemoryVectorStore::new(DistanceMetric::Dot);
        store.create_collection("c", 2).await.unwrap();
        let records = [record(1, "small", vec![0.1, 0.0]), record(2, "big", vec![3.0, 0.0])];
        store.upload_records("c", &records).await.unwrap();

        let hits = store.search("c", &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits[0].id, 2);
        assert!((hits[0].score - 3.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn rejects_duplicate_create_and_wrong_dimensions() {
        let store = InMemoryVectorStore::new(DistanceMetric::Cosine);
        store.create_collection("c", 3).await.unwrap();
        assert!(store.create_collection("c", 3).await.is_err());

        let err = store.upload_records("c", &[record(1, "x", vec![1.0])]).await.unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 1 }));

        let err = store.upload_records("missing", &[]).await.unwrap_err();
        assert!(matches!(err, RagError::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn upload_replaces_records_with_same_id() {
        let store = InMemoryVectorStore::new(DistanceMetric::Cosine);
        store.create_collection("c", 1).await.unwrap();
        store.upload_records("c", &[record(7, "old", vec![1.0])]).await.unwrap();
        store.upload_records("c", &[record(7, "new", vec![1.0])]).await.unwrap();

        assert_eq!(store.collection_info("c").await.unwrap().points_count, 1);
        assert_eq!(store.search("c", &[1.0], 1).await.unwrap()[0].text, "new");
    }

    #[tokio::test]
    async fn disconnected_store_refuses_operations() {
        let store = InMemoryVectorStore::new(DistanceMetric::Cosine);
        store.disconnect().await.unwrap();
        assert!(matches!(store.collection_exists("c").await, Err(RagError::NotConnected { .. })));
        store.connect().await.unwrap();
        assert!(!store.collection_exists("c").await.unwrap());
    }

    #[tokio::test]
    async fn snapshot_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryVectorStore::persistent(dir.path(), DistanceMetric::Cosine);
        store.connect().await.unwrap();
        store.create_collection("collection_1", 2).await.unwrap();
        store.upload_records("collection_1", &[record(4, "kept", vec![0.6, 0.8])]).await.unwrap();
        store.disconnect().await.unwrap();
        assert!(dir.path().join(SNAPSHOT_FILE).exists());

        let reopened = InMemoryVectorStore::persistent(dir.path(), DistanceMetric::Cosine);
        reopened.connect().await.unwrap();
        let info = reopened.collection_info("collection_1").await.unwrap();
        assert_eq!(info.dimensions, 2);
        assert_eq!(info.points_count, 1);
        assert_eq!(reopened.search("collection_1", &[0.6, 0.8], 1).await.unwrap()[0].id, 4);
    }

    #[tokio::test]
    async fn flush_writes_snapshot_without_disconnecting() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryVectorStore::persistent(dir.path(), DistanceMetric::Cosine);
        assert!(matches!(store.flush().await, Err(RagError::NotConnected { .. })));

        store.connect().await.unwrap();
        store.create_collection("c", 1).await.unwrap();
        store.upload_records("c", &[record(1, "flushed", vec![1.0])]).await.unwrap();
        store.flush().await.unwrap();
        assert!(store.collection_exists("c").await.unwrap());

        let copy = InMemoryVectorStore::persistent(dir.path(), DistanceMetric::Cosine);
        copy.connect().await.unwrap();
        assert_eq!(copy.search("c", &[1.0], 1).await.unwrap()[0].text, "flushed");
    }

    #[tokio::test]
    async fn flush_without_snapshot_path_is_noop() {
        InMemoryVectorStore::default().flush().await.unwrap();
    }

    #[tokio::test]
    async fn disconnect_waits_for_in_flight_reads() {
        let store = Arc::new(InMemoryVectorStore::new(DistanceMetric::Cosine));
        let reading = store.state.read().await;

        let pending = tokio::spawn({
            let store = store.clone();
            async move { store.disconnect().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        drop(reading);
        pending.await.unwrap().unwrap();
        assert!(matches!(store.list_collections().await, Err(RagError::NotConnected { .. })));
    }

    #[tokio::test]
    async fn search_waits_for_connect() {
        let store = Arc::new(InMemoryVectorStore::new(DistanceMetric::Cosine));
        store.create_collection("c", 1).await.unwrap();
        store.upload_records("c", &[record(1, "only", vec![1.0])]).await.unwrap();
        let connecting = store.state.write().await;

        let pending = tokio::spawn({
            let store = store.clone();
            async move { store.search("c", &[1.0], 1).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        drop(connecting);
        assert_eq!(pending.await.unwrap().unwrap()[0].id, 1);
    }
}
