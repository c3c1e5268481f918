//! Qdrant vector store backend.
//!
//! Provides [`QdrantVectorStore`] which implements [`VectorStore`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC.
//!
//! Qdrant reports cosine *similarity*; this backend converts it to cosine
//! distance (`1 - s`) so its hits carry the same raw-score semantics as
//! every other [`VectorStore`].
//!
//! # Example
//!
//! ```rust,ignore
//! use unirag::qdrant::QdrantVectorStore;
//! use unirag::DistanceMetric;
//!
//! let store = QdrantVectorStore::new("http://localhost:6334", DistanceMetric::Cosine);
//! store.connect().await?;
//! store.create_collection("collection_1", 384).await?;
//! ```

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::document::PassageRecord;
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionInfo, DistanceMetric, StoreHit, VectorStore};

const BACKEND: &str = "qdrant";

/// A [`VectorStore`] backed by [Qdrant](https://qdrant.tech/).
pub struct QdrantVectorStore {
    url: String,
    metric: DistanceMetric,
    client: RwLock<Option<Qdrant>>,
}

impl QdrantVectorStore {
    /// Create a disconnected store for the server at `url`.
    pub fn new(url: impl Into<String>, metric: DistanceMetric) -> Self {
        Self { url: url.into(), metric, client: RwLock::new(None) }
    }

    /// Create a disconnected store for `http://localhost:6334`.
    pub fn default_url(metric: DistanceMetric) -> Self {
        Self::new("http://localhost:6334", metric)
    }

    fn map_err(e: qdrant_client::QdrantError) -> RagError {
        RagError::VectorStoreError { backend: BACKEND.to_string(), message: e.to_string() }
    }

    fn not_connected() -> RagError {
        RagError::NotConnected { backend: BACKEND.into() }
    }

    fn distance(&self) -> Distance {
        match self.metric {
            DistanceMetric::Cosine => Distance::Cosine,
            DistanceMetric::Dot => Distance::Dot,
        }
    }

    /// Qdrant score → raw score in this store's metric.
    fn raw_score(&self, score: f32) -> f32 {
        match self.metric {
            DistanceMetric::Cosine => 1.0 - score,
            DistanceMetric::Dot => score,
        }
    }
}

/// Convert a Qdrant payload value to JSON.
fn to_json(value: &QdrantValue) -> Value {
    match &value.kind {
        Some(Kind::StringValue(s)) => Value::String(s.clone()),
        Some(Kind::BoolValue(b)) => Value::Bool(*b),
        Some(Kind::IntegerValue(i)) => Value::from(*i),
        Some(Kind::DoubleValue(d)) => Value::from(*d),
        Some(Kind::StructValue(s)) => {
            Value::Object(s.fields.iter().map(|(k, v)| (k.clone(), to_json(v))).collect())
        }
        Some(Kind::ListValue(list)) => Value::Array(list.values.iter().map(to_json).collect()),
        Some(Kind::NullValue(_)) | None => Value::Null,
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    fn distance_metric(&self) -> DistanceMetric {
        self.metric
    }

    async fn connect(&self) -> Result<()> {
        let mut client = self.client.write().await;
        if client.is_none() {
            *client = Some(Qdrant::from_url(&self.url).build().map_err(Self::map_err)?);
            info!(backend = BACKEND, url = %self.url, "connected");
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        *self.client.write().await = None;
        info!(backend = BACKEND, "disconnected");
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let guard = self.client.read().await;
        let client = guard.as_ref().ok_or_else(Self::not_connected)?;
        client.collection_exists(name).await.map_err(Self::map_err)
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let guard = self.client.read().await;
        let client = guard.as_ref().ok_or_else(Self::not_connected)?;
        let response = client.list_collections().await.map_err(Self::map_err)?;
        Ok(response.collections.into_iter().map(|c| c.name).collect())
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let guard = self.client.read().await;
        let client = guard.as_ref().ok_or_else(Self::not_connected)?;
        client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dimensions as u64, self.distance())),
            )
            .await
            .map_err(Self::map_err)?;

        debug!(collection = name, dimensions, "created qdrant collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let guard = self.client.read().await;
        let client = guard.as_ref().ok_or_else(Self::not_connected)?;
        client.delete_collection(name).await.map_err(Self::map_err)?;
        debug!(collection = name, "deleted qdrant collection");
        Ok(())
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo> {
        let guard = self.client.read().await;
        let client = guard.as_ref().ok_or_else(Self::not_connected)?;
        let response = client.collection_info(name).await.map_err(Self::map_err)?;
        let info = response.result.ok_or_else(|| RagError::CollectionNotFound(name.to_string()))?;

        let dimensions = info
            .config
            .as_ref()
            .and_then(|c| c.params.as_ref())
            .and_then(|p| p.vectors_config.as_ref())
            .and_then(|v| v.config.as_ref())
            .and_then(|config| match config {
                Config::Params(params) => Some(params.size as usize),
                _ => None,
            })
            .unwrap_or_default();

        Ok(CollectionInfo {
            name: name.to_string(),
            dimensions,
            distance: self.metric,
            points_count: info.points_count.unwrap_or_default(),
        })
    }

    async fn upload_records(&self, name: &str, records: &[PassageRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let points = records
            .iter()
            .map(|record| {
                let mut payload = Map::new();
                payload.insert("text".to_string(), Value::String(record.text.clone()));
                payload.insert("metadata".to_string(), record.metadata.clone());
                let payload = Payload::try_from(Value::Object(payload)).map_err(|e| {
                    RagError::VectorStoreError { backend: BACKEND.into(), message: e.to_string() }
                })?;
                Ok(PointStruct::new(record.id, record.vector.clone(), payload))
            })
            .collect::<Result<Vec<PointStruct>>>()?;

        let guard = self.client.read().await;
        let client = guard.as_ref().ok_or_else(Self::not_connected)?;
        client
            .upsert_points(UpsertPointsBuilder::new(name, points).wait(true))
            .await
            .map_err(Self::map_err)?;

        debug!(collection = name, count = records.len(), "uploaded records to qdrant");
        Ok(())
    }

    async fn search(&self, name: &str, vector: &[f32], limit: usize) -> Result<Vec<StoreHit>> {
        let guard = self.client.read().await;
        let client = guard.as_ref().ok_or_else(Self::not_connected)?;
        let response = client
            .search_points(
                SearchPointsBuilder::new(name, vector.to_vec(), limit as u64).with_payload(true),
            )
            .await
            .map_err(Self::map_err)?;

        let hits = response
            .result
            .into_iter()
            .map(|scored| {
                let id = match scored.id.and_then(|pid| pid.point_id_options) {
                    Some(PointIdOptions::Num(n)) => n,
                    Some(PointIdOptions::Uuid(_)) | None => 0,
                };
                let text = scored.payload.get("text").map(to_json);
                StoreHit {
                    id,
                    score: self.raw_score(scored.score),
                    text: match text {
                        Some(Value::String(s)) => s,
                        _ => String::new(),
                    },
                    metadata: scored.payload.get("metadata").map(to_json).unwrap_or(Value::Null),
                }
            })
            .collect();

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use qdrant_client::qdrant::{ListValue, Struct};

    use super::*;

    fn value(kind: Kind) -> QdrantValue {
        QdrantValue { kind: Some(kind) }
    }

    #[test]
    fn payload_values_convert_to_json() {
        let nested = value(Kind::StructValue(Struct {
            fields: [("page".to_string(), value(Kind::IntegerValue(3)))].into_iter().collect(),
        }));
        assert_eq!(to_json(&nested), serde_json::json!({"page": 3}));

        let list = value(Kind::ListValue(ListValue {
            values: vec![value(Kind::StringValue("a".into())), value(Kind::BoolValue(true))],
        }));
        assert_eq!(to_json(&list), serde_json::json!(["a", true]));
    }

    #[test]
    fn cosine_similarity_becomes_distance() {
        let store = QdrantVectorStore::default_url(DistanceMetric::Cosine);
        assert_eq!(store.raw_score(1.0), 0.0);
        assert_eq!(store.raw_score(-1.0), 2.0);
        let similarity = DistanceMetric::Cosine.to_similarity(store.raw_score(0.8));
        assert!((similarity - 0.9).abs() < 1e-6);
    }
}
