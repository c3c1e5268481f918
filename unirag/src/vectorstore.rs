//! Vector store trait for storing and searching passage embeddings.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::PassageRecord;
use crate::error::{RagError, Result};

/// The store's native distance metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine distance, `1 - cos(a, b)`, in `[0, 2]`. Lower is nearer.
    #[default]
    Cosine,
    /// Raw dot product. Higher is nearer.
    ///
    /// Requires unit-length embeddings: see [`DistanceMetric::to_similarity`].
    Dot,
}

impl DistanceMetric {
    /// Convert a raw store score into a similarity in `[0, 1]`.
    ///
    /// Cosine distance `d` maps to `1 - d / 2`. A dot product `p` maps to
    /// `(1 + p) / 2`, which equals the cosine mapping for unit-length vectors.
    /// Results are clamped into `[0, 1]`.
    ///
    /// With unnormalized embeddings a dot product leaves `[-1, 1]` and every
    /// such score saturates at `1.0` or `0.0`, so a similarity threshold can
    /// no longer separate them. Normalize embeddings before storing them in a
    /// `Dot` collection; [`DistanceMetric::is_out_of_range`] detects the case.
    pub fn to_similarity(self, raw: f32) -> f32 {
        let similarity = match self {
            Self::Cosine => 1.0 - raw / 2.0,
            Self::Dot => (1.0 + raw) / 2.0,
        };
        similarity.clamp(0.0, 1.0)
    }

    /// `true` when `raw` lies outside the metric's range, so that
    /// [`DistanceMetric::to_similarity`] has to clamp it.
    ///
    /// Rounding noise within a small tolerance is not reported.
    pub fn is_out_of_range(self, raw: f32) -> bool {
        const TOLERANCE: f32 = 1e-4;
        let (low, high) = match self {
            Self::Cosine => (0.0, 2.0),
            Self::Dot => (-1.0, 1.0),
        };
        raw < low - TOLERANCE || raw > high + TOLERANCE
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosine => f.write_str("cosine"),
            Self::Dot => f.write_str("dot"),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "dot" => Ok(Self::Dot),
            other => Err(RagError::ConfigError(format!("unknown distance method '{other}'"))),
        }
    }
}

/// A raw neighbor returned by [`VectorStore::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoreHit {
    /// Record id.
    pub id: u64,
    /// Raw score in the store's [`DistanceMetric`].
    pub score: f32,
    /// Stored passage text.
    pub text: String,
    /// Stored passage metadata.
    pub metadata: Value,
}

/// Summary of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: String,
    /// Vector dimensionality.
    pub dimensions: usize,
    /// Distance metric the collection was created with.
    pub distance: DistanceMetric,
    /// Number of stored records.
    pub points_count: u64,
}

/// A storage backend for passage embeddings with nearest-neighbor search.
///
/// A store is one long-lived handle shared across requests. `connect` and
/// `disconnect` are exclusive with respect to every other operation, so a
/// reconnect never swaps the client out from under an in-flight search.
///
/// # Example
///
/// ```rust,ignore
/// use unirag::{InMemoryVectorStore, VectorStore, DistanceMetric};
///
/// let store = InMemoryVectorStore::new(DistanceMetric::Cosine);
/// store.connect().await?;
/// store.create_collection("collection_1", 384).await?;
/// store.upload_records("collection_1", &records).await?;
/// let hits = store.search("collection_1", &query_vector, 1000).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name used in logs and errors.
    fn backend(&self) -> &str;

    /// The metric every collection of this store is created with.
    fn distance_metric(&self) -> DistanceMetric;

    /// Open the underlying client.
    async fn connect(&self) -> Result<()>;

    /// Release the underlying client.
    async fn disconnect(&self) -> Result<()>;

    /// Return `true` if the collection exists.
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Names of every collection.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Create a collection. Fails if it already exists.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Delete a collection and all its records.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Describe a collection.
    async fn collection_info(&self, name: &str) -> Result<CollectionInfo>;

    /// Write records into an existing collection, replacing records with the same id.
    async fn upload_records(&self, name: &str, records: &[PassageRecord]) -> Result<()>;

    /// Return up to `limit` nearest records, nearest first, with raw scores.
    async fn search(&self, name: &str, vector: &[f32], limit: usize) -> Result<Vec<StoreHit>>;
}
