//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the contract the ingestion pipeline and the
//! retrieval engine require of a persistent per-project index: reset a
//! collection, add write-once entries, count them, and run a k-nearest
//! neighbor query ordered ascending by distance.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::embedding::DistanceMetric;
use crate::models::{IndexEntry, Neighbor};

/// Properties fixed when a collection is (re)created.
///
/// Recording the embedder identity lets queries detect that the index was
/// built with a different model than the one now configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub model: String,
    pub dims: usize,
    pub metric: DistanceMetric,
}

/// Summary of one collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub model: String,
    pub dims: usize,
    pub metric: DistanceMetric,
    /// Unix timestamp of the last reset.
    pub created_at: i64,
    pub count: usize,
}

/// Persistent key → (vector, metadata) index, partitioned into named
/// collections (one per project).
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`reset_collection`](VectorIndex::reset_collection) | Drop (if present) and recreate an empty collection |
/// | [`add`](VectorIndex::add) | Insert one entry; duplicate ids are rejected |
/// | [`count`](VectorIndex::count) | Number of stored entries, 0 if absent |
/// | [`query`](VectorIndex::query) | Up to `k` nearest entries, ascending distance |
/// | [`collection`](VectorIndex::collection) | Spec and size of one collection |
/// | [`list_collections`](VectorIndex::list_collections) | All collections, by name |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Delete `name` if it exists, then create it empty with `spec`.
    ///
    /// Never fails because the collection is absent.
    async fn reset_collection(&self, name: &str, spec: &CollectionSpec) -> Result<()>;

    /// Insert one entry.
    ///
    /// Fails with `DuplicateId` if the id is already present,
    /// `CollectionNotFound` if the collection was never created, and
    /// `DimensionMismatch` if the vector length differs from the
    /// collection's dimensionality.
    async fn add(&self, name: &str, entry: &IndexEntry) -> Result<()>;

    /// Number of entries in `name`; 0 when the collection does not exist.
    async fn count(&self, name: &str) -> Result<usize>;

    /// Return up to `k` entries nearest to `embedding`, ordered ascending by
    /// distance with ties broken by id. `k` larger than the collection
    /// returns every entry.
    async fn query(&self, name: &str, embedding: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// Spec and size of `name`, or `None` if it does not exist.
    async fn collection(&self, name: &str) -> Result<Option<CollectionInfo>>;

    /// Every collection, ordered by name.
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>>;
}

/// Sort neighbors ascending by distance, then by id, and keep the first `k`.
///
/// Shared by index implementations that rank by brute force.
pub fn rank_neighbors(mut neighbors: Vec<Neighbor>, k: usize) -> Vec<Neighbor> {
    neighbors.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.id.cmp(&b.id))
    });
    neighbors.truncate(k);
    neighbors
}
