//! In-memory [`VectorIndex`] implementation for tests and embedding into
//! other programs.
//!
//! Collections live in a `HashMap` behind a `std::sync::RwLock`. Each reset
//! and each add takes the write lock on its own, so a reader never sees a
//! half-applied call but can see a collection that is still being filled.
//! Queries are brute-force over every stored vector.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::embedding::check_dims;
use crate::error::RagError;
use crate::models::{IndexEntry, Neighbor};

use super::{rank_neighbors, CollectionInfo, CollectionSpec, VectorIndex};

struct Collection {
    spec: CollectionSpec,
    created_at: i64,
    entries: BTreeMap<String, IndexEntry>,
}

/// In-memory vector index.
pub struct InMemoryIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory index lock poisoned")
}

fn info(name: &str, c: &Collection) -> CollectionInfo {
    CollectionInfo {
        name: name.to_string(),
        model: c.spec.model.clone(),
        dims: c.spec.dims,
        metric: c.spec.metric,
        created_at: c.created_at,
        count: c.entries.len(),
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn reset_collection(&self, name: &str, spec: &CollectionSpec) -> Result<()> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        collections.insert(
            name.to_string(),
            Collection {
                spec: spec.clone(),
                created_at: chrono::Utc::now().timestamp(),
                entries: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn add(&self, name: &str, entry: &IndexEntry) -> Result<()> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| RagError::CollectionNotFound(name.to_string()))?;

        check_dims(&entry.embedding, collection.spec.dims)?;
        if collection.entries.contains_key(&entry.id) {
            bail!(RagError::DuplicateId(entry.id.clone()));
        }
        collection.entries.insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn count(&self, name: &str) -> Result<usize> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections
            .get(name)
            .map(|c| c.entries.len())
            .unwrap_or(0))
    }

    async fn query(&self, name: &str, embedding: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let collections = self.collections.read().map_err(poisoned)?;
        let Some(collection) = collections.get(name) else {
            return Ok(Vec::new());
        };

        let metric = collection.spec.metric;
        let neighbors = collection
            .entries
            .values()
            .map(|e| Neighbor {
                id: e.id.clone(),
                metadata: e.metadata.clone(),
                distance: metric.distance(embedding, &e.embedding),
            })
            .collect();
        Ok(rank_neighbors(neighbors, k))
    }

    async fn collection(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections.get(name).map(|c| info(name, c)))
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let collections = self.collections.read().map_err(poisoned)?;
        let mut all: Vec<CollectionInfo> = collections.iter().map(|(n, c)| info(n, c)).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}
