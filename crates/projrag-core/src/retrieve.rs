//! Retrieval engine: query text → bounded context string.
//!
//! The algorithm operates entirely through the [`Embedder`] and
//! [`VectorIndex`] traits. The calling application is responsible for
//! constructing both and for passing the context to a language model.
//!
//! # Selection Algorithm
//!
//! 1. Embed the query with the same model the collection was built with.
//! 2. `k = count(collection)`: rank the whole collection, because filtering
//!    happens afterwards.
//! 3. `query(embedding, k)` → neighbors ascending by distance.
//! 4. Keep neighbors with `distance < relevance_threshold`.
//! 5. Keep the first `top_n` of those.
//! 6. Join their texts with `"\n"`; if none survive, use
//!    [`NO_RELEVANT_DOCUMENTS`].
//!
//! Ranking the full collection costs a scan per query. That is fine for the
//! small per-project corpora this tool targets; an index with native range
//! queries could take the threshold and `top_n` directly, as long as the
//! ascending-distance order is kept.

use anyhow::{bail, Result};

use crate::embedding::{DistanceMetric, Embedder};
use crate::error::RagError;
use crate::index::VectorIndex;
use crate::models::Neighbor;

/// Context string used when no entry is close enough to the query.
///
/// Never empty, so the language model can tell "nothing relevant" apart from
/// a missing context.
pub const NO_RELEVANT_DOCUMENTS: &str = "No relevant documents found.";

/// Relevance tuning, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalParams {
    /// Exclusive distance cutoff; only `distance < threshold` survives.
    pub relevance_threshold: f32,
    /// Maximum number of texts in the context.
    pub top_n: usize,
    /// Metric the threshold is expressed in; must match the collection's.
    pub metric: DistanceMetric,
}

/// Outcome of a single retrieval.
#[derive(Debug, Clone)]
pub struct Retrieval {
    /// Every neighbor returned by the index, ascending by distance.
    pub ranked: Vec<Neighbor>,
    /// How many leading entries of `ranked` made it into the context.
    pub selected: usize,
    /// Texts of the selected neighbors joined by newlines, or the sentinel.
    pub context: String,
}

impl Retrieval {
    pub fn is_empty(&self) -> bool {
        self.selected == 0
    }
}

/// Apply the threshold filter and the `top_n` cap.
///
/// `neighbors` is sorted by distance first (stable, so the index's
/// tie-break survives), which makes the surviving set a prefix.
pub fn select_relevant(neighbors: &mut [Neighbor], params: &RetrievalParams) -> usize {
    neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    neighbors
        .iter()
        .take_while(|n| n.distance < params.relevance_threshold)
        .take(params.top_n)
        .count()
}

/// Join the selected texts, or return the sentinel when there are none.
pub fn build_context(selected: &[Neighbor]) -> String {
    if selected.is_empty() {
        return NO_RELEVANT_DOCUMENTS.to_string();
    }
    selected
        .iter()
        .map(|n| n.metadata.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run the full selection algorithm for `query` against `collection`.
///
/// An absent or empty collection yields the sentinel without querying the
/// index. A collection built with another embedding model, or ranked under
/// another metric, fails with [`RagError::EmbeddingModelMismatch`].
pub async fn retrieve<I, E>(
    index: &I,
    embedder: &E,
    collection: &str,
    query: &str,
    params: &RetrievalParams,
) -> Result<Retrieval>
where
    I: VectorIndex + ?Sized,
    E: Embedder + ?Sized,
{
    let info = index.collection(collection).await?;
    if let Some(info) = &info {
        if info.model != embedder.model_name()
            || info.dims != embedder.dims()
            || info.metric != params.metric
        {
            bail!(RagError::EmbeddingModelMismatch {
                indexed: format!(
                    "{} ({} dims, {})",
                    info.model,
                    info.dims,
                    info.metric.as_str()
                ),
                configured: format!(
                    "{} ({} dims, {})",
                    embedder.model_name(),
                    embedder.dims(),
                    params.metric.as_str()
                ),
            });
        }
    }

    let query_vec = embedder.embed(query).await?;

    let k = index.count(collection).await?;
    let mut ranked = if k == 0 {
        Vec::new()
    } else {
        index.query(collection, &query_vec, k).await?
    };

    let selected = select_relevant(&mut ranked, params);
    let context = build_context(&ranked[..selected]);

    Ok(Retrieval {
        ranked,
        selected,
        context,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::memory::InMemoryIndex;
    use crate::index::CollectionSpec;
    use crate::models::{EntryMetadata, IndexEntry};
    use async_trait::async_trait;
    use std::collections::HashMap;

    fn neighbor(id: &str, distance: f32) -> Neighbor {
        Neighbor {
            id: id.to_string(),
            metadata: EntryMetadata {
                text: format!("<{}>", id),
                source: "f.txt".to_string(),
                chunk_index: Some(0),
                hash: String::new(),
            },
            distance,
        }
    }

    fn params(relevance_threshold: f32, top_n: usize) -> RetrievalParams {
        RetrievalParams {
            relevance_threshold,
            top_n,
            metric: DistanceMetric::Cosine,
        }
    }

    /// Maps known texts to fixed vectors.
    struct TableEmbedder {
        model: String,
        table: HashMap<String, Vec<f32>>,
    }

    impl TableEmbedder {
        fn new(pairs: &[(&str, [f32; 2])]) -> Self {
            Self {
                model: "table".to_string(),
                table: pairs
                    .iter()
                    .map(|(t, v)| (t.to_string(), v.to_vec()))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl Embedder for TableEmbedder {
        fn model_name(&self) -> &str {
            &self.model
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            texts
                .iter()
                .map(|t| {
                    self.table
                        .get(t)
                        .cloned()
                        .ok_or_else(|| anyhow::anyhow!("no vector for {:?}", t))
                })
                .collect()
        }
    }

    async fn demo_index() -> InMemoryIndex {
        let index = InMemoryIndex::new();
        index
            .reset_collection(
                "demo",
                &CollectionSpec {
                    model: "table".to_string(),
                    dims: 2,
                    metric: DistanceMetric::Cosine,
                },
            )
            .await
            .unwrap();
        index
            .add(
                "demo",
                &IndexEntry {
                    id: "demo_a.txt_chunk0".to_string(),
                    embedding: vec![1.0, 0.0],
                    metadata: EntryMetadata {
                        text: "hello world".to_string(),
                        source: "a.txt".to_string(),
                        chunk_index: Some(0),
                        hash: String::new(),
                    },
                },
            )
            .await
            .unwrap();
        index
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let mut ns = vec![neighbor("a", 0.5), neighbor("b", 0.49)];
        let n = select_relevant(&mut ns, &params(0.5, 5));
        assert_eq!(n, 1);
        assert_eq!(ns[0].id, "b");
    }

    #[test]
    fn test_top_n_caps_output() {
        let mut ns: Vec<Neighbor> = (0..20)
            .map(|i| neighbor(&format!("n{:02}", i), i as f32 * 0.01))
            .collect();
        let n = select_relevant(&mut ns, &params(1.0, 5));
        assert_eq!(n, 5);
        let context = build_context(&ns[..n]);
        assert_eq!(context.lines().count(), 5);
        assert!(context.starts_with("<n00>"));
    }

    #[test]
    fn test_threshold_monotonic() {
        let base: Vec<Neighbor> = [0.05, 0.1, 0.2, 0.3, 0.31, 0.6, 0.9, 1.2]
            .iter()
            .enumerate()
            .map(|(i, d)| neighbor(&format!("n{}", i), *d))
            .collect();
        let mut previous = usize::MAX;
        for threshold in [2.0, 1.0, 0.61, 0.6, 0.31, 0.3, 0.1, 0.05, 0.0] {
            let mut ns = base.clone();
            let n = select_relevant(&mut ns, &params(threshold, 100));
            assert!(n <= previous, "threshold {} increased survivors", threshold);
            previous = n;
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn test_unsorted_input_is_ranked_first() {
        let mut ns = vec![
            neighbor("far", 0.4),
            neighbor("near", 0.1),
            neighbor("out", 0.9),
        ];
        let n = select_relevant(&mut ns, &params(0.5, 5));
        assert_eq!(n, 2);
        assert_eq!(build_context(&ns[..n]), "<near>\n<far>");
    }

    #[test]
    fn test_empty_selection_yields_sentinel() {
        assert_eq!(build_context(&[]), NO_RELEVANT_DOCUMENTS);
        assert!(!NO_RELEVANT_DOCUMENTS.is_empty());
    }

    #[tokio::test]
    async fn test_hello_world_within_threshold() {
        let index = demo_index().await;
        let embedder = TableEmbedder::new(&[("greeting?", [0.8, 0.6])]);

        let r = retrieve(&index, &embedder, "demo", "greeting?", &params(0.5, 5))
            .await
            .unwrap();
        assert!((r.ranked[0].distance - 0.2).abs() < 1e-6);
        assert_eq!(r.selected, 1);
        assert_eq!(r.context, "hello world");
    }

    #[tokio::test]
    async fn test_hello_world_below_tight_threshold() {
        let index = demo_index().await;
        let embedder = TableEmbedder::new(&[("greeting?", [0.8, 0.6])]);

        let r = retrieve(&index, &embedder, "demo", "greeting?", &params(0.1, 5))
            .await
            .unwrap();
        assert!(r.is_empty());
        assert_eq!(r.ranked.len(), 1);
        assert_eq!(r.context, NO_RELEVANT_DOCUMENTS);
    }

    #[tokio::test]
    async fn test_absent_or_empty_collection_yields_sentinel() {
        let index = InMemoryIndex::new();
        let embedder = TableEmbedder::new(&[("q", [1.0, 0.0])]);
        let r = retrieve(&index, &embedder, "ghost", "q", &params(0.5, 5))
            .await
            .unwrap();
        assert_eq!(r.context, NO_RELEVANT_DOCUMENTS);

        index
            .reset_collection(
                "empty",
                &CollectionSpec {
                    model: "table".to_string(),
                    dims: 2,
                    metric: DistanceMetric::Cosine,
                },
            )
            .await
            .unwrap();
        let r = retrieve(&index, &embedder, "empty", "q", &params(0.5, 5))
            .await
            .unwrap();
        assert_eq!(r.context, NO_RELEVANT_DOCUMENTS);
    }

    #[tokio::test]
    async fn test_model_mismatch_detected() {
        let index = demo_index().await;
        let mut embedder = TableEmbedder::new(&[("q", [1.0, 0.0])]);
        embedder.model = "other-model".to_string();

        let err = retrieve(&index, &embedder, "demo", "q", &params(0.5, 5))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::EmbeddingModelMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_metric_change_detected() {
        let index = demo_index().await;
        let embedder = TableEmbedder::new(&[("q", [1.0, 0.0])]);
        let squared = RetrievalParams {
            metric: DistanceMetric::SquaredL2,
            ..params(0.5, 5)
        };

        let err = retrieve(&index, &embedder, "demo", "q", &squared)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cosine"), "{}", err);
        assert!(err.to_string().contains("squared_l2"), "{}", err);
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::EmbeddingModelMismatch { .. })
        ));
    }
}
