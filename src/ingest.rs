//! Ingestion pipeline orchestration.
//!
//! Coordinates the full build of one project's collection:
//! discovery → reset → chunking → embedding → storage.
//!
//! There is no incremental mode. Every run drops and recreates the
//! collection exactly once before the first file is processed, so the
//! stored vectors always come from the embedding model currently
//! configured. A run that fails partway leaves a partial collection;
//! re-run ingestion to rebuild it.

use anyhow::{bail, Result};
use std::path::Path;

use projrag_core::chunk::{chunk_text, content_hash, ChunkParams};
use projrag_core::embedding::{DistanceMetric, Embedder};
use projrag_core::index::{CollectionSpec, VectorIndex};
use projrag_core::models::{Document, EntryMetadata, IndexEntry};
use projrag_core::RagError;

use crate::config::{ChunkingMode, Config};
use crate::embedding;
use crate::progress::{IngestProgressEvent, IngestProgressReporter, ProgressMode};
use crate::project_fs::{check_project_name, discover_documents};
use crate::sqlite_index::SqliteIndex;

/// Knobs for one ingestion run, resolved from [`Config`].
#[derive(Debug, Clone, Copy)]
pub struct IngestSettings {
    pub mode: ChunkingMode,
    pub chunk_params: ChunkParams,
    pub batch_size: usize,
    pub metric: DistanceMetric,
}

impl IngestSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            mode: config.chunking.mode,
            chunk_params: config.chunking.params()?,
            batch_size: config.embedding.batch_size.max(1),
            metric: config.retrieval.metric,
        })
    }
}

/// Counts reported after a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub collection: String,
    pub files: usize,
    /// Chunks produced by the chunker, before embedding.
    pub chunks: usize,
    pub entries: usize,
    pub model: String,
    pub dims: usize,
}

/// One indexable unit: a chunk, or a whole document.
struct Unit {
    id: String,
    chunk_index: Option<usize>,
    text: String,
}

fn document_units(doc: &Document, settings: &IngestSettings) -> Vec<Unit> {
    match settings.mode {
        ChunkingMode::Chunked => chunk_text(&doc.text, &settings.chunk_params)
            .into_iter()
            .map(|c| Unit {
                id: doc.chunk_id(c.index),
                chunk_index: Some(c.index),
                text: c.text.to_string(),
            })
            .collect(),
        // A single window over the whole text, keyed without a chunk suffix.
        // Empty files yield no chunk, so unlike a plain per-file loader they
        // get no `{project}_{filename}` entry.
        ChunkingMode::Whole => {
            let params = ChunkParams::whole(doc.text.chars().count());
            chunk_text(&doc.text, &params)
                .into_iter()
                .map(|c| Unit {
                    id: doc.id(),
                    chunk_index: None,
                    text: c.text.to_string(),
                })
                .collect()
        }
    }
}

/// Rebuild `project`'s collection from the `.txt` files in `dir`.
///
/// The directory is read before anything is reset, so a missing directory
/// fails with [`RagError::ProjectDirectoryNotFound`] and leaves the index as
/// it was. Any later error aborts the run.
pub async fn ingest_project(
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    project: &str,
    dir: &Path,
    settings: &IngestSettings,
    reporter: &dyn IngestProgressReporter,
) -> Result<IngestSummary> {
    let docs = discover_documents(project, dir)?;

    reporter.report(IngestProgressEvent::Resetting {
        collection: project.to_string(),
    });
    let spec = CollectionSpec {
        model: embedder.model_name().to_string(),
        dims: embedder.dims(),
        metric: settings.metric,
    };
    index.reset_collection(project, &spec).await?;

    let total = docs.len() as u64;
    let mut chunks = 0usize;
    let mut entries = 0usize;

    for (n, doc) in docs.iter().enumerate() {
        let units = document_units(doc, settings);
        chunks += units.len();

        for batch in units.chunks(settings.batch_size) {
            let texts: Vec<String> = batch.iter().map(|u| u.text.clone()).collect();
            let vectors = embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                bail!(RagError::ModelUnavailable {
                    model: embedder.model_name().to_string(),
                    reason: format!(
                        "embedder returned {} vectors for {} texts",
                        vectors.len(),
                        batch.len()
                    ),
                });
            }

            for (unit, embedding) in batch.iter().zip(vectors) {
                let entry = IndexEntry {
                    id: unit.id.clone(),
                    embedding,
                    metadata: EntryMetadata {
                        text: unit.text.clone(),
                        source: doc.filename.clone(),
                        chunk_index: unit.chunk_index,
                        hash: content_hash(&unit.text),
                    },
                };
                index.add(project, &entry).await?;
                entries += 1;
            }
        }

        reporter.report(IngestProgressEvent::File {
            collection: project.to_string(),
            filename: doc.filename.clone(),
            n: n as u64 + 1,
            total,
            chunks: units.len() as u64,
        });
    }

    Ok(IngestSummary {
        collection: project.to_string(),
        files: docs.len(),
        chunks,
        entries,
        model: spec.model,
        dims: spec.dims,
    })
}

/// `projrag ingest <project>`: rebuild the project's collection on disk.
///
/// With `dry_run`, only counts files and chunks; the index is not opened
/// and no model is loaded.
pub async fn run_ingest(
    config: &Config,
    project: &str,
    dry_run: bool,
    progress: ProgressMode,
) -> Result<()> {
    check_project_name(project)?;
    let dir = config.projects.dir(project);
    if !dir.is_dir() {
        bail!(RagError::ProjectDirectoryNotFound(dir));
    }

    let settings = IngestSettings::from_config(config)?;

    if dry_run {
        let docs = discover_documents(project, &dir)?;
        let chunks: usize = docs
            .iter()
            .map(|d| document_units(d, &settings).len())
            .sum();
        println!("ingest {} (dry-run)", project);
        println!("  directory: {}", dir.display());
        println!("  files found: {}", docs.len());
        println!("  estimated entries: {}", chunks);
        return Ok(());
    }

    let embedder = embedding::create_embedder(&config.embedding)?;
    let index = SqliteIndex::open(&config.index.path).await?;
    let reporter = progress.reporter();

    let result = ingest_project(
        &index,
        embedder.as_ref(),
        project,
        &dir,
        &settings,
        reporter.as_ref(),
    )
    .await;
    index.close().await;
    let summary = result?;

    println!("ingest {}", project);
    println!("  files: {}", summary.files);
    println!("  chunks: {}", summary.chunks);
    println!("  entries written: {}", summary.entries);
    println!("  collection: {}", summary.collection);
    println!("  model: {} ({} dims)", summary.model, summary.dims);
    println!("ok");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::progress::NoProgress;
    use async_trait::async_trait;
    use projrag_core::index::memory::InMemoryIndex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn settings(mode: ChunkingMode, size: usize, overlap: usize) -> IngestSettings {
        IngestSettings {
            mode,
            chunk_params: ChunkParams::new(size, overlap).unwrap(),
            batch_size: 32,
            metric: DistanceMetric::Cosine,
        }
    }

    fn project_dir(files: &[(&str, &str)]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for (name, text) in files {
            std::fs::write(tmp.path().join(name), text).unwrap();
        }
        tmp
    }

    async fn ids(index: &InMemoryIndex, collection: &str) -> Vec<String> {
        let k = index.count(collection).await.unwrap();
        let anchor = HashEmbedder::new(64).embed("anchor").await.unwrap();
        let mut ids: Vec<String> = index
            .query(collection, &anchor, k)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn test_single_small_file_is_one_chunk() {
        let dir = project_dir(&[("a.txt", "hello world")]);
        let index = InMemoryIndex::new();
        let embedder = HashEmbedder::new(64);

        let summary = ingest_project(
            &index,
            &embedder,
            "demo",
            dir.path(),
            &settings(ChunkingMode::Chunked, 500, 100),
            &NoProgress,
        )
        .await
        .unwrap();

        assert_eq!(summary.files, 1);
        assert_eq!(summary.entries, 1);
        assert_eq!(summary.model, "hash-64");
        assert_eq!(ids(&index, "demo").await, vec!["demo_a.txt_chunk0"]);

        let info = index.collection("demo").await.unwrap().unwrap();
        assert_eq!(info.model, "hash-64");
        assert_eq!(info.dims, 64);
    }

    #[tokio::test]
    async fn test_chunk_ids_and_counts() {
        let long = "abcdefghij".repeat(30); // 300 chars
        let dir = project_dir(&[("long.txt", &long), ("short.txt", "tiny")]);
        let index = InMemoryIndex::new();

        let summary = ingest_project(
            &index,
            &HashEmbedder::new(64),
            "p",
            dir.path(),
            &settings(ChunkingMode::Chunked, 100, 20),
            &NoProgress,
        )
        .await
        .unwrap();

        // ceil((300 - 20) / 80) = 4 chunks, plus one for the short file
        assert_eq!(summary.chunks, 5);
        assert_eq!(summary.entries, 5);
        assert_eq!(
            ids(&index, "p").await,
            vec![
                "p_long.txt_chunk0",
                "p_long.txt_chunk1",
                "p_long.txt_chunk2",
                "p_long.txt_chunk3",
                "p_short.txt_chunk0",
            ]
        );
    }

    #[tokio::test]
    async fn test_whole_document_mode_ids() {
        let dir = project_dir(&[("a.txt", "alpha"), ("b.txt", "beta"), ("empty.txt", "")]);
        let index = InMemoryIndex::new();

        let summary = ingest_project(
            &index,
            &HashEmbedder::new(64),
            "demo",
            dir.path(),
            &settings(ChunkingMode::Whole, 2, 1),
            &NoProgress,
        )
        .await
        .unwrap();

        assert_eq!(summary.files, 3);
        assert_eq!(summary.chunks, 2);
        assert_eq!(summary.entries, 2);
        assert_eq!(ids(&index, "demo").await, vec!["demo_a.txt", "demo_b.txt"]);
    }

    #[test]
    fn test_whole_mode_keeps_long_multibyte_text_in_one_unit() {
        let text = "héllo wörld ".repeat(100);
        let doc = Document::new("demo", "long.txt", text.clone());

        let units = document_units(&doc, &settings(ChunkingMode::Whole, 10, 2));
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].id, "demo_long.txt");
        assert_eq!(units[0].chunk_index, None);
        assert_eq!(units[0].text, text);

        let empty = Document::new("demo", "empty.txt", "");
        let units = document_units(&empty, &settings(ChunkingMode::Whole, 10, 2));
        assert!(units.is_empty());
    }

    #[tokio::test]
    async fn test_non_txt_files_ignored() {
        let dir = project_dir(&[("a.txt", "kept"), ("b.md", "skipped"), ("c.json", "{}")]);
        let index = InMemoryIndex::new();

        let summary = ingest_project(
            &index,
            &HashEmbedder::new(64),
            "demo",
            dir.path(),
            &settings(ChunkingMode::Chunked, 500, 100),
            &NoProgress,
        )
        .await
        .unwrap();

        assert_eq!(summary.files, 1);
        assert_eq!(ids(&index, "demo").await, vec!["demo_a.txt_chunk0"]);
    }

    #[tokio::test]
    async fn test_missing_directory_leaves_index_untouched() {
        let dir = project_dir(&[("a.txt", "hello world")]);
        let index = InMemoryIndex::new();
        let embedder = HashEmbedder::new(64);
        let s = settings(ChunkingMode::Chunked, 500, 100);

        ingest_project(&index, &embedder, "demo", dir.path(), &s, &NoProgress)
            .await
            .unwrap();

        let missing = dir.path().join("does-not-exist");
        let err = ingest_project(&index, &embedder, "demo", &missing, &s, &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::ProjectDirectoryNotFound(_))
        ));
        assert_eq!(index.count("demo").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reingest_replaces_collection() {
        let dir = project_dir(&[("a.txt", "first"), ("b.txt", "second")]);
        let index = InMemoryIndex::new();
        let embedder = HashEmbedder::new(64);
        let s = settings(ChunkingMode::Chunked, 500, 100);

        ingest_project(&index, &embedder, "demo", dir.path(), &s, &NoProgress)
            .await
            .unwrap();
        assert_eq!(index.count("demo").await.unwrap(), 2);

        std::fs::remove_file(dir.path().join("b.txt")).unwrap();
        ingest_project(&index, &embedder, "demo", dir.path(), &s, &NoProgress)
            .await
            .unwrap();
        assert_eq!(ids(&index, "demo").await, vec!["demo_a.txt_chunk0"]);
    }

    #[tokio::test]
    async fn test_deterministic_across_runs() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(20);
        let dir = project_dir(&[("fox.txt", &text)]);
        let s = settings(ChunkingMode::Chunked, 120, 30);
        let embedder = HashEmbedder::new(64);
        let query_vec = embedder.embed("lazy dog").await.unwrap();

        let mut runs = Vec::new();
        for _ in 0..2 {
            let index = InMemoryIndex::new();
            ingest_project(&index, &embedder, "demo", dir.path(), &s, &NoProgress)
                .await
                .unwrap();
            let k = index.count("demo").await.unwrap();
            let ranked: Vec<(String, u32)> = index
                .query("demo", &query_vec, k)
                .await
                .unwrap()
                .into_iter()
                .map(|n| (n.id, n.distance.to_bits()))
                .collect();
            runs.push(ranked);
        }
        assert_eq!(runs[0], runs[1]);
    }

    /// Records the size of every batch it is asked to embed.
    struct BatchRecorder {
        inner: HashEmbedder,
        calls: AtomicUsize,
        largest: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for BatchRecorder {
        fn model_name(&self) -> &str {
            self.inner.model_name()
        }
        fn dims(&self) -> usize {
            self.inner.dims()
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.largest.fetch_max(texts.len(), Ordering::SeqCst);
            self.inner.embed_batch(texts).await
        }
    }

    #[tokio::test]
    async fn test_embeds_in_bounded_batches() {
        let dir = project_dir(&[("a.txt", &"x".repeat(1000))]);
        let index = InMemoryIndex::new();
        let embedder = BatchRecorder {
            inner: HashEmbedder::new(16),
            calls: AtomicUsize::new(0),
            largest: AtomicUsize::new(0),
        };
        let mut s = settings(ChunkingMode::Chunked, 100, 0);
        s.batch_size = 3;

        let summary = ingest_project(&index, &embedder, "demo", dir.path(), &s, &NoProgress)
            .await
            .unwrap();

        assert_eq!(summary.entries, 10);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 4);
        assert_eq!(embedder.largest.load(Ordering::SeqCst), 3);
    }
}
