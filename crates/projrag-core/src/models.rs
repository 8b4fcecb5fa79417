//! Core data models shared by ingestion and retrieval.
//!
//! These types represent the documents read from a project directory, the
//! entries written to a project's vector index, and the ranked neighbors
//! returned for a query.

use serde::Serialize;

/// A text file belonging to a project, read once per ingestion run.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub project: String,
    pub filename: String,
    pub text: String,
}

impl Document {
    pub fn new(
        project: impl Into<String>,
        filename: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            filename: filename.into(),
            text: text.into(),
        }
    }

    /// Id of the whole-document entry: `{project}_{filename}`.
    pub fn id(&self) -> String {
        entry_id(&self.project, &self.filename, None)
    }

    /// Id of chunk `index`: `{project}_{filename}_chunk{index}`.
    pub fn chunk_id(&self, index: usize) -> String {
        entry_id(&self.project, &self.filename, Some(index))
    }
}

/// Build the deterministic index id for a document or one of its chunks.
pub fn entry_id(project: &str, filename: &str, chunk_index: Option<usize>) -> String {
    match chunk_index {
        Some(idx) => format!("{}_{}_chunk{}", project, filename, idx),
        None => format!("{}_{}", project, filename),
    }
}

/// Metadata stored alongside each vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryMetadata {
    /// The indexed text; this is what ends up in the context string.
    pub text: String,
    /// Source filename within the project directory.
    pub source: String,
    /// Chunk sequence number, `None` for whole-document entries.
    pub chunk_index: Option<usize>,
    /// SHA-256 of `text`.
    pub hash: String,
}

/// One write-once row of a project's vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: EntryMetadata,
}

/// A ranked match returned by [`VectorIndex::query`](crate::index::VectorIndex::query).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    pub id: String,
    pub metadata: EntryMetadata,
    /// Smaller is more similar.
    pub distance: f32,
}
