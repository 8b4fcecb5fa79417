//! Error taxonomy shared by the ingestion and retrieval pipelines.
//!
//! Functions throughout projrag return [`anyhow::Result`]; the variants
//! below are raised with `bail!(RagError::...)` so that callers (the CLI,
//! the query session, tests) can recover the kind with
//! `err.downcast_ref::<RagError>()`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RagError {
    /// A required argument was missing or malformed.
    #[error("usage: {0}")]
    Usage(String),

    /// Configuration rejected at load time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The ingestion input directory does not exist.
    #[error("project directory '{}' not found. Please add text files to ingest.", .0.display())]
    ProjectDirectoryNotFound(PathBuf),

    /// The embedding model could not be loaded or invoked.
    #[error("embedding model '{model}' unavailable: {reason}")]
    ModelUnavailable { model: String, reason: String },

    /// An entry id was added twice to the same collection.
    #[error("duplicate index entry id: {0}")]
    DuplicateId(String),

    /// The named collection has not been created.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// A vector's length differs from the collection's dimensionality.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The configured embedder or distance metric is not the one the
    /// collection was built with.
    #[error(
        "collection was built with embedding model '{indexed}' but '{configured}' is configured; re-run ingest"
    )]
    EmbeddingModelMismatch { indexed: String, configured: String },

    /// The answer endpoint replied with a non-success status.
    #[error("Error: {status} - {body}")]
    Endpoint { status: u16, body: String },

    /// A bounded external call did not complete in time.
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },
}
