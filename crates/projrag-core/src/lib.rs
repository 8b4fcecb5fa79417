//! # projrag core
//!
//! Shared retrieval logic for projrag: data models, chunking, the embedder
//! and vector index abstractions, and the relevance-selection algorithm that
//! turns a query into a bounded context string.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or HTTP
//! dependencies. Concrete embedders and the persistent index live in the
//! `projrag` application crate.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod retrieve;

pub use error::RagError;
