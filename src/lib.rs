//! # projrag
//!
//! Per-project retrieval-augmented generation from the command line.
//!
//! Text files under `projects/<name>/` are split into overlapping chunks,
//! embedded, and stored in a SQLite-backed vector index, one collection per
//! project. Queries are embedded with the same model, matched against the
//! collection, filtered by a distance threshold, and the surviving texts are
//! handed to a chat-completion endpoint as context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ projects/*/  │──▶│ Chunk+Embed  │──▶│   SQLite     │
//! │   *.txt      │   │   (ingest)   │   │ collections  │
//! └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                              │
//!                    ┌──────────────┐   ┌──────▼───────┐
//!                    │  Chat LLM    │◀──│  Retrieval   │
//!                    │  (answer)    │   │ thresh+top-N │
//!                    └──────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! projrag ingest demo            # build ./projects/demo into the index
//! projrag context demo "rollout" # print the retrieved context
//! projrag query demo             # interactive question loop
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`project_fs`] | Project directory discovery |
//! | [`embedding`] | Embedding providers |
//! | [`sqlite_index`] | SQLite vector index |
//! | [`ingest`] | Ingestion pipeline |
//! | [`answer`] | Chat-completion answer gateway |
//! | [`session`] | Interactive and one-shot querying |
//! | [`retrieve_cmd`] | Context retrieval command |
//! | [`stats`] | Index statistics |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//!
//! The chunker, embedder contract, index contract and selection algorithm
//! live in the `projrag-core` crate.

pub mod answer;
pub mod config;
pub mod db;
pub mod embedding;
pub mod ingest;
pub mod migrate;
pub mod progress;
pub mod project_fs;
pub mod retrieve_cmd;
pub mod session;
pub mod sqlite_index;
pub mod stats;
