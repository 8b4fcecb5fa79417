//! TOML configuration.
//!
//! Every component receives its settings from an explicit [`Config`] built
//! once at startup; nothing reads process-wide mutable state. A missing
//! config file at the default location falls back to [`Config::default`].

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use projrag_core::chunk::ChunkParams;
use projrag_core::embedding::DistanceMetric;
use projrag_core::retrieve::RetrievalParams;

/// Environment variable consulted when `[llm].api_key` is empty.
pub const API_KEY_ENV: &str = "PROJRAG_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub projects: ProjectsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./chroma_db/index.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProjectsConfig {
    #[serde(default = "default_projects_root")]
    pub root: PathBuf,
}

impl Default for ProjectsConfig {
    fn default() -> Self {
        Self {
            root: default_projects_root(),
        }
    }
}

fn default_projects_root() -> PathBuf {
    PathBuf::from("./projects")
}

impl ProjectsConfig {
    /// Ingestion input directory for `project`.
    pub fn dir(&self, project: &str) -> PathBuf {
        self.root.join(project)
    }
}

/// Whether files are split into overlapping windows or indexed whole.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingMode {
    #[default]
    Chunked,
    Whole,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default)]
    pub mode: ChunkingMode,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            mode: ChunkingMode::Chunked,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    100
}

impl ChunkingConfig {
    pub fn params(&self) -> Result<ChunkParams> {
        ChunkParams::new(self.chunk_size, self.chunk_overlap)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for HTTP providers.
    #[serde(default)]
    pub url: Option<String>,
    /// Model download cache for the local provider.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embed_timeout_secs(),
            url: None,
            cache_dir: None,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_model() -> String {
    "bge-large-en-v1.5".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_max_retries() -> u32 {
    3
}
fn default_embed_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f32,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default)]
    pub metric: DistanceMetric,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            relevance_threshold: default_relevance_threshold(),
            top_n: default_top_n(),
            metric: DistanceMetric::Cosine,
        }
    }
}

fn default_relevance_threshold() -> f32 {
    0.5
}
fn default_top_n() -> usize {
    5
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            relevance_threshold: self.relevance_threshold,
            top_n: self.top_n,
            metric: self.metric,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint_url: default_endpoint_url(),
            model: default_llm_model(),
            api_key: String::new(),
            timeout_secs: default_llm_timeout_secs(),
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_endpoint_url() -> String {
    "http://localhost:5000/v1/chat/completions".to_string()
}
fn default_llm_model() -> String {
    "your-local-model-name".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    120
}
fn default_system_prompt() -> String {
    "You are an AI assistant using retrieved documents to answer questions.".to_string()
}

impl LlmConfig {
    /// The configured key, else [`API_KEY_ENV`], else `None`.
    pub fn resolved_api_key(&self) -> Option<String> {
        if !self.api_key.is_empty() {
            return Some(self.api_key.clone());
        }
        std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())
    }
}

impl Config {
    /// Reject settings that would fail (or never terminate) later.
    pub fn validate(&self) -> Result<()> {
        // Validate chunking
        self.chunking.params()?;

        // Validate retrieval
        if self.retrieval.top_n < 1 {
            bail!("retrieval.top_n must be >= 1");
        }
        if !self.retrieval.relevance_threshold.is_finite() {
            bail!("retrieval.relevance_threshold must be a finite number");
        }

        // Validate embedding
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }
        if self.embedding.dims == Some(0) {
            bail!("embedding.dims must be > 0 when set");
        }
        if self.embedding.model.trim().is_empty() {
            bail!("embedding.model must not be empty");
        }
        match self.embedding.provider.as_str() {
            "local" | "openai" | "ollama" | "hash" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be local, openai, ollama, or hash.",
                other
            ),
        }

        if self.llm.endpoint_url.trim().is_empty() {
            bail!("llm.endpoint_url must not be empty");
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

/// Load `path` if it exists; otherwise use the built-in defaults.
///
/// Only a missing file falls back. A file that exists but fails to parse or
/// validate is an error.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }
}
