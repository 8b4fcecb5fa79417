//! Embedding provider implementations.
//!
//! Concrete [`Embedder`]s selected by `[embedding].provider`:
//! - **[`LocalEmbedder`]**: runs a fastembed model in-process; the model is
//!   loaded once and reused for every call.
//! - **[`OpenAIEmbedder`]**: calls the OpenAI embeddings API.
//! - **[`OllamaEmbedder`]**: calls a local Ollama instance's `/api/embed` endpoint.
//! - **[`HashEmbedder`]**: deterministic offline feature hashing.
//!
//! Every provider L2-normalizes its output and checks it against the
//! configured dimensionality before returning.
//!
//! # Retry Strategy
//!
//! The HTTP providers share one `reqwest::Client` built with
//! `timeout_secs` and retry with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Exhausted retries surface as `ModelUnavailable`, a final request timeout
//! as `Timeout`.

mod hash;

pub use hash::{HashEmbedder, DEFAULT_HASH_DIMS};
pub use projrag_core::embedding::Embedder;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use projrag_core::embedding::{check_dims, l2_normalize};
use projrag_core::RagError;

use crate::config::EmbeddingConfig;

/// Create the [`Embedder`] named by `config.provider`.
///
/// # Supported Providers
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"local"` | [`LocalEmbedder`] (feature `local-embeddings`) |
/// | `"openai"` | [`OpenAIEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"hash"` | [`HashEmbedder`] |
///
/// # Errors
///
/// `ModelUnavailable` if the model cannot be loaded, plus configuration
/// errors for unknown providers or missing settings.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Box::new(OllamaEmbedder::new(config)?)),
        "hash" => Ok(Box::new(HashEmbedder::new(
            config.dims.unwrap_or(DEFAULT_HASH_DIMS),
        ))),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Box::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => bail!(RagError::ModelUnavailable {
            model: config.model.clone(),
            reason: "built without the local-embeddings feature".to_string(),
        }),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Normalize each vector and verify count and dimensionality.
fn finish(
    model: &str,
    expected: usize,
    dims: usize,
    mut vectors: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>> {
    if vectors.len() != expected {
        bail!(RagError::ModelUnavailable {
            model: model.to_string(),
            reason: format!("expected {} embeddings, got {}", expected, vectors.len()),
        });
    }
    for v in vectors.iter_mut() {
        check_dims(v, dims)?;
        l2_normalize(v);
    }
    Ok(vectors)
}

// ============ HTTP transport ============

/// Shared client and retry policy for the HTTP providers.
struct HttpTransport {
    client: reqwest::Client,
    max_retries: u32,
    timeout_secs: u64,
}

impl HttpTransport {
    fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        })
    }

    /// POST `body` to `url`, retrying transient failures.
    async fn post_json(
        &self,
        model: &str,
        url: &str,
        bearer: Option<&str>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let mut last_err: Option<anyhow::Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .post(url)
                .header("Content-Type", "application/json")
                .json(body);
            if let Some(key) = bearer {
                request = request.header("Authorization", format!("Bearer {}", key));
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow!(RagError::ModelUnavailable {
                            model: model.to_string(),
                            reason: format!("{} returned {}: {}", url, status, body_text),
                        }));
                        continue;
                    }

                    // Client error (not 429): don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!(RagError::ModelUnavailable {
                        model: model.to_string(),
                        reason: format!("{} returned {}: {}", url, status, body_text),
                    });
                }
                Err(e) if e.is_timeout() => {
                    last_err = Some(anyhow!(RagError::Timeout {
                        operation: format!("embedding request to {}", url),
                        secs: self.timeout_secs,
                    }));
                    continue;
                }
                Err(e) => {
                    last_err = Some(anyhow!(RagError::ModelUnavailable {
                        model: model.to_string(),
                        reason: format!("connection to {} failed: {}", url, e),
                    }));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Embedding failed after retries")))
    }
}

fn json_vector(value: &serde_json::Value) -> Option<Vec<f32>> {
    value
        .as_array()
        .map(|a| a.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect())
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Calls `POST {url}/v1/embeddings` (default `https://api.openai.com`).
/// Requires the `OPENAI_API_KEY` environment variable and `embedding.dims`.
pub struct OpenAIEmbedder {
    model: String,
    dims: usize,
    url: String,
    api_key: String,
    transport: HttpTransport,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let base = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());

        Ok(Self {
            model: config.model.clone(),
            dims,
            url: format!("{}/v1/embeddings", base.trim_end_matches('/')),
            api_key,
            transport: HttpTransport::new(config)?,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = self
            .transport
            .post_json(&self.model, &self.url, Some(&self.api_key), &body)
            .await?;
        finish(
            &self.model,
            texts.len(),
            self.dims,
            parse_openai_response(&json)?,
        )
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let vec = item
            .get("embedding")
            .and_then(json_vector)
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST {url}/api/embed` (default `http://localhost:11434`).
/// Requires `embedding.dims` and a pulled embedding model
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    url: String,
    transport: HttpTransport,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for Ollama provider"))?;
        let base = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            model: config.model.clone(),
            dims,
            url: format!("{}/api/embed", base.trim_end_matches('/')),
            transport: HttpTransport::new(config)?,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = self
            .transport
            .post_json(&self.model, &self.url, None, &body)
            .await?;
        finish(
            &self.model,
            texts.len(),
            self.dims,
            parse_ollama_response(&json)?,
        )
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|e| {
            json_vector(e)
                .ok_or_else(|| anyhow!("Invalid Ollama response: embedding is not an array"))
        })
        .collect()
}

// ============ Local Provider (fastembed) ============

/// Known local models and their dimensionality.
///
/// `bge-large-en-v1.5` is the default: a large English retrieval model.
pub fn local_model_dims(name: &str) -> Option<usize> {
    match name {
        "all-minilm-l6-v2" => Some(384),
        "bge-small-en-v1.5" => Some(384),
        "bge-base-en-v1.5" => Some(768),
        "bge-large-en-v1.5" => Some(1024),
        "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => Some(768),
        "multilingual-e5-small" => Some(384),
        "multilingual-e5-base" => Some(768),
        "multilingual-e5-large" => Some(1024),
        _ => None,
    }
}

#[cfg(feature = "local-embeddings")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => bail!(RagError::ModelUnavailable {
            model: other.to_string(),
            reason: "unknown local embedding model. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1, nomic-embed-text-v1.5, \
             multilingual-e5-small, multilingual-e5-base, multilingual-e5-large"
                .to_string(),
        }),
    }
}

/// In-process embedding via fastembed.
///
/// The model is downloaded on first use, cached, and loaded exactly once in
/// [`LocalEmbedder::new`]. Inference runs on the blocking pool, bounded by
/// `embedding.timeout_secs`.
#[cfg(feature = "local-embeddings")]
pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    batch_size: usize,
    timeout_secs: u64,
    model: std::sync::Arc<std::sync::Mutex<fastembed::TextEmbedding>>,
}

#[cfg(feature = "local-embeddings")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config.model.clone();
        let fastembed_model = config_to_fastembed_model(&model_name)?;
        let dims = match (config.dims, local_model_dims(&model_name)) {
            (Some(d), _) => d,
            (None, Some(d)) => d,
            (None, None) => bail!("embedding.dims required for local model '{}'", model_name),
        };

        let mut options =
            fastembed::InitOptions::new(fastembed_model).with_show_download_progress(true);
        if let Some(dir) = &config.cache_dir {
            options = options.with_cache_dir(dir.clone());
        }

        let model = fastembed::TextEmbedding::try_new(options).map_err(|e| {
            RagError::ModelUnavailable {
                model: model_name.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            model_name,
            dims,
            batch_size: config.batch_size,
            timeout_secs: config.timeout_secs,
            model: std::sync::Arc::new(std::sync::Mutex::new(model)),
        })
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = std::sync::Arc::clone(&self.model);
        let model_name = self.model_name.clone();
        let batch_size = self.batch_size;
        let texts = texts.to_vec();
        let expected = texts.len();

        let task = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
            let mut model = model
                .lock()
                .map_err(|_| anyhow!("local embedding model lock poisoned"))?;
            model.embed(texts, Some(batch_size)).map_err(|e| {
                anyhow!(RagError::ModelUnavailable {
                    model: model_name,
                    reason: e.to_string(),
                })
            })
        });

        let limit = Duration::from_secs(self.timeout_secs);
        let vectors = match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined??,
            Err(_) => bail!(RagError::Timeout {
                operation: format!("local embedding with '{}'", self.model_name),
                secs: self.timeout_secs,
            }),
        };

        finish(&self.model_name, expected, self.dims, vectors)
    }
}
