//! Deterministic offline embedder based on token feature hashing.
//!
//! Each lowercase alphanumeric token is hashed with SHA-256 into one of
//! `dims` buckets with a ±1 sign; the bucket counts are then L2-normalized.
//! Texts sharing vocabulary land close together, which is enough for smoke
//! runs and tests without downloading a model or calling a service.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use projrag_core::embedding::{l2_normalize, Embedder};

pub const DEFAULT_HASH_DIMS: usize = 256;

pub struct HashEmbedder {
    model: String,
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        let dims = dims.max(1);
        Self {
            model: format!("hash-{}", dims),
            dims,
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        let lower = text.to_lowercase();
        let mut tokens: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        // Token-less text still needs a unit vector.
        if tokens.is_empty() {
            tokens.push(lower.as_str());
        }

        for token in tokens {
            let d = Sha256::digest(token.as_bytes());
            let h = u64::from_le_bytes([d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]]);
            let bucket = (h % self.dims as u64) as usize;
            let sign = if d[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }

        l2_normalize(&mut v);
        if v.iter().all(|x| *x == 0.0) {
            // Opposite signs cancelled out in every bucket.
            v[0] = 1.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
