//! Embedding backends behind one injected trait.
//!
//! A single `Arc<dyn Embedder>` is built in `main` and handed to every batch
//! through `AppState`. Implementations hold no per-request state.
//!
//! - `HashingEmbedder` (default): signed feature hashing of word unigrams and
//!   bigrams. Offline, deterministic, no model files.
//! - `FastEmbedder` (feature `fastembed`): multilingual MiniLM sentence model.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding backend failed: {0}")]
    Backend(String),

    #[error("embedding backend returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Human-readable model identifier, logged once per batch.
    fn model_name(&self) -> &str;

    /// Embeds every text in one call. Output order matches input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        match vectors.len() {
            1 => Ok(vectors.remove(0)),
            got => Err(EmbeddingError::CountMismatch { expected: 1, got }),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HashingEmbedder
// ────────────────────────────────────────────────────────────────────────────

pub const DEFAULT_HASHING_DIM: usize = 384;

const UNIGRAM_WEIGHT: f32 = 1.0;
const BIGRAM_WEIGHT: f32 = 0.5;

/// Bag-of-words vectors via the hashing trick, L2-normalised.
///
/// Tokens are lower-cased runs of alphanumerics plus `+` and `#` (so `C++`
/// and `C#` survive). Each token and each adjacent token pair is hashed to a
/// bucket; one hash bit picks the sign so collisions tend to cancel.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dim];
        let tokens = tokenize(text);

        for token in &tokens {
            self.accumulate(&mut vector, token.as_bytes(), UNIGRAM_WEIGHT);
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            self.accumulate(&mut vector, bigram.as_bytes(), BIGRAM_WEIGHT);
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let hash = fnv1a(feature);
        let bucket = (hash % self.dim as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIM)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        "feature-hashing"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// 64-bit FNV-1a. Stable across processes and platforms, unlike `DefaultHasher`.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ *b as u64).wrapping_mul(PRIME))
}

// ────────────────────────────────────────────────────────────────────────────
// FastEmbedder — ONNX sentence model
// ────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "fastembed")]
pub use onnx::FastEmbedder;

#[cfg(feature = "fastembed")]
mod onnx {
    use std::sync::Arc;

    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

    use super::{Embedder, EmbeddingError};

    const MODEL_NAME: &str = "paraphrase-multilingual-MiniLM-L12-v2";

    /// Loaded once at startup; inference runs on the blocking pool.
    #[derive(Clone)]
    pub struct FastEmbedder {
        model: Arc<TextEmbedding>,
    }

    impl FastEmbedder {
        pub fn load() -> Result<Self, EmbeddingError> {
            let options = InitOptions::new(EmbeddingModel::ParaphraseMLMiniLML12V2)
                .with_show_download_progress(false);
            let model = TextEmbedding::try_new(options)
                .map_err(|e| EmbeddingError::Backend(format!("failed to load {MODEL_NAME}: {e}")))?;
            Ok(Self {
                model: Arc::new(model),
            })
        }
    }

    #[async_trait]
    impl Embedder for FastEmbedder {
        fn model_name(&self) -> &str {
            MODEL_NAME
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            let model = Arc::clone(&self.model);
            let texts = texts.to_vec();
            tokio::task::spawn_blocking(move || model.embed(texts, None))
                .await
                .map_err(|e| EmbeddingError::Backend(format!("embedding task failed: {e}")))?
                .map_err(|e| EmbeddingError::Backend(e.to_string()))
        }
    }
}
