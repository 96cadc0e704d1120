use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::ingest::normalizer::NormalizerRules;
use crate::parsing::rules::ExtractionRules;
use crate::ranking::embedder::DEFAULT_HASHING_DIM;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    Hashing,
    FastEmbed,
}

impl FromStr for EmbeddingBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hashing" => Ok(EmbeddingBackend::Hashing),
            "fastembed" => Ok(EmbeddingBackend::FastEmbed),
            other => bail!("unknown embedding backend '{other}' (expected 'hashing' or 'fastembed')"),
        }
    }
}

/// Runtime configuration loaded from environment variables (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub embedding_backend: EmbeddingBackend,
    pub embedding_dim: usize,
    pub soffice_bin: String,
    pub conversion_timeout: Duration,
    pub extraction_timeout: Duration,
    pub parse_concurrency: usize,
    /// Parent directory for per-batch scratch directories. System temp if unset.
    pub scratch_dir: Option<PathBuf>,
    /// Optional TOML file overriding the typo table and extraction schema.
    pub rules_path: Option<PathBuf>,
    pub rust_log: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embedding_backend: EmbeddingBackend::Hashing,
            embedding_dim: DEFAULT_HASHING_DIM,
            soffice_bin: "soffice".to_string(),
            conversion_timeout: Duration::from_secs(60),
            extraction_timeout: Duration::from_secs(30),
            parse_concurrency: default_concurrency(),
            scratch_dir: None,
            rules_path: None,
            rust_log: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        let defaults = Config::default();

        let embedding_dim: usize = env_or("SCREENER_EMBEDDING_DIM", defaults.embedding_dim)?;
        if embedding_dim == 0 {
            bail!("SCREENER_EMBEDDING_DIM must be greater than zero");
        }

        Ok(Config {
            embedding_backend: env_or("SCREENER_EMBEDDING_BACKEND", defaults.embedding_backend)?,
            embedding_dim,
            soffice_bin: std::env::var("SCREENER_SOFFICE_BIN").unwrap_or(defaults.soffice_bin),
            conversion_timeout: Duration::from_secs(env_or(
                "SCREENER_CONVERSION_TIMEOUT_SECS",
                defaults.conversion_timeout.as_secs(),
            )?),
            extraction_timeout: Duration::from_secs(env_or(
                "SCREENER_EXTRACTION_TIMEOUT_SECS",
                defaults.extraction_timeout.as_secs(),
            )?),
            parse_concurrency: env_or("SCREENER_PARSE_CONCURRENCY", defaults.parse_concurrency)?
                .max(1),
            scratch_dir: std::env::var_os("SCREENER_SCRATCH_DIR").map(PathBuf::from),
            rules_path: std::env::var_os("SCREENER_RULES_PATH").map(PathBuf::from),
            rust_log: std::env::var("RUST_LOG").unwrap_or(defaults.rust_log),
        })
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} has an invalid value '{raw}': {e}")),
        Err(_) => Ok(default),
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Tunable rule tables. Sections left out of the file keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesFile {
    pub normalizer: NormalizerRules,
    pub extraction: ExtractionRules,
}

impl RulesFile {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(RulesFile::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules file '{}'", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse rules file '{}'", path.display()))
    }
}
