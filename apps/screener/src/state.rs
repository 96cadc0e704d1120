use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::{Config, EmbeddingBackend, RulesFile};
use crate::ingest::convert::{DocumentConverter, SofficeConverter};
use crate::ingest::extractor::{PdfTextExtractor, TextExtractor};
use crate::parsing::parser::CandidateParser;
use crate::ranking::embedder::{Embedder, HashingEmbedder};

/// Process-wide dependencies shared by every batch. All members are
/// read-only after construction.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub parser: Arc<CandidateParser>,
    pub extractor: Arc<dyn TextExtractor>,
    pub converter: Arc<dyn DocumentConverter>,
    /// Loaded once at startup; never reloaded while the process runs.
    pub embedder: Arc<dyn Embedder>,
}

impl AppState {
    /// Compiles the rule tables and loads the configured embedding backend.
    pub fn build(config: Config) -> Result<Self> {
        let rules = RulesFile::load(config.rules_path.as_deref())?;
        let parser = CandidateParser::new(&rules.normalizer, &rules.extraction)
            .context("Invalid pattern in screening rules")?;
        info!(
            typos = rules.normalizer.typos.len(),
            fields = rules.extraction.fields.len(),
            "Screening rules compiled"
        );

        let embedder = build_embedder(&config)?;
        info!("Embedding backend ready (model: {})", embedder.model_name());

        Ok(AppState {
            parser: Arc::new(parser),
            extractor: Arc::new(PdfTextExtractor),
            converter: Arc::new(SofficeConverter::new(
                config.soffice_bin.clone(),
                config.conversion_timeout,
            )),
            embedder,
            config,
        })
    }
}

fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    match config.embedding_backend {
        EmbeddingBackend::Hashing => Ok(Arc::new(HashingEmbedder::new(config.embedding_dim))),
        #[cfg(feature = "fastembed")]
        EmbeddingBackend::FastEmbed => {
            let model = crate::ranking::embedder::FastEmbedder::load()?;
            Ok(Arc::new(model))
        }
        #[cfg(not(feature = "fastembed"))]
        EmbeddingBackend::FastEmbed => anyhow::bail!(
            "SCREENER_EMBEDDING_BACKEND=fastembed requires building with `--features fastembed`"
        ),
    }
}
