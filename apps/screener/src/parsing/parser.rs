use std::path::Path;

use crate::ingest::extractor::{extract_raw_document, TextExtractor};
use crate::ingest::normalizer::{NormalizerRules, TextNormalizer};
use crate::models::candidate::{CandidateRecord, RawDocument};
use crate::parsing::fields::FieldExtractor;
use crate::parsing::rules::ExtractionRules;

/// Normalizer plus field extractor, compiled once at startup and shared
/// read-only across every document of every batch.
#[derive(Debug, Clone)]
pub struct CandidateParser {
    normalizer: TextNormalizer,
    fields: FieldExtractor,
}

impl CandidateParser {
    pub fn new(
        normalizer: &NormalizerRules,
        extraction: &ExtractionRules,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            normalizer: normalizer.compile()?,
            fields: FieldExtractor::new(extraction)?,
        })
    }

    /// Normalizes and extracts fields from already-extracted text. Failed
    /// extractions pass through as failed records.
    pub fn parse_raw(&self, raw: RawDocument) -> CandidateRecord {
        CandidateRecord::from_raw(raw, |text| {
            let normalized = self.normalizer.normalize(text);
            self.fields.extract(&normalized)
        })
    }

    /// Full per-document pipeline: extract → normalize → fields. Never fails;
    /// problems are recorded on the returned record.
    pub fn parse_file(
        &self,
        extractor: &dyn TextExtractor,
        path: &Path,
        file_name: &str,
    ) -> CandidateRecord {
        self.parse_raw(extract_raw_document(extractor, path, file_name))
    }
}
