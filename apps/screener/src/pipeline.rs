//! One screening request end to end: archive → scratch → parse → rank.
//!
//! The scratch directory is a `TempDir` owned by this function's future.
//! Returning (either way) or being dropped mid-flight removes it.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::errors::ScreenError;
use crate::ingest::archive::{prepare_documents, unpack_archive, EligibleDocument};
use crate::models::candidate::{CandidateRecord, ParsingStatus, EXTRACTION_ERROR_MARKER};
use crate::models::ranking::{RankedResult, SkippedDocument};
use crate::ranking::ranker::rank_candidates;
use crate::state::AppState;

#[derive(Debug)]
pub struct ScreeningOutcome {
    pub batch_id: Uuid,
    /// Ranked candidates, best first.
    pub ranked: Vec<RankedResult>,
    /// Documents that were eligible but did not reach the ranking.
    pub skipped: Vec<SkippedDocument>,
}

/// Screens every résumé in `archive` against `job_description`.
pub async fn screen_archive(
    state: &AppState,
    archive: &Path,
    job_description: &str,
) -> Result<ScreeningOutcome, ScreenError> {
    if job_description.trim().is_empty() {
        return Err(ScreenError::Validation(
            "job description must not be empty".to_string(),
        ));
    }

    let batch_id = Uuid::new_v4();
    let span = info_span!("screening", %batch_id);

    async move {
        let started = Instant::now();
        let scratch = create_scratch(state)?;
        info!(archive = %archive.display(), "Screening batch started");

        let result = run_batch(state, archive, job_description, scratch.path()).await;

        // Explicit close so a failed removal is logged; drop covers cancellation.
        if let Err(e) = scratch.close() {
            warn!(error = %e, "Failed to remove scratch directory");
        }

        let (ranked, skipped) = result?;
        info!(
            ranked = ranked.len(),
            skipped = skipped.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Screening batch complete"
        );
        Ok::<_, ScreenError>(ScreeningOutcome {
            batch_id,
            ranked,
            skipped,
        })
    }
    .instrument(span)
    .await
}

fn create_scratch(state: &AppState) -> Result<TempDir, ScreenError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("screener-");
    let scratch = match &state.config.scratch_dir {
        Some(parent) => builder.tempdir_in(parent),
        None => builder.tempdir(),
    };
    scratch.map_err(|e| ScreenError::Internal(anyhow!("failed to create scratch directory: {e}")))
}

async fn run_batch(
    state: &AppState,
    archive: &Path,
    job_description: &str,
    scratch: &Path,
) -> Result<(Vec<RankedResult>, Vec<SkippedDocument>), ScreenError> {
    let (archive_path, dest) = (archive.to_path_buf(), scratch.to_path_buf());
    let members = tokio::task::spawn_blocking(move || unpack_archive(&archive_path, &dest))
        .await
        .map_err(|e| ScreenError::Internal(anyhow!("archive task failed: {e}")))??;

    let (eligible, mut skipped) = prepare_documents(members, state.converter.as_ref()).await;
    if eligible.is_empty() {
        return Err(ScreenError::EmptyBatch(format!(
            "archive contains no PDF or convertible DOCX documents ({} dropped)",
            skipped.len()
        )));
    }

    let total = eligible.len();
    let records = parse_documents(state, eligible).await?;

    let mut parsed = Vec::with_capacity(records.len());
    for record in records {
        match record.parsing_status {
            ParsingStatus::Success => parsed.push(record),
            ParsingStatus::ExtractionError(reason) => {
                warn!(file = %record.file_name, %reason, "Excluding document from ranking");
                skipped.push(SkippedDocument {
                    file_name: record.file_name,
                    reason,
                });
            }
        }
    }

    if parsed.is_empty() {
        return Err(ScreenError::EmptyBatch(format!(
            "text extraction failed for all {total} documents"
        )));
    }
    info!(parsed = parsed.len(), total, "Documents parsed");

    let ranked = rank_candidates(parsed, job_description, state.embedder.as_ref()).await?;
    Ok((ranked, skipped))
}

/// Parses every document on the blocking pool, at most
/// `parse_concurrency` at a time, each bounded by `extraction_timeout`.
/// Output is in input order regardless of completion order.
///
/// A timed-out document is recorded as failed straight away, but its
/// extractor call cannot be interrupted and keeps running on the blocking
/// pool. The permit travels with that call, so it still counts against
/// `parse_concurrency` until it returns.
async fn parse_documents(
    state: &AppState,
    documents: Vec<EligibleDocument>,
) -> Result<Vec<CandidateRecord>, ScreenError> {
    let limit = Arc::new(Semaphore::new(state.config.parse_concurrency.max(1)));
    let timeout = state.config.extraction_timeout;
    let total = documents.len();

    // Dropping the set aborts whatever is still queued.
    let mut tasks = JoinSet::new();
    for (index, document) in documents.into_iter().enumerate() {
        let limit = Arc::clone(&limit);
        let parser = Arc::clone(&state.parser);
        let extractor = Arc::clone(&state.extractor);

        tasks.spawn(async move {
            let permit = limit.acquire_owned().await.ok();
            let file_name = document.file_name.clone();
            let work = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                parser.parse_file(extractor.as_ref(), &document.path, &document.file_name)
            });

            let record = match tokio::time::timeout(timeout, work).await {
                Ok(Ok(record)) => record,
                Ok(Err(e)) => CandidateRecord::extraction_failed(
                    file_name,
                    format!("{EXTRACTION_ERROR_MARKER}: parser task failed: {e}"),
                ),
                Err(_) => CandidateRecord::extraction_failed(
                    file_name,
                    format!("{EXTRACTION_ERROR_MARKER}: timed out after {timeout:?}"),
                ),
            };
            (index, record)
        });
    }

    let mut slots: Vec<Option<CandidateRecord>> = vec![None; total];
    while let Some(joined) = tasks.join_next().await {
        let (index, record) =
            joined.map_err(|e| ScreenError::Internal(anyhow!("parse task failed: {e}")))?;
        slots[index] = Some(record);
    }

    Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use zip::write::SimpleFileOptions;

    use super::*;
    use crate::config::Config;
    use crate::ingest::convert::{converted_path, ConversionError, DocumentConverter};
    use crate::ingest::extractor::{one_page_pdf, ExtractionError, PdfTextExtractor, TextExtractor};
    use crate::ingest::normalizer::NormalizerRules;
    use crate::parsing::parser::CandidateParser;
    use crate::parsing::rules::ExtractionRules;
    use crate::ranking::embedder::{Embedder, EmbeddingError, HashingEmbedder};

    const JANE: &str = "Name: Jane Doe Age: 29 Gender: Female Job roles: Software Engineer \
                        Level: Senior Degree: Bachelor of Science \
                        Skills: Python SQL Docker Certification: AWS";
    const OMAR: &str = "Name: Omar Reyes Age: 41 Gender: Male Job roles: Product Designer \
                        Level: Lead Degree: Master of Fine Arts \
                        Skills: Figma Illustrator Certification: UX Certified";

    /// Reads the "PDF" as UTF-8 text; files starting with `%CORRUPT` fail.
    struct PlainTextExtractor;

    impl TextExtractor for PlainTextExtractor {
        fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
            let text = fs::read_to_string(path).map_err(|source| ExtractionError::Io {
                path: path.display().to_string(),
                source,
            })?;
            if text.starts_with("%CORRUPT") {
                return Err(ExtractionError::Pdf("invalid file header".into()));
            }
            Ok(text)
        }
    }

    struct SlowExtractor;

    impl TextExtractor for SlowExtractor {
        fn extract(&self, _path: &Path) -> Result<String, ExtractionError> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(JANE.to_string())
        }
    }

    /// Sleeps past the timeout and records how many calls overlap.
    #[derive(Default)]
    struct CountingExtractor {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl TextExtractor for CountingExtractor {
        fn extract(&self, _path: &Path) -> Result<String, ExtractionError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(100));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(JANE.to_string())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Backend("model not loaded".into()))
        }
    }

    struct CopyConverter;

    #[async_trait]
    impl DocumentConverter for CopyConverter {
        async fn to_pdf(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, ConversionError> {
            let out = converted_path(input, out_dir);
            fs::copy(input, &out).map_err(|_| ConversionError::MissingOutput(out.display().to_string()))?;
            Ok(out)
        }
    }

    struct BrokenConverter;

    #[async_trait]
    impl DocumentConverter for BrokenConverter {
        async fn to_pdf(&self, _input: &Path, _out_dir: &Path) -> Result<PathBuf, ConversionError> {
            Err(ConversionError::TimedOut(Duration::from_secs(60)))
        }
    }

    fn state_with(
        scratch_root: &Path,
        extractor: Arc<dyn TextExtractor>,
        converter: Arc<dyn DocumentConverter>,
    ) -> AppState {
        let parser =
            CandidateParser::new(&NormalizerRules::default(), &ExtractionRules::default()).unwrap();
        AppState {
            config: Config {
                scratch_dir: Some(scratch_root.to_path_buf()),
                parse_concurrency: 2,
                ..Config::default()
            },
            parser: Arc::new(parser),
            extractor,
            converter,
            embedder: Arc::new(HashingEmbedder::default()),
        }
    }

    fn state(scratch_root: &Path) -> AppState {
        state_with(scratch_root, Arc::new(PlainTextExtractor), Arc::new(CopyConverter))
    }

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let entries: Vec<(&str, &[u8])> = entries
            .iter()
            .map(|(name, body)| (*name, body.as_bytes()))
            .collect();
        write_zip_bytes(path, &entries);
    }

    fn write_zip_bytes(path: &Path, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, body) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body).unwrap();
        }
        zip.finish().unwrap();
    }

    fn is_empty_dir(path: &Path) -> bool {
        fs::read_dir(path).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_single_resume_is_ranked_first() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("batch.zip");
        write_zip(&archive, &[("jane.pdf", JANE)]);

        let scratch_root = tempfile::tempdir().unwrap();
        let outcome = screen_archive(&state(scratch_root.path()), &archive, "Python developer")
            .await
            .unwrap();

        assert_eq!(outcome.ranked.len(), 1);
        let top = &outcome.ranked[0];
        assert_eq!(top.rank, 1);
        assert_eq!(top.name, "Jane Doe");
        assert_eq!(top.skill_1, "Python");
        assert!(top.resume.starts_with("Proficient in python, sql, docker"));
        assert!(outcome.skipped.is_empty());
        assert!(is_empty_dir(scratch_root.path()));
    }

    #[tokio::test]
    async fn test_archive_without_documents_is_empty_batch() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("batch.zip");
        write_zip(&archive, &[("notes.txt", "call back on monday")]);

        let scratch_root = tempfile::tempdir().unwrap();
        let err = screen_archive(&state(scratch_root.path()), &archive, "Python developer")
            .await
            .unwrap_err();

        assert!(matches!(err, ScreenError::EmptyBatch(_)));
        assert!(is_empty_dir(scratch_root.path()));
    }

    #[tokio::test]
    async fn test_failing_document_is_excluded_not_fatal() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("batch.zip");
        write_zip(
            &archive,
            &[("broken.pdf", "%CORRUPT\u{0}\u{0}"), ("jane.pdf", JANE)],
        );

        let scratch_root = tempfile::tempdir().unwrap();
        let outcome = screen_archive(&state(scratch_root.path()), &archive, "Python developer")
            .await
            .unwrap();

        assert_eq!(outcome.ranked.len(), 1);
        assert_eq!(outcome.ranked[0].name, "Jane Doe");
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].file_name, "broken.pdf");
        assert!(outcome.skipped[0].reason.starts_with(EXTRACTION_ERROR_MARKER));
    }

    #[tokio::test]
    async fn test_ranks_are_contiguous_and_scores_non_increasing() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("batch.zip");
        write_zip(
            &archive,
            &[("omar.pdf", OMAR), ("jane.pdf", JANE), ("jane-copy.pdf", JANE)],
        );

        let scratch_root = tempfile::tempdir().unwrap();
        let job = "Backend engineer: Python, SQL, Docker";
        let outcome = screen_archive(&state(scratch_root.path()), &archive, job)
            .await
            .unwrap();

        let ranks: Vec<_> = outcome.ranked.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert!(outcome.ranked.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(outcome.ranked[2].name, "Omar Reyes");
    }

    #[tokio::test]
    async fn test_same_inputs_give_same_ranking() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("batch.zip");
        write_zip(&archive, &[("omar.pdf", OMAR), ("jane.pdf", JANE)]);

        let scratch_root = tempfile::tempdir().unwrap();
        let state = state(scratch_root.path());
        let first = screen_archive(&state, &archive, "UX designer with Figma").await.unwrap();
        let second = screen_archive(&state, &archive, "UX designer with Figma").await.unwrap();

        assert_eq!(first.ranked, second.ranked);
        assert_ne!(first.batch_id, second.batch_id);
    }

    #[tokio::test]
    async fn test_unreadable_archive_is_rejected_and_cleaned_up() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("batch.zip");
        fs::write(&archive, b"this is not a zip file").unwrap();

        let scratch_root = tempfile::tempdir().unwrap();
        let err = screen_archive(&state(scratch_root.path()), &archive, "Python developer")
            .await
            .unwrap_err();

        assert!(matches!(err, ScreenError::InvalidArchive(_)));
        assert!(is_empty_dir(scratch_root.path()));
    }

    #[tokio::test]
    async fn test_failed_conversion_drops_only_that_document() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("batch.zip");
        write_zip(&archive, &[("omar.docx", OMAR), ("jane.pdf", JANE)]);

        let scratch_root = tempfile::tempdir().unwrap();
        let state = state_with(
            scratch_root.path(),
            Arc::new(PlainTextExtractor),
            Arc::new(BrokenConverter),
        );
        let outcome = screen_archive(&state, &archive, "Python developer").await.unwrap();

        assert_eq!(outcome.ranked.len(), 1);
        assert_eq!(outcome.skipped[0].file_name, "omar.docx");
        assert!(outcome.skipped[0].reason.starts_with("CONVERSION_ERROR"));
    }

    #[tokio::test]
    async fn test_converted_document_is_reported_under_pdf_name() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("batch.zip");
        write_zip(&archive, &[("resume.docx", "%CORRUPT"), ("jane.pdf", JANE)]);

        let scratch_root = tempfile::tempdir().unwrap();
        let outcome = screen_archive(&state(scratch_root.path()), &archive, "Python developer")
            .await
            .unwrap();

        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].file_name, "resume.pdf");
    }

    #[tokio::test]
    async fn test_all_documents_failing_is_empty_batch() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("batch.zip");
        write_zip(&archive, &[("a.pdf", "%CORRUPT"), ("b.pdf", "%CORRUPT")]);

        let scratch_root = tempfile::tempdir().unwrap();
        let err = screen_archive(&state(scratch_root.path()), &archive, "Python developer")
            .await
            .unwrap_err();

        assert!(matches!(err, ScreenError::EmptyBatch(_)));
        assert!(is_empty_dir(scratch_root.path()));
    }

    #[tokio::test]
    async fn test_slow_extraction_times_out() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("batch.zip");
        write_zip(&archive, &[("slow.pdf", JANE)]);

        let scratch_root = tempfile::tempdir().unwrap();
        let mut state = state_with(
            scratch_root.path(),
            Arc::new(SlowExtractor),
            Arc::new(CopyConverter),
        );
        state.config.extraction_timeout = Duration::from_millis(20);

        let err = screen_archive(&state, &archive, "Python developer")
            .await
            .unwrap_err();
        assert!(matches!(err, ScreenError::EmptyBatch(_)));
    }

    #[tokio::test]
    async fn test_blank_job_description_is_rejected() {
        let scratch_root = tempfile::tempdir().unwrap();
        let err = screen_archive(
            &state(scratch_root.path()),
            Path::new("/does/not/matter.zip"),
            "   ",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ScreenError::Validation(_)));
    }

    #[tokio::test]
    async fn test_results_follow_archive_order_on_ties() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("batch.zip");
        let twin = JANE.replace("Jane Doe", "Jane Twin");
        write_zip(&archive, &[("jane.pdf", JANE), ("twin.pdf", twin.as_str())]);

        let scratch_root = tempfile::tempdir().unwrap();
        let outcome = screen_archive(&state(scratch_root.path()), &archive, "Python developer")
            .await
            .unwrap();

        assert_eq!(outcome.ranked[0].score, outcome.ranked[1].score);
        assert_eq!(outcome.ranked[0].name, "Jane Doe");
        assert_eq!(outcome.ranked[1].name, "Jane Twin");
    }

    #[tokio::test]
    async fn test_real_pdf_resume_is_ranked() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("batch.zip");
        let pdf = one_page_pdf(&[
            "Name: Jane Doe",
            "Age: 29",
            "Gender: Female",
            "Job roles: Software Engineer",
            "Level: Senior",
            "Degree: Bachelor of Science",
            "Skills: Python SQL Docker",
            "Certification: AWS",
        ]);
        write_zip_bytes(&archive, &[("jane.pdf", pdf.as_slice())]);

        let scratch_root = tempfile::tempdir().unwrap();
        let state = state_with(
            scratch_root.path(),
            Arc::new(PdfTextExtractor),
            Arc::new(CopyConverter),
        );
        let outcome = screen_archive(&state, &archive, "Python developer").await.unwrap();

        assert_eq!(outcome.ranked.len(), 1);
        let top = &outcome.ranked[0];
        assert_eq!(top.rank, 1);
        assert_eq!(top.name, "Jane Doe");
        assert_eq!(top.job_role, "Software Engineer");
        assert_eq!(top.skill_1, "Python");
        assert_eq!(top.certification, "AWS");
        assert!(outcome.skipped.is_empty());
        assert!(is_empty_dir(scratch_root.path()));
    }

    #[tokio::test]
    async fn test_embedding_failure_is_fatal_and_cleaned_up() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("batch.zip");
        write_zip(&archive, &[("jane.pdf", JANE)]);

        let scratch_root = tempfile::tempdir().unwrap();
        let mut state = state(scratch_root.path());
        state.embedder = Arc::new(FailingEmbedder);

        let err = screen_archive(&state, &archive, "Python developer")
            .await
            .unwrap_err();

        assert!(matches!(err, ScreenError::Embedding(EmbeddingError::Backend(_))));
        assert_eq!(err.code(), "EMBEDDING_ERROR");
        assert!(is_empty_dir(scratch_root.path()));
    }

    #[tokio::test]
    async fn test_timed_out_work_still_holds_its_parse_slot() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("batch.zip");
        write_zip(&archive, &[("a.pdf", JANE), ("b.pdf", JANE), ("c.pdf", JANE)]);

        let scratch_root = tempfile::tempdir().unwrap();
        let extractor = Arc::new(CountingExtractor::default());
        let mut state = state_with(
            scratch_root.path(),
            extractor.clone(),
            Arc::new(CopyConverter),
        );
        state.config.parse_concurrency = 1;
        state.config.extraction_timeout = Duration::from_millis(10);

        let err = screen_archive(&state, &archive, "Python developer")
            .await
            .unwrap_err();

        assert!(matches!(err, ScreenError::EmptyBatch(_)));
        assert_eq!(extractor.peak.load(Ordering::SeqCst), 1);
    }
}
