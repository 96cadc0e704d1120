use std::time::Instant;

use tracing::{debug, info};

use crate::models::candidate::CandidateRecord;
use crate::models::ranking::RankedResult;
use crate::parsing::profile::synthesize_profile;
use crate::ranking::embedder::{Embedder, EmbeddingError};
use crate::ranking::similarity::cosine_similarity;

/// A parsed candidate with its profile sentence and similarity score, before
/// ranks are assigned.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub record: CandidateRecord,
    pub profile: String,
    pub score: f32,
}

/// Embeds the job description and every candidate profile, scores by cosine
/// similarity and returns results in rank order.
///
/// Candidates must be in parse order: equal scores keep that order.
pub async fn rank_candidates(
    candidates: Vec<CandidateRecord>,
    job_description: &str,
    embedder: &dyn Embedder,
) -> Result<Vec<RankedResult>, EmbeddingError> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let profiles: Vec<String> = candidates
        .iter()
        .map(|c| synthesize_profile(&c.fields))
        .collect();

    let started = Instant::now();
    let candidate_vectors = embedder.embed_batch(&profiles).await?;
    if candidate_vectors.len() != profiles.len() {
        return Err(EmbeddingError::CountMismatch {
            expected: profiles.len(),
            got: candidate_vectors.len(),
        });
    }
    let job_vector = embedder.embed(job_description).await?;
    debug!(
        model = embedder.model_name(),
        profiles = profiles.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Embedded candidate profiles"
    );

    let scored = candidates
        .into_iter()
        .zip(profiles)
        .zip(&candidate_vectors)
        .map(|((record, profile), vector)| ScoredCandidate {
            score: cosine_similarity(&job_vector, vector),
            record,
            profile,
        })
        .collect();

    let ranked = assign_ranks(scored);
    if let Some(top) = ranked.first() {
        info!(
            candidates = ranked.len(),
            top_score = top.score,
            "Ranking complete"
        );
    }
    Ok(ranked)
}

/// Stable descending sort by score, then 1-based ranks with no gaps.
pub fn assign_ranks(mut scored: Vec<ScoredCandidate>) -> Vec<RankedResult> {
    // sort_by is stable: ties stay in parse order.
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));

    scored
        .into_iter()
        .enumerate()
        .map(|(i, c)| {
            let [skill_1, skill_2, ..] = c.record.fields.skills;
            RankedResult {
                rank: i + 1,
                score: c.score,
                name: c.record.fields.name,
                job_role: c.record.fields.job_role,
                degree: c.record.fields.degree,
                certification: c.record.fields.certification,
                skill_1,
                skill_2,
                resume: c.profile,
            }
        })
        .collect()
}
