use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row of the ranked output, in the shape the external caller consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    #[serde(rename = "Rank")]
    pub rank: usize,
    /// Raw cosine similarity between the job description and the profile.
    #[serde(rename = "Score")]
    pub score: f32,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Job Roles")]
    pub job_role: String,
    #[serde(rename = "Degree")]
    pub degree: String,
    #[serde(rename = "Certification")]
    pub certification: String,
    #[serde(rename = "Skill_1")]
    pub skill_1: String,
    #[serde(rename = "Skill_2")]
    pub skill_2: String,
    /// The synthesized profile sentence the score was computed from.
    #[serde(rename = "Resume")]
    pub resume: String,
}

impl RankedResult {
    /// Rescales the score to 0–100 for display. Ranking is unaffected.
    pub fn as_percent(mut self) -> Self {
        self.score *= 100.0;
        self
    }
}

/// A document that was part of the batch but did not make it into the ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedDocument {
    pub file_name: String,
    pub reason: String,
}

/// Success body printed for a screened batch.
#[derive(Debug, Serialize)]
pub struct ScreeningResponse {
    pub status: &'static str,
    pub batch_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub count: usize,
    pub data: Vec<RankedResult>,
    pub skipped: Vec<SkippedDocument>,
}

impl ScreeningResponse {
    pub fn new(batch_id: Uuid, data: Vec<RankedResult>, skipped: Vec<SkippedDocument>) -> Self {
        Self {
            status: "SUCCESS",
            batch_id,
            generated_at: Utc::now(),
            count: data.len(),
            data,
            skipped,
        }
    }
}
