use std::fmt;

use serde::{Deserialize, Serialize};

/// Value stored in a field whose label was not found in the document.
pub const NOT_FOUND: &str = "N/A";

/// Whether a field value is a real value rather than the not-found sentinel.
pub fn is_found(value: &str) -> bool {
    value != NOT_FOUND
}

/// Number of skill slots carried on every record.
pub const SKILL_SLOTS: usize = 5;

/// Prefix of the message recorded when text extraction fails.
pub const EXTRACTION_ERROR_MARKER: &str = "EXTRACTION_ERROR";

/// Text pulled out of a single document, or the reason it could not be.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentText {
    Extracted(String),
    Failed(String),
}

/// One extracted, uninterpreted text blob plus the file it came from.
/// Lives only between extraction and field extraction.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub file_name: String,
    pub text: DocumentText,
}

impl RawDocument {
    pub fn extracted(file_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            text: DocumentText::Extracted(text.into()),
        }
    }

    pub fn failed(file_name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            file_name: file_name.into(),
            text: DocumentText::Failed(format!("{EXTRACTION_ERROR_MARKER}: {reason}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParsingStatus {
    Success,
    ExtractionError(String),
}

/// The eight structured fields pulled out of normalized résumé text.
/// Absent fields hold [`NOT_FOUND`]; absent skill slots hold an empty string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateFields {
    pub name: String,
    pub age: String,
    pub gender: String,
    pub job_role: String,
    pub level: String,
    pub degree: String,
    pub certification: String,
    pub skills: [String; SKILL_SLOTS],
}

impl Default for CandidateFields {
    fn default() -> Self {
        Self {
            name: NOT_FOUND.to_string(),
            age: NOT_FOUND.to_string(),
            gender: NOT_FOUND.to_string(),
            job_role: NOT_FOUND.to_string(),
            level: NOT_FOUND.to_string(),
            degree: NOT_FOUND.to_string(),
            certification: NOT_FOUND.to_string(),
            skills: Default::default(),
        }
    }
}

impl CandidateFields {
    /// Non-empty skill slots, in document order.
    pub fn listed_skills(&self) -> impl Iterator<Item = &str> {
        self.skills
            .iter()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Structured result of parsing one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub file_name: String,
    pub parsing_status: ParsingStatus,
    #[serde(flatten)]
    pub fields: CandidateFields,
    /// Extracted text before normalization, kept for audit.
    pub raw_text: String,
}

impl CandidateRecord {
    pub fn parsed(file_name: String, fields: CandidateFields, raw_text: String) -> Self {
        Self {
            file_name,
            parsing_status: ParsingStatus::Success,
            fields,
            raw_text,
        }
    }

    /// A record for a document whose text could not be read. Every field
    /// still carries the not-found sentinel.
    pub fn extraction_failed(file_name: String, message: String) -> Self {
        Self {
            file_name,
            parsing_status: ParsingStatus::ExtractionError(message),
            fields: CandidateFields::default(),
            raw_text: String::new(),
        }
    }

    pub fn from_raw(raw: RawDocument, fields: impl FnOnce(&str) -> CandidateFields) -> Self {
        match raw.text {
            DocumentText::Extracted(text) => {
                let fields = fields(&text);
                Self::parsed(raw.file_name, fields, text)
            }
            DocumentText::Failed(message) => Self::extraction_failed(raw.file_name, message),
        }
    }
}
