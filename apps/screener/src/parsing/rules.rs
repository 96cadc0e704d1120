//! The extraction schema: an ordered list of label-boundary rules.
//!
//! A field's value is everything between its start label and the next
//! expected label. The default order mirrors the fixed layout of the résumé
//! template: Name, Age, Gender, Job roles, Level, Degree, Skills,
//! Certification.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Age,
    Gender,
    JobRole,
    Level,
    Degree,
    Skills,
    Certification,
}

/// One `(field, start label, stop label)` entry of the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    pub field: Field,
    /// Literal label text. Internal spaces match any whitespace run.
    pub start: String,
    /// Literal label that ends the value; `None` runs to the end of the text.
    #[serde(default)]
    pub stop: Option<String>,
    /// Regex patterns removed from the captured value (table-header leaks).
    #[serde(default)]
    pub strip: Vec<String>,
}

impl FieldRule {
    fn new(field: Field, start: &str, stop: Option<&str>) -> Self {
        Self {
            field,
            start: start.to_string(),
            stop: stop.map(str::to_string),
            strip: Vec::new(),
        }
    }

    fn stripping(mut self, pattern: &str) -> Self {
        self.strip.push(pattern.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionRules {
    pub fields: Vec<FieldRule>,
    /// Header words that leak into the skills span from tabular layouts.
    pub skip_tokens: Vec<String>,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            fields: vec![
                FieldRule::new(Field::Name, "Name", Some("Age")),
                FieldRule::new(Field::Age, "Age", Some("Gender")),
                FieldRule::new(Field::Gender, "Gender", Some("Job roles")),
                FieldRule::new(Field::JobRole, "Job roles", Some("Level")),
                FieldRule::new(Field::Level, "Level", Some("Degree")),
                FieldRule::new(Field::Degree, "Degree", Some("Skills"))
                    .stripping(r"Name\s*of\s*University\s*Major\s*Degree\s*GPA"),
                FieldRule::new(Field::Skills, "Skills", Some("Certification")),
                FieldRule::new(Field::Certification, "Certification", None)
                    .stripping(r"Name\s*Date\s*Institution\s*"),
            ],
            skip_tokens: ["Institution", "Date", "Role", "Skills"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// A [`FieldRule`] with its regexes built.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub field: Field,
    pub pattern: Regex,
    pub strip: Vec<Regex>,
}

impl ExtractionRules {
    pub fn compile(&self) -> Result<Vec<CompiledRule>, regex::Error> {
        self.fields
            .iter()
            .map(|rule| {
                let strip = rule
                    .strip
                    .iter()
                    .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CompiledRule {
                    field: rule.field,
                    pattern: boundary_pattern(&rule.start, rule.stop.as_deref())?,
                    strip,
                })
            })
            .collect()
    }
}

/// `<start> [:-]? (value) <stop>`, case-insensitive, `.` spanning newlines.
/// The value is matched lazily so it ends at the first following stop label.
fn boundary_pattern(start: &str, stop: Option<&str>) -> Result<Regex, regex::Error> {
    let stop = match stop {
        Some(label) => label_pattern(label),
        None => r"\z".to_string(),
    };
    let pattern = format!(r"{}\s*[:\-]?\s*(.+?)\s*{}", label_pattern(start), stop);
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
}

fn label_pattern(label: &str) -> String {
    label
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+")
}
