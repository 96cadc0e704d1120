use std::collections::HashSet;

use crate::models::candidate::{CandidateFields, SKILL_SLOTS};
use crate::parsing::rules::{CompiledRule, ExtractionRules, Field};

/// Applies the compiled schema to normalized résumé text.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    rules: Vec<CompiledRule>,
    skip_tokens: HashSet<String>,
}

impl FieldExtractor {
    pub fn new(rules: &ExtractionRules) -> Result<Self, regex::Error> {
        Ok(Self {
            rules: rules.compile()?,
            skip_tokens: rules.skip_tokens.iter().cloned().collect(),
        })
    }

    /// Runs every rule independently against `text`. A rule whose start label
    /// is absent leaves its field at the not-found sentinel.
    pub fn extract(&self, text: &str) -> CandidateFields {
        let mut fields = CandidateFields::default();

        for rule in &self.rules {
            let Some(value) = capture(rule, text) else {
                continue;
            };

            match rule.field {
                Field::Name => fields.name = value,
                Field::Age => fields.age = value,
                Field::Gender => fields.gender = value,
                Field::JobRole => fields.job_role = value,
                Field::Level => fields.level = value,
                Field::Degree => fields.degree = value,
                Field::Skills => fields.skills = self.skill_slots(&value),
                Field::Certification => fields.certification = value,
            }
        }

        fields
    }

    /// Whitespace tokens minus header noise, first five kept, padded with
    /// empty strings.
    fn skill_slots(&self, span: &str) -> [String; SKILL_SLOTS] {
        let mut slots: [String; SKILL_SLOTS] = Default::default();
        let tokens = span
            .split_whitespace()
            .filter(|t| !self.skip_tokens.contains(*t))
            .take(SKILL_SLOTS);
        for (slot, token) in slots.iter_mut().zip(tokens) {
            *slot = token.to_string();
        }
        slots
    }
}

/// First match only, artifacts stripped. An empty result counts as missing.
fn capture(rule: &CompiledRule, text: &str) -> Option<String> {
    let mut value = rule.pattern.captures(text)?.get(1)?.as_str().trim().to_string();
    for artifact in &rule.strip {
        value = artifact.replace_all(&value, "").trim().to_string();
    }
    (!value.is_empty()).then_some(value)
}
