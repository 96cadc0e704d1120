//! Profile synthesis: one natural-language sentence per candidate. Ranking
//! embeds this sentence, not the raw fields.

use crate::models::candidate::{is_found, CandidateFields};

const CLOSING: &str = ". Skilled in delivering results and adapting to dynamic environments.";

/// Builds the profile sentence for a candidate. Pure and deterministic.
pub fn synthesize_profile(fields: &CandidateFields) -> String {
    let skills = fields.listed_skills().collect::<Vec<_>>().join(", ");

    let mut main = if skills.is_empty() {
        "Proficient in unspecified skills".to_string()
    } else {
        format!("Proficient in {skills}")
    };

    if is_found(&fields.level) && !fields.level.is_empty() {
        main.push_str(&format!(", with {}-level experience in the field", fields.level));
    } else {
        main.push_str(", with unspecified experience in the field");
    }

    let mut profile = capitalize(&main);

    if is_found(&fields.degree) && !fields.degree.is_empty() {
        profile.push_str(&format!(". Holds a {} degree", fields.degree));
    }

    if is_found(&fields.certification) && !fields.certification.is_empty() {
        profile.push_str(&format!(
            ". Holds certifications such as {}",
            fields.certification
        ));
    }

    profile.push_str(CLOSING);
    profile
}

/// First character upper-cased, the rest lower-cased.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
