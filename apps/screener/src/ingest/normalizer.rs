use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// A known OCR or typing error and its canonical spelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypoCorrection {
    pub pattern: String,
    pub replacement: String,
}

/// Noise-filter configuration. Corrections are applied in list order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerRules {
    pub typos: Vec<TypoCorrection>,
}

impl Default for NormalizerRules {
    fn default() -> Self {
        let typos = [
            ("Pyhon", "Python"),
            ("Cybersecuruty", "Cybersecurity"),
            ("Analystt", "Analyst"),
            ("Bachlor", "Bachelor"),
            ("Masteer", "Master"),
            ("Certificaton", "Certification"),
        ]
        .into_iter()
        .map(|(pattern, replacement)| TypoCorrection {
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
        })
        .collect();

        Self { typos }
    }
}

impl NormalizerRules {
    pub fn compile(&self) -> Result<TextNormalizer, regex::Error> {
        let typos = self
            .typos
            .iter()
            .map(|t| {
                RegexBuilder::new(&regex::escape(&t.pattern))
                    .case_insensitive(true)
                    .build()
                    .map(|re| (re, t.replacement.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TextNormalizer {
            typos,
            whitespace_runs: Regex::new(r"\s{2,}")?,
        })
    }
}

/// Compiled noise filters applied to every extracted document.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    typos: Vec<(Regex, String)>,
    whitespace_runs: Regex,
}

impl TextNormalizer {
    /// Strips control characters, applies the typo table, then collapses
    /// whitespace runs and trims.
    ///
    /// Text hidden in the document (white-on-white, zero-size fonts) is kept
    /// and treated like any other visible text.
    pub fn normalize(&self, text: &str) -> String {
        let mut cleaned = strip_control_chars(text);

        for (pattern, replacement) in &self.typos {
            // NoExpand: replacement strings are literal, `$` has no meaning.
            cleaned = pattern
                .replace_all(&cleaned, regex::NoExpand(replacement.as_str()))
                .into_owned();
        }

        self.whitespace_runs
            .replace_all(&cleaned, " ")
            .trim()
            .to_string()
    }
}

/// Line breaks and tabs become spaces so words on adjacent lines stay apart;
/// every other control character is dropped.
fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\n' | '\r' | '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}
