//! Speaker-label grammar for dialogue text.
//!
//! Every line of a transcript is one of:
//! - `Tagged`: starts with a speaker label (`Speaker A: hello`)
//! - `Continuation`: text belonging to the previous speaker
//! - `Blank`: whitespace only
//!
//! Besides the canonical `Speaker A:` form, the grammar recognizes the
//! variants a translation model tends to emit (`話者A：`, `スピーカー B`,
//! `Speaker 1:`, `SpeakerＡ`) and maps them to the canonical label.

use crate::defaults;
use crate::error::{DubshError, Result};
use regex::Regex;

/// Alias prefixes recognized in addition to the canonical prefix.
pub const DEFAULT_ALIASES: &[&str] = &["話者", "スピーカー"];

/// One classified line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    Tagged {
        /// Canonical label, e.g. `Speaker A`.
        label: String,
        /// Text after the label and colon.
        text: &'a str,
        /// The line already used the exact canonical spelling.
        canonical: bool,
    },
    Continuation(&'a str),
    Blank,
}

impl Line<'_> {
    pub fn label(&self) -> Option<&str> {
        match self {
            Line::Tagged { label, .. } => Some(label),
            _ => None,
        }
    }
}

/// Formats a tagged line in canonical form.
pub fn render_tagged(label: &str, text: &str) -> String {
    if text.is_empty() {
        format!("{}:", label)
    } else {
        format!("{}: {}", label, text)
    }
}

/// Compiled speaker-label grammar.
#[derive(Debug, Clone)]
pub struct LabelGrammar {
    prefix: String,
    canonical: Regex,
    variant: Regex,
}

impl Default for LabelGrammar {
    fn default() -> Self {
        // The built-in prefix and aliases are valid patterns
        #[allow(clippy::expect_used)]
        Self::new(defaults::SPEAKER_PREFIX, DEFAULT_ALIASES).expect("default label grammar")
    }
}

impl LabelGrammar {
    /// Builds the grammar for a canonical prefix (e.g. `Speaker`) and its aliases.
    pub fn new<S: AsRef<str>>(prefix: &str, aliases: &[S]) -> Result<Self> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(DubshError::ConfigInvalidValue {
                key: "normalizer.prefix".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        let canonical = Regex::new(&format!(r"^{} ([A-Z]+):(.*)$", regex::escape(prefix)))
            .map_err(|e| DubshError::Other(format!("Invalid label pattern: {}", e)))?;

        let mut alternatives: Vec<String> = vec![regex::escape(prefix)];
        alternatives.extend(
            aliases
                .iter()
                .map(|a| a.as_ref().trim())
                .filter(|a| !a.is_empty())
                .map(regex::escape),
        );
        let variant = Regex::new(&format!(
            r"^\s*(?i:{})\s*([A-Za-zＡ-Ｚａ-ｚ1-9１-９])\s*([:：])?(.*)$",
            alternatives.join("|")
        ))
        .map_err(|e| DubshError::Other(format!("Invalid label pattern: {}", e)))?;

        Ok(Self {
            prefix: prefix.to_string(),
            canonical,
            variant,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Canonical label for a speaker id (`A` → `Speaker A`).
    pub fn label_for(&self, id: &str) -> String {
        format!("{} {}", self.prefix, id)
    }

    /// Classifies one line (without its trailing newline).
    pub fn parse<'a>(&self, line: &'a str) -> Line<'a> {
        if line.trim().is_empty() {
            return Line::Blank;
        }

        if let Some(caps) = self.canonical.captures(line)
            && let (Some(id), Some(rest)) = (caps.get(1), caps.get(2))
        {
            return Line::Tagged {
                label: self.label_for(id.as_str()),
                text: rest.as_str().trim_start(),
                canonical: rest.as_str().is_empty() || rest.as_str().starts_with(' '),
            };
        }

        if let Some(caps) = self.variant.captures(line)
            && let (Some(id), Some(rest)) = (caps.get(1), caps.get(3))
        {
            let has_colon = caps.get(2).is_some();
            let rest = rest.as_str();
            let Some(id_char) = id.as_str().chars().next() else {
                return Line::Continuation(line);
            };
            // Without a colon the id must stand alone: "Speaker A" but not "Speakers"
            let after_id = &line[id.end()..];
            let detached = after_id.is_empty() || after_id.starts_with(char::is_whitespace);
            if !has_colon && (!detached || id_char.is_lowercase()) {
                return Line::Continuation(line);
            }
            if let Some(id) = canonical_id(id_char) {
                return Line::Tagged {
                    label: self.label_for(&id.to_string()),
                    text: rest.trim_start(),
                    canonical: false,
                };
            }
        }

        Line::Continuation(line)
    }
}

/// Maps a raw speaker id to `A`–`Z`: full-width forms fold to ASCII,
/// digits count from `1` = `A`.
fn canonical_id(c: char) -> Option<char> {
    let c = if ('\u{FF01}'..='\u{FF5E}').contains(&c) {
        char::from_u32(c as u32 - 0xFEE0)?
    } else {
        c
    };
    match c {
        'A'..='Z' => Some(c),
        'a'..='z' => Some(c.to_ascii_uppercase()),
        '1'..='9' => char::from_u32(c as u32 - '1' as u32 + 'A' as u32),
        _ => None,
    }
}
