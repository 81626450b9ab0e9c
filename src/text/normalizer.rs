//! Speaker-tag repair for translated segments.
//!
//! A translation model may rewrite `Speaker A:` as `話者A：`, `Speaker 1:` or
//! similar. The normalizer maps every recognized variant back to the canonical
//! label and separates speaker changes with a blank line. Lines already in
//! canonical form pass through untouched, and normalizing twice changes nothing.
//!
//! Only one segment is inspected at a time: a speaker change that falls exactly
//! on a segment boundary is not detected here.

use crate::text::line::{LabelGrammar, Line, render_tagged};

/// Repairs speaker labels and paragraph breaks in one segment's text.
#[derive(Debug, Clone, Default)]
pub struct TagNormalizer {
    grammar: LabelGrammar,
}

impl TagNormalizer {
    pub fn new(grammar: LabelGrammar) -> Self {
        Self { grammar }
    }

    pub fn grammar(&self) -> &LabelGrammar {
        &self.grammar
    }

    pub fn normalize(&self, text: &str) -> String {
        let mut out: Vec<String> = Vec::new();
        let mut last_label: Option<String> = None;
        let mut repaired = 0usize;

        for raw in text.lines() {
            match self.grammar.parse(raw) {
                Line::Blank => out.push(raw.to_string()),
                Line::Continuation(_) => out.push(raw.to_string()),
                Line::Tagged {
                    label,
                    text,
                    canonical,
                } => {
                    let speaker_changed = last_label.as_deref().is_some_and(|l| l != label);
                    let after_break = out.last().is_none_or(|l| l.trim().is_empty());
                    if speaker_changed && !after_break {
                        out.push(String::new());
                    }
                    if canonical {
                        out.push(raw.to_string());
                    } else {
                        repaired += 1;
                        out.push(render_tagged(&label, text));
                    }
                    last_label = Some(label);
                }
            }
        }

        if repaired > 0 {
            log::debug!("Repaired {} speaker label(s)", repaired);
        }

        let mut normalized = out.join("\n");
        if text.ends_with('\n') {
            normalized.push('\n');
        }
        normalized
    }
}
