//! Speaker turns: the natural boundaries of dialogue text.

use crate::text::line::{LabelGrammar, Line, render_tagged};

/// A maximal run of lines attributed to one speaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerTurn {
    pub label: String,
    /// First entry is the text after the label; the rest are continuation lines.
    pub lines: Vec<String>,
}

impl SpeakerTurn {
    pub fn new(label: impl Into<String>, first: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            lines: vec![first.into()],
        }
    }

    /// The turn as it appears in a segment: labeled first line, continuation lines below.
    pub fn render(&self) -> String {
        let mut lines = self.lines.iter();
        let mut out = render_tagged(&self.label, lines.next().map(String::as_str).unwrap_or(""));
        for line in lines {
            out.push('\n');
            out.push_str(line);
        }
        out
    }

    pub fn char_len(&self) -> usize {
        self.render().chars().count()
    }

    /// Body text without the label.
    pub fn body(&self) -> String {
        self.lines.join("\n")
    }
}

/// Groups dialogue text into speaker turns.
///
/// A boundary sits before every labeled line. Leading text without a label is
/// attributed to `default_label`; text without any label becomes one turn.
/// Blank lines carry no content and are dropped.
pub fn collect_turns(text: &str, grammar: &LabelGrammar, default_label: &str) -> Vec<SpeakerTurn> {
    let mut turns: Vec<SpeakerTurn> = Vec::new();

    for raw in text.lines() {
        match grammar.parse(raw) {
            Line::Blank => {}
            Line::Tagged { label, text, .. } => turns.push(SpeakerTurn::new(label, text)),
            Line::Continuation(text) => match turns.last_mut() {
                Some(turn) => turn.lines.push(text.to_string()),
                None => {
                    log::warn!(
                        "Text starts without a speaker label, assuming '{}'",
                        default_label
                    );
                    turns.push(SpeakerTurn::new(default_label, text));
                }
            },
        }
    }

    turns
}
