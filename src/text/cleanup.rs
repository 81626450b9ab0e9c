//! Dialogue cleanup ahead of speech synthesis.
//!
//! Produces one line per speaker block, separated by blank lines, with line
//! endings normalized and control characters removed.

use crate::text::line::{LabelGrammar, Line, render_tagged};
use crate::text::push_joined;

/// Zero-width and byte-order characters that confuse synthesis engines.
const INVISIBLE: &[char] = &['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}'];

fn strip_unprintable(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter(|&c| c == '\n' || !(c.is_control() || INVISIBLE.contains(&c)))
        .collect()
}

/// Merges each speaker block into a single line and joins blocks with a blank line.
pub fn clean_dialogue(text: &str, grammar: &LabelGrammar) -> String {
    let text = strip_unprintable(text);
    let mut blocks: Vec<String> = Vec::new();

    for raw in text.lines() {
        match grammar.parse(raw) {
            Line::Blank => {}
            Line::Tagged { label, text, .. } => blocks.push(render_tagged(&label, text.trim())),
            Line::Continuation(text) => match blocks.last_mut() {
                Some(block) => push_joined(block, text),
                None => blocks.push(text.trim().to_string()),
            },
        }
    }

    if blocks.is_empty() {
        log::warn!("No dialogue blocks found during cleanup");
    } else {
        log::info!("Cleaned {} speaker block(s)", blocks.len());
    }
    blocks.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merges_block_lines() {
        let grammar = LabelGrammar::default();
        let out = clean_dialogue(
            "Speaker A: first part\nsecond part\r\nSpeaker B: reply",
            &grammar,
        );
        assert_eq!(out, "Speaker A: first part second part\n\nSpeaker B: reply");
    }

    #[test]
    fn test_japanese_lines_merge_without_spaces() {
        let grammar = LabelGrammar::default();
        let out = clean_dialogue("Speaker A：今日は\n晴れです。\n\n\nSpeaker B：はい", &grammar);
        assert_eq!(out, "Speaker A: 今日は晴れです。\n\nSpeaker B: はい");
    }

    #[test]
    fn test_strips_control_and_invisible_characters() {
        let grammar = LabelGrammar::default();
        let out = clean_dialogue("\u{FEFF}Speaker A: he\u{0007}llo\u{200B}", &grammar);
        assert_eq!(out, "Speaker A: hello");
    }

    #[test]
    fn test_preamble_is_kept_as_block() {
        let grammar = LabelGrammar::default();
        let out = clean_dialogue("title\nSpeaker A: hi", &grammar);
        assert_eq!(out, "title\n\nSpeaker A: hi");
    }

    #[test]
    fn test_empty_input() {
        let grammar = LabelGrammar::default();
        assert_eq!(clean_dialogue(" \n\n", &grammar), "");
    }
}
