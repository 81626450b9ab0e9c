//! Dialogue text processing: label grammar, speaker turns, segmentation,
//! tag repair, and cleanup.

pub mod cleanup;
pub mod line;
pub mod normalizer;
pub mod splitter;
pub mod turns;

pub use cleanup::clean_dialogue;
pub use line::{LabelGrammar, Line};
pub use normalizer::TagNormalizer;
pub use splitter::{TextSegmentConfig, TextSegmenter, pack_sentences};
pub use turns::{SpeakerTurn, collect_turns};

/// Characters from scripts written without spaces between words.
pub(crate) fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3000}'..='\u{303F}'   // CJK punctuation
        | '\u{3040}'..='\u{30FF}' // Hiragana, Katakana
        | '\u{3400}'..='\u{4DBF}' // CJK extension A
        | '\u{4E00}'..='\u{9FFF}' // CJK unified ideographs
        | '\u{AC00}'..='\u{D7AF}' // Hangul
        | '\u{FF00}'..='\u{FFEF}' // Full-width forms
    )
}

/// Appends `next` to `out`, separated by a space unless either side is CJK.
pub(crate) fn push_joined(out: &mut String, next: &str) {
    let next = next.trim();
    if next.is_empty() {
        return;
    }
    if let (Some(prev), Some(first)) = (out.chars().last(), next.chars().next())
        && !prev.is_whitespace()
        && !is_cjk(prev)
        && !is_cjk(first)
    {
        out.push(' ');
    }
    out.push_str(next);
}
