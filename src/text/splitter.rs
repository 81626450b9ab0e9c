//! Turn-preserving text segmentation.
//!
//! Whole speaker turns are packed into segments of at most `max_chars`
//! characters. A turn that alone exceeds the limit is force-split at sentence
//! boundaries and every piece is re-prefixed with the speaker label, so each
//! segment can be translated on its own.

use crate::defaults;
use crate::error::{DubshError, Result};
use crate::pipeline::segment::Segment;
use crate::text::line::LabelGrammar;
use crate::text::push_joined;
use crate::text::turns::{SpeakerTurn, collect_turns};

/// Sentence-terminal punctuation (Latin and CJK).
const TERMINATORS: &[char] = &['.', '!', '?', '…', '。', '！', '？'];

/// Size constraints for text segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSegmentConfig {
    pub max_chars: usize,
    /// Label given to leading unlabeled text.
    pub default_label: String,
}

impl Default for TextSegmentConfig {
    fn default() -> Self {
        Self {
            max_chars: defaults::TEXT_MAX_CHARS,
            default_label: defaults::DEFAULT_LABEL.to_string(),
        }
    }
}

/// Splits dialogue text into labeled, bounded segments.
#[derive(Debug, Clone, Default)]
pub struct TextSegmenter {
    config: TextSegmentConfig,
    grammar: LabelGrammar,
}

impl TextSegmenter {
    pub fn new(config: TextSegmentConfig, grammar: LabelGrammar) -> Result<Self> {
        if config.max_chars <= label_prefix(&config.default_label).chars().count() {
            return Err(DubshError::ConfigInvalidValue {
                key: "text.max_chars".to_string(),
                message: format!(
                    "{} leaves no room after the label '{}'",
                    config.max_chars, config.default_label
                ),
            });
        }
        Ok(Self { config, grammar })
    }

    pub fn config(&self) -> &TextSegmentConfig {
        &self.config
    }

    /// Turns of the text, used as segment boundaries.
    pub fn turns(&self, text: &str) -> Vec<SpeakerTurn> {
        collect_turns(text, &self.grammar, &self.config.default_label)
    }

    pub fn split(&self, text: &str) -> Result<Vec<Segment>> {
        let max = self.config.max_chars;
        let mut segments: Vec<Segment> = Vec::new();
        let mut buffer = String::new();
        let mut buffer_len = 0;

        for turn in self.turns(text) {
            let rendered = turn.render();
            let len = rendered.chars().count();

            if len > max {
                flush(&mut segments, &mut buffer, &mut buffer_len);
                let pieces = force_split(&turn, max)?;
                log::debug!(
                    "Turn of {} ({} chars) force-split into {} pieces",
                    turn.label,
                    len,
                    pieces.len()
                );
                for piece in pieces {
                    let ordinal = segments.len() as u32 + 1;
                    segments.push(Segment::text(ordinal, piece).with_origin(turn.label.clone()));
                }
                continue;
            }

            let needed = if buffer.is_empty() {
                len
            } else {
                buffer_len + 1 + len
            };
            if needed > max {
                flush(&mut segments, &mut buffer, &mut buffer_len);
            }
            if !buffer.is_empty() {
                buffer.push('\n');
                buffer_len += 1;
            }
            buffer.push_str(&rendered);
            buffer_len += len;
        }
        flush(&mut segments, &mut buffer, &mut buffer_len);

        log::info!("Split text into {} segment(s)", segments.len());
        Ok(segments)
    }
}

fn flush(segments: &mut Vec<Segment>, buffer: &mut String, buffer_len: &mut usize) {
    if buffer.is_empty() {
        return;
    }
    let ordinal = segments.len() as u32 + 1;
    segments.push(Segment::text(ordinal, std::mem::take(buffer)));
    *buffer_len = 0;
}

fn label_prefix(label: &str) -> String {
    format!("{}: ", label)
}

/// Splits at sentence-terminal punctuation and newlines, keeping the punctuation.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if c == '\n' {
            push_trimmed(&mut sentences, &mut current);
            continue;
        }
        current.push(c);
        if TERMINATORS.contains(&c) {
            push_trimmed(&mut sentences, &mut current);
        }
    }
    push_trimmed(&mut sentences, &mut current);
    sentences
}

fn push_trimmed(sentences: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    current.clear();
}

/// Breaks a sentence longer than `budget` characters, preferring whitespace.
fn hard_wrap(sentence: &str, budget: usize) -> Vec<String> {
    let chars: Vec<char> = sentence.chars().collect();
    if chars.len() <= budget {
        return vec![sentence.to_string()];
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let hard_end = (start + budget).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            chars[start..hard_end]
                .iter()
                .rposition(|c| c.is_whitespace())
                .filter(|&pos| pos > 0)
                .map(|pos| start + pos)
                .unwrap_or(hard_end)
        };
        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        start = end;
        while start < chars.len() && chars[start].is_whitespace() {
            start += 1;
        }
    }
    pieces
}

/// Force-splits an oversized turn into labeled pieces of at most `max_chars`.
pub fn force_split(turn: &SpeakerTurn, max_chars: usize) -> Result<Vec<String>> {
    let prefix = label_prefix(&turn.label);
    let prefix_len = prefix.chars().count();
    if max_chars <= prefix_len {
        return Err(DubshError::ConfigInvalidValue {
            key: "text.max_chars".to_string(),
            message: format!(
                "{} leaves no room after the label '{}'",
                max_chars, turn.label
            ),
        });
    }
    let budget = max_chars - prefix_len;

    Ok(pack_sentences(&turn.body(), budget)
        .into_iter()
        .map(|body| format!("{}{}", prefix, body))
        .collect())
}

/// Packs whole sentences into pieces of at most `budget` characters.
///
/// A sentence longer than the budget is wrapped on its own.
pub fn pack_sentences(text: &str, budget: usize) -> Vec<String> {
    let budget = budget.max(1);
    let mut bodies: Vec<String> = Vec::new();
    let mut current = String::new();
    for sentence in split_sentences(text) {
        for fragment in hard_wrap(&sentence, budget) {
            let mut candidate = current.clone();
            push_joined(&mut candidate, &fragment);
            if candidate.chars().count() > budget && !current.is_empty() {
                bodies.push(std::mem::take(&mut current));
                current = fragment;
            } else {
                current = candidate;
            }
        }
    }
    if !current.is_empty() {
        bodies.push(current);
    }
    bodies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::segment::Payload;

    fn segmenter(max_chars: usize) -> TextSegmenter {
        TextSegmenter::new(
            TextSegmentConfig {
                max_chars,
                ..TextSegmentConfig::default()
            },
            LabelGrammar::default(),
        )
        .unwrap()
    }

    fn texts(segments: &[Segment]) -> Vec<&str> {
        segments
            .iter()
            .map(|s| match &s.payload {
                Payload::Text(t) => t.as_str(),
                Payload::Audio(_) => panic!("text segmenter produced audio"),
            })
            .collect()
    }

    #[test]
    fn test_small_dialogue_is_one_segment() {
        let input = "Speaker A: hello\nSpeaker B: hi\nSpeaker A: bye";
        let segments = segmenter(3000).split(input).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(texts(&segments), vec![input]);
        assert_eq!(segments[0].ordinal, 1);
    }

    #[test]
    fn test_turns_are_never_cut() {
        let input = "Speaker A: aaaa aaaa aaaa\nSpeaker B: bbbb bbbb bbbb\nSpeaker A: cccc";
        let segments = segmenter(30).split(input).unwrap();
        assert_eq!(
            texts(&segments),
            vec![
                "Speaker A: aaaa aaaa aaaa",
                "Speaker B: bbbb bbbb bbbb",
                "Speaker A: cccc"
            ]
        );
        let ordinals: Vec<u32> = segments.iter().map(|s| s.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
    }

    #[test]
    fn test_turns_pack_up_to_limit() {
        let input = "Speaker A: one\nSpeaker B: two\nSpeaker A: three\nSpeaker B: four";
        // "Speaker A: one\nSpeaker B: two" is 29 chars
        let segments = segmenter(30).split(input).unwrap();
        assert_eq!(
            texts(&segments),
            vec![
                "Speaker A: one\nSpeaker B: two",
                "Speaker A: three",
                "Speaker B: four"
            ]
        );
    }

    #[test]
    fn test_oversized_turn_is_force_split_with_label() {
        let long = "This is sentence number one. Here is another one! Is this the third? Yes it is.";
        let input = format!("Speaker A: short\nSpeaker B: {}\nSpeaker A: end", long);
        let segments = segmenter(40).split(&input).unwrap();

        let all = texts(&segments);
        assert_eq!(all[0], "Speaker A: short");
        assert_eq!(*all.last().unwrap(), "Speaker A: end");

        let pieces: Vec<&Segment> = segments
            .iter()
            .filter(|s| s.origin.as_deref() == Some("Speaker B"))
            .collect();
        assert!(pieces.len() >= 3);
        for piece in &pieces {
            let text = piece.payload.as_text().unwrap();
            assert!(text.starts_with("Speaker B: "), "unlabeled piece: {}", text);
            assert!(text.chars().count() <= 40, "piece too long: {}", text);
        }

        let rejoined: Vec<String> = pieces
            .iter()
            .map(|p| p.payload.as_text().unwrap().trim_start_matches("Speaker B: ").to_string())
            .collect();
        assert_eq!(rejoined.join(" "), long);
    }

    #[test]
    fn test_size_bound_holds() {
        let mut input = String::new();
        for i in 0..50 {
            let label = if i % 2 == 0 { "A" } else { "B" };
            input.push_str(&format!(
                "Speaker {}: line {} has a few words. And a second sentence here.\n",
                label, i
            ));
        }
        for segment in segmenter(120).split(&input).unwrap() {
            assert!(segment.size() <= 120);
            assert!(segment.payload.as_text().unwrap().starts_with("Speaker "));
        }
    }

    #[test]
    fn test_unlabeled_text_is_force_split_by_sentence() {
        let input = "First sentence here. Second sentence here. Third sentence here.";
        let segments = segmenter(40).split(input).unwrap();
        assert!(segments.len() > 1);
        for segment in &segments {
            let text = segment.payload.as_text().unwrap();
            assert!(text.starts_with("Speaker A: "));
            assert!(text.chars().count() <= 40);
        }
    }

    #[test]
    fn test_sentence_longer_than_budget_is_wrapped() {
        let turn = SpeakerTurn::new("Speaker A", "word ".repeat(30).trim().to_string());
        let pieces = force_split(&turn, 31).unwrap();
        for piece in &pieces {
            assert!(piece.starts_with("Speaker A: "));
            assert!(piece.chars().count() <= 31, "{}", piece);
        }
        let words: usize = pieces
            .iter()
            .map(|p| p.trim_start_matches("Speaker A: ").split_whitespace().count())
            .sum();
        assert_eq!(words, 30);
    }

    #[test]
    fn test_cjk_sentences_join_without_spaces() {
        let turn = SpeakerTurn::new("Speaker A", "今日は晴れです。明日は雨です。明後日は雪です。");
        let pieces = force_split(&turn, 26).unwrap();
        assert_eq!(
            pieces,
            vec![
                "Speaker A: 今日は晴れです。明日は雨です。",
                "Speaker A: 明後日は雪です。"
            ]
        );
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("One. Two!\nThree? four"),
            vec!["One.", "Two!", "Three?", "four"]
        );
    }

    #[test]
    fn test_limit_too_small_for_label_rejected() {
        let result = TextSegmenter::new(
            TextSegmentConfig {
                max_chars: 5,
                ..TextSegmentConfig::default()
            },
            LabelGrammar::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_text_has_no_segments() {
        assert!(segmenter(100).split("\n  \n").unwrap().is_empty());
    }
}
