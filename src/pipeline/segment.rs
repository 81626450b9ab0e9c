//! Segment data types shared by every stage.

use crate::audio::clip::AudioClip;
use crate::error::Result;
use serde::Serialize;
use std::fmt;

/// Raw material of one segment.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Audio(AudioClip),
    Text(String),
}

impl Payload {
    /// Duration in milliseconds for audio, length in characters for text.
    pub fn size(&self) -> u64 {
        match self {
            Payload::Audio(clip) => clip.duration_ms(),
            Payload::Text(text) => text.chars().count() as u64,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Audio(_) => None,
        }
    }

    pub fn as_audio(&self) -> Option<&AudioClip> {
        match self {
            Payload::Audio(clip) => Some(clip),
            Payload::Text(_) => None,
        }
    }
}

/// One ordered, independently processable unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// 1-based position in the run.
    pub ordinal: u32,
    /// Position inside a force-split unit.
    pub part: Option<u32>,
    /// Speaker label carried by the segment.
    pub origin: Option<String>,
    pub payload: Payload,
}

impl Segment {
    pub fn audio(ordinal: u32, clip: AudioClip) -> Self {
        Self {
            ordinal,
            part: None,
            origin: None,
            payload: Payload::Audio(clip),
        }
    }

    pub fn text(ordinal: u32, text: impl Into<String>) -> Self {
        Self {
            ordinal,
            part: None,
            origin: None,
            payload: Payload::Text(text.into()),
        }
    }

    pub fn with_origin(mut self, label: impl Into<String>) -> Self {
        self.origin = Some(label.into());
        self
    }

    pub fn with_part(mut self, part: u32) -> Self {
        self.part = Some(part);
        self
    }

    pub fn id(&self) -> SegmentId {
        SegmentId {
            ordinal: self.ordinal,
            label: self.origin.clone(),
            part: self.part,
        }
    }

    pub fn size(&self) -> u64 {
        self.payload.size()
    }
}

/// Identity of a segment as encoded in persisted file names:
/// `{ordinal:03}[_{label}][.part{part:03}]`.
///
/// Labels pass through [`file_safe_label`], which never leaves a `.`, so the
/// part marker cannot collide with a label ending in digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SegmentId {
    pub ordinal: u32,
    pub label: Option<String>,
    pub part: Option<u32>,
}

impl SegmentId {
    pub fn new(ordinal: u32) -> Self {
        Self {
            ordinal,
            label: None,
            part: None,
        }
    }

    /// Ordering key used by the merger.
    pub fn sort_key(&self) -> (u32, u32) {
        (self.ordinal, self.part.unwrap_or(0))
    }

    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", self, extension)
    }

    /// Recovers the identity from a file name with the given extension.
    ///
    /// Returns `None` for names outside the convention.
    pub fn parse_file_name(file_name: &str, extension: &str) -> Option<SegmentId> {
        let (stem, ext) = file_name.rsplit_once('.')?;
        if !ext.eq_ignore_ascii_case(extension) {
            return None;
        }

        let (stem, part) = match stem.rsplit_once(PART_MARKER) {
            Some((head, digits)) => (head, Some(parse_digits(digits)?)),
            None => (stem, None),
        };
        if stem.contains('.') {
            return None;
        }

        let (ordinal_token, label) = match stem.split_once('_') {
            Some((ordinal, label)) if !label.is_empty() => (ordinal, Some(label.to_string())),
            Some(_) => return None,
            None => (stem, None),
        };
        let ordinal = parse_digits(ordinal_token)?;

        Some(SegmentId {
            ordinal,
            label,
            part,
        })
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.ordinal)?;
        if let Some(label) = &self.label {
            write!(f, "_{}", file_safe_label(label))?;
        }
        if let Some(part) = self.part {
            write!(f, "{}{:03}", PART_MARKER, part)?;
        }
        Ok(())
    }
}

const PART_MARKER: &str = ".part";

fn parse_digits(token: &str) -> Option<u32> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

/// `"Speaker A"` → `"Speaker_A"`; anything outside letters, digits and `-` becomes `_`.
pub fn file_safe_label(label: &str) -> String {
    label
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Output of applying a transform to a segment.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Text(String),
    Audio(AudioClip),
}

impl Artifact {
    pub fn extension(&self) -> &'static str {
        match self {
            Artifact::Text(_) => "txt",
            Artifact::Audio(_) => "wav",
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Artifact::Text(text) => Ok(text.as_bytes().to_vec()),
            Artifact::Audio(clip) => clip.to_wav_bytes(),
        }
    }
}

/// Resolution of one segment in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SegmentStatus {
    /// Transformed and persisted in this run.
    Success,
    /// Already persisted by an earlier run.
    Skipped,
    /// Exhausted retries or failed permanently.
    PermanentFailure(String),
}

/// Per-segment outcome recorded by the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentResult {
    pub id: SegmentId,
    #[serde(flatten)]
    pub status: SegmentStatus,
}
