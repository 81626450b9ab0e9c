//! Per-speaker voice synthesis.

use crate::audio::clip::AudioClip;
use crate::defaults;
use crate::error::TransformError;
use crate::pipeline::segment::{Artifact, Segment};
use crate::pipeline::transform::Transform;
use crate::text::line::{LabelGrammar, Line};
use crate::text::{pack_sentences, push_joined};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Trait for text-to-speech services.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<AudioClip, TransformError>;

    fn model_name(&self) -> &str;
}

#[async_trait]
impl<T: SpeechSynthesizer + ?Sized> SpeechSynthesizer for Arc<T> {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<AudioClip, TransformError> {
        (**self).synthesize(text, voice).await
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Mock synthesizer for testing: a constant tone, `ms_per_char` per character.
#[derive(Debug, Clone)]
pub struct MockSynthesizer {
    sample_rate: u32,
    ms_per_char: u64,
    failure: Option<TransformError>,
    voices: Arc<Mutex<Vec<String>>>,
}

impl MockSynthesizer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ms_per_char: 10,
            failure: None,
            voices: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_failure(mut self, error: TransformError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Voices requested so far, in call order.
    pub fn voices_used(&self) -> Vec<String> {
        self.voices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<AudioClip, TransformError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        self.voices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(voice.to_string());
        let ms = text.chars().count() as u64 * self.ms_per_char;
        let len = crate::audio::clip::ms_to_samples(ms, self.sample_rate);
        Ok(AudioClip::new(vec![8000; len], self.sample_rate))
    }

    fn model_name(&self) -> &str {
        "mock-tts"
    }
}

/// Speaker label → voice name, with a fallback voice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceMap {
    voices: BTreeMap<String, String>,
    default_voice: String,
}

impl Default for VoiceMap {
    fn default() -> Self {
        Self::new(defaults::DEFAULT_VOICE)
    }
}

impl VoiceMap {
    pub fn new(default_voice: impl Into<String>) -> Self {
        Self {
            voices: BTreeMap::new(),
            default_voice: default_voice.into(),
        }
    }

    pub fn from_map(voices: BTreeMap<String, String>, default_voice: impl Into<String>) -> Self {
        Self {
            voices,
            default_voice: default_voice.into(),
        }
    }

    pub fn with_voice(mut self, label: impl Into<String>, voice: impl Into<String>) -> Self {
        self.voices.insert(label.into(), voice.into());
        self
    }

    pub fn voice_for(&self, label: &str) -> &str {
        self.voices
            .get(label.trim())
            .map(String::as_str)
            .unwrap_or(&self.default_voice)
    }

    pub fn default_voice(&self) -> &str {
        &self.default_voice
    }
}

/// Splits cleaned dialogue into one synthesis segment per utterance.
///
/// Utterance `n` becomes ordinal `n` with the speaker label as origin; an
/// utterance longer than `max_chars` is spread over parts `1..`. Lines
/// without a label extend the previous utterance, and text before the first
/// label is dropped with a warning.
pub fn parse_dialogue(text: &str, grammar: &LabelGrammar, max_chars: usize) -> Vec<Segment> {
    let mut utterances: Vec<(String, String)> = Vec::new();
    let mut dropped = 0usize;

    for raw in text.lines() {
        match grammar.parse(raw) {
            Line::Blank => {}
            Line::Tagged { label, text, .. } => utterances.push((label, text.trim().to_string())),
            Line::Continuation(line) => match utterances.last_mut() {
                Some((_, body)) => push_joined(body, line),
                None => dropped += 1,
            },
        }
    }
    if dropped > 0 {
        log::warn!("Skipped {} line(s) before the first speaker label", dropped);
    }

    let mut segments = Vec::new();
    let mut ordinal = 0u32;
    for (label, body) in utterances {
        if body.is_empty() {
            continue;
        }
        ordinal += 1;
        if body.chars().count() <= max_chars {
            segments.push(Segment::text(ordinal, body).with_origin(label));
            continue;
        }
        for (index, piece) in pack_sentences(&body, max_chars).into_iter().enumerate() {
            segments.push(
                Segment::text(ordinal, piece)
                    .with_origin(label.clone())
                    .with_part(index as u32 + 1),
            );
        }
    }

    log::info!("Parsed {} utterance(s) for synthesis", ordinal);
    segments
}

/// Synthesis stage transform: labeled text → audio in the speaker's voice.
pub struct SynthesizeTransform<S: SpeechSynthesizer> {
    synthesizer: S,
    voices: VoiceMap,
}

impl<S: SpeechSynthesizer> SynthesizeTransform<S> {
    pub fn new(synthesizer: S, voices: VoiceMap) -> Self {
        Self {
            synthesizer,
            voices,
        }
    }
}

#[async_trait]
impl<S: SpeechSynthesizer> Transform for SynthesizeTransform<S> {
    async fn apply(&self, segment: &Segment) -> Result<Artifact, TransformError> {
        let text = segment.payload.as_text().ok_or_else(|| {
            TransformError::permanent(format!("segment {} is not text", segment.id()))
        })?;
        if text.trim().is_empty() {
            return Err(TransformError::permanent("nothing to synthesize"));
        }

        let label = segment.origin.as_deref().unwrap_or(defaults::DEFAULT_LABEL);
        let voice = self.voices.voice_for(label);
        log::debug!("Segment {}: {} as {}", segment.id(), label, voice);

        let clip = self.synthesizer.synthesize(text.trim(), voice).await?;
        if clip.is_empty() {
            return Err(TransformError::permanent("empty audio response"));
        }
        Ok(Artifact::Audio(clip))
    }

    fn name(&self) -> &str {
        "synthesize"
    }
}
