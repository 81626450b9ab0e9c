//! Speech-to-text with speaker attribution.

use crate::audio::clip::AudioClip;
use crate::error::TransformError;
use crate::pipeline::segment::{Artifact, Segment};
use crate::pipeline::transform::Transform;
use crate::text::line::{LabelGrammar, render_tagged};
use async_trait::async_trait;
use std::sync::Arc;

/// One diarized utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Speaker id as reported by the service (`A`, `B`, ...).
    pub speaker: String,
    pub text: String,
}

impl Utterance {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }
}

/// Trait for diarizing transcription services.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribes one audio segment into ordered utterances.
    async fn transcribe(&self, audio: &AudioClip) -> Result<Vec<Utterance>, TransformError>;

    fn model_name(&self) -> &str;
}

#[async_trait]
impl<T: SpeechToText + ?Sized> SpeechToText for Arc<T> {
    async fn transcribe(&self, audio: &AudioClip) -> Result<Vec<Utterance>, TransformError> {
        (**self).transcribe(audio).await
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Mock transcription service for testing
#[derive(Debug, Clone)]
pub struct MockSpeechToText {
    model_name: String,
    utterances: Vec<Utterance>,
    failure: Option<TransformError>,
}

impl MockSpeechToText {
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            utterances: vec![Utterance::new("A", "mock transcription")],
            failure: None,
        }
    }

    pub fn with_utterances(mut self, utterances: Vec<Utterance>) -> Self {
        self.utterances = utterances;
        self
    }

    pub fn with_failure(mut self, error: TransformError) -> Self {
        self.failure = Some(error);
        self
    }
}

#[async_trait]
impl SpeechToText for MockSpeechToText {
    async fn transcribe(&self, _audio: &AudioClip) -> Result<Vec<Utterance>, TransformError> {
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.utterances.clone()),
        }
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Renders utterances as `Speaker X: text` lines.
///
/// A speaker id that is already a full label is kept as is.
pub fn render_transcript(utterances: &[Utterance], grammar: &LabelGrammar) -> String {
    utterances
        .iter()
        .filter(|u| !u.text.trim().is_empty())
        .map(|u| {
            let speaker = u.speaker.trim();
            let label = if speaker.starts_with(grammar.prefix()) {
                speaker.to_string()
            } else {
                grammar.label_for(speaker)
            };
            render_tagged(&label, u.text.trim())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Transcription stage transform: audio segment → labeled transcript.
pub struct TranscribeTransform<S: SpeechToText> {
    service: S,
    grammar: LabelGrammar,
}

impl<S: SpeechToText> TranscribeTransform<S> {
    pub fn new(service: S, grammar: LabelGrammar) -> Self {
        Self { service, grammar }
    }
}

#[async_trait]
impl<S: SpeechToText> Transform for TranscribeTransform<S> {
    async fn apply(&self, segment: &Segment) -> Result<Artifact, TransformError> {
        let clip = segment.payload.as_audio().ok_or_else(|| {
            TransformError::permanent(format!("segment {} is not audio", segment.id()))
        })?;

        let utterances = self.service.transcribe(clip).await?;
        let transcript = render_transcript(&utterances, &self.grammar);
        if transcript.is_empty() {
            return Err(TransformError::permanent("empty transcription"));
        }
        log::debug!(
            "Segment {}: {} utterance(s) from {}",
            segment.id(),
            utterances.len(),
            self.service.model_name()
        );
        Ok(Artifact::Text(transcript))
    }

    fn name(&self) -> &str {
        "transcribe"
    }
}
