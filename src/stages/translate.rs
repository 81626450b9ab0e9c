//! Speaker-preserving translation of text segments.

use crate::error::TransformError;
use crate::pipeline::segment::{Artifact, Segment};
use crate::pipeline::transform::Transform;
use crate::text::line::{LabelGrammar, Line};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Trait for machine translation services.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translates labeled dialogue, keeping one labeled line per utterance.
    async fn translate(&self, text: &str) -> Result<String, TransformError>;

    fn model_name(&self) -> &str;
}

#[async_trait]
impl<T: Translator + ?Sized> Translator for Arc<T> {
    async fn translate(&self, text: &str) -> Result<String, TransformError> {
        (**self).translate(text).await
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Mock translator for testing
#[derive(Debug, Clone)]
pub struct MockTranslator {
    model_name: String,
    response: Option<String>,
    failure: Option<TransformError>,
}

impl MockTranslator {
    /// Echoes the input back.
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            response: None,
            failure: None,
        }
    }

    pub fn with_response(mut self, response: &str) -> Self {
        self.response = Some(response.to_string());
        self
    }

    pub fn with_failure(mut self, error: TransformError) -> Self {
        self.failure = Some(error);
        self
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, text: &str) -> Result<String, TransformError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        Ok(self.response.clone().unwrap_or_else(|| text.to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

fn labels(text: &str, grammar: &LabelGrammar) -> BTreeSet<String> {
    text.lines()
        .filter_map(|line| match grammar.parse(line) {
            Line::Tagged { label, .. } => Some(label),
            _ => None,
        })
        .collect()
}

/// Translation stage transform.
///
/// Segments without any speaker label and empty responses are permanent
/// failures. Speakers missing from the response are only reported.
pub struct TranslateTransform<T: Translator> {
    translator: T,
    grammar: LabelGrammar,
}

impl<T: Translator> TranslateTransform<T> {
    pub fn new(translator: T, grammar: LabelGrammar) -> Self {
        Self {
            translator,
            grammar,
        }
    }
}

#[async_trait]
impl<T: Translator> Transform for TranslateTransform<T> {
    async fn apply(&self, segment: &Segment) -> Result<Artifact, TransformError> {
        let text = segment.payload.as_text().ok_or_else(|| {
            TransformError::permanent(format!("segment {} is not text", segment.id()))
        })?;

        let expected = labels(text, &self.grammar);
        if expected.is_empty() {
            return Err(TransformError::permanent("segment has no speaker label"));
        }

        let translated = self.translator.translate(text).await?;
        if translated.trim().is_empty() {
            return Err(TransformError::permanent("empty response"));
        }

        let found = labels(&translated, &self.grammar);
        let missing: Vec<&str> = expected.difference(&found).map(String::as_str).collect();
        if !missing.is_empty() {
            log::warn!(
                "Segment {}: translation dropped speaker(s) {}",
                segment.id(),
                missing.join(", ")
            );
        }

        Ok(Artifact::Text(translated.trim().to_string()))
    }

    fn name(&self) -> &str {
        "translate"
    }
}
