//! The three localization stages built on the pipeline engine.
//!
//! Each stage reads one source artifact, cuts it into segments, drives them
//! through its transform into a working directory, and merges the results
//! into one output artifact. Stages share no state beyond files on disk.

pub mod synthesize;
pub mod transcribe;
pub mod translate;

use crate::audio::silence::{SilenceDetector, trim_silence};
use crate::audio::splitter::AudioSegmenter;
use crate::config::Config;
use crate::error::{DubshError, Result};
use crate::pipeline::clock::Clock;
use crate::pipeline::io::{ArtifactSink, ArtifactSource};
use crate::pipeline::merger::Merger;
use crate::pipeline::retry::RetryingTransform;
use crate::pipeline::runner::{ResumableRunner, RunReport};
use crate::pipeline::segment::Segment;
use crate::pipeline::store::SegmentStore;
use crate::pipeline::transform::Transform;
use crate::text::{TagNormalizer, TextSegmenter, clean_dialogue};
use std::path::Path;

pub use synthesize::{MockSynthesizer, SpeechSynthesizer, SynthesizeTransform, VoiceMap, parse_dialogue};
pub use transcribe::{MockSpeechToText, SpeechToText, TranscribeTransform, Utterance, render_transcript};
pub use translate::{MockTranslator, TranslateTransform, Translator};

/// Runs every segment, merges the persisted results, and hands the merged
/// artifact to the sink.
///
/// The merge happens even when some segments failed; it fails only when no
/// result at all is available.
pub async fn run_stage<T: Transform, C: Clock + Clone>(
    runner: &mut ResumableRunner<T, C>,
    segments: &[Segment],
    merger: &Merger,
    sink: &dyn ArtifactSink,
) -> Result<RunReport> {
    let report = runner.run(segments).await?;
    let merged = merger.merge(runner.store())?;
    sink.write(&merged)?;
    log::info!("Stage output written to {}", sink.describe());
    Ok(report)
}

fn non_empty(segments: Vec<Segment>, source: &dyn ArtifactSource) -> Result<Vec<Segment>> {
    if segments.is_empty() {
        return Err(DubshError::NoSegments {
            source_name: source.describe(),
        });
    }
    Ok(segments)
}

/// Loads, optionally trims, and splits a recording into audio segments.
pub fn prepare_audio(config: &Config, source: &dyn ArtifactSource) -> Result<Vec<Segment>> {
    let clip = source.read_audio()?;
    let detector = SilenceDetector::new(config.silence_config());
    let clip = if config.audio.trim_silence {
        trim_silence(
            &detector,
            &clip,
            config.audio.trim_min_silence_ms,
            config.audio.trim_padding_ms,
        )
    } else {
        clip
    };
    if clip.is_empty() {
        return Err(DubshError::NoSegments {
            source_name: source.describe(),
        });
    }
    let segmenter = AudioSegmenter::new(config.audio_segment_config(), detector)?;
    non_empty(segmenter.split(&clip), source)
}

/// Splits a labeled transcript into turn-preserving text segments.
pub fn prepare_transcript(config: &Config, source: &dyn ArtifactSource) -> Result<Vec<Segment>> {
    let text = source.read_text()?;
    let segmenter = TextSegmenter::new(config.text_segment_config(), config.label_grammar()?)?;
    non_empty(segmenter.split(&text)?, source)
}

/// Cleans translated dialogue and splits it into one segment per utterance.
pub fn prepare_dialogue(config: &Config, source: &dyn ArtifactSource) -> Result<Vec<Segment>> {
    let grammar = config.label_grammar()?;
    let text = clean_dialogue(&source.read_text()?, &grammar);
    non_empty(
        parse_dialogue(&text, &grammar, config.text.synthesis_max_chars),
        source,
    )
}

fn runner<T: Transform, C: Clock + Clone>(
    config: &Config,
    transform: T,
    work_dir: &Path,
    extension: &str,
    clock: C,
) -> Result<ResumableRunner<T, C>> {
    let retrying = RetryingTransform::new(
        transform,
        config.retry_policy(),
        config.retry.requests_per_minute,
        clock,
    )?;
    Ok(ResumableRunner::new(
        retrying,
        SegmentStore::open(work_dir, extension)?,
    ))
}

/// Audio recording → labeled source-language transcript.
pub async fn transcribe_stage<S: SpeechToText, C: Clock + Clone>(
    config: &Config,
    service: S,
    source: &dyn ArtifactSource,
    work_dir: &Path,
    sink: &dyn ArtifactSink,
    clock: C,
) -> Result<RunReport> {
    config.validate()?;
    let segments = prepare_audio(config, source)?;
    let transform = TranscribeTransform::new(service, config.label_grammar()?);
    let mut runner = runner(config, transform, work_dir, "txt", clock)?;
    let merger = Merger::new(0, "\n").with_chunk_markers(config.merge.chunk_markers);
    run_stage(&mut runner, &segments, &merger, sink).await
}

/// Labeled transcript → labeled target-language transcript.
pub async fn translate_stage<T: Translator, C: Clock + Clone>(
    config: &Config,
    translator: T,
    source: &dyn ArtifactSource,
    work_dir: &Path,
    sink: &dyn ArtifactSink,
    clock: C,
) -> Result<RunReport> {
    config.validate()?;
    let grammar = config.label_grammar()?;
    let segments = prepare_transcript(config, source)?;
    let transform = TranslateTransform::new(translator, grammar.clone());
    let mut runner = runner(config, transform, work_dir, "txt", clock)?
        .with_normalizer(TagNormalizer::new(grammar.clone()));
    let merger = config.merger().with_normalizer(TagNormalizer::new(grammar));
    run_stage(&mut runner, &segments, &merger, sink).await
}

/// Labeled target-language dialogue → one recording with per-speaker voices.
pub async fn synthesize_stage<S: SpeechSynthesizer, C: Clock + Clone>(
    config: &Config,
    synthesizer: S,
    source: &dyn ArtifactSource,
    work_dir: &Path,
    sink: &dyn ArtifactSink,
    clock: C,
) -> Result<RunReport> {
    config.validate()?;
    let segments = prepare_dialogue(config, source)?;
    let transform = SynthesizeTransform::new(synthesizer, config.voice_map());
    let mut runner = runner(config, transform, work_dir, "wav", clock)?;
    run_stage(&mut runner, &segments, &config.merger(), sink).await
}
