//! dubsh - segment-oriented, resumable media localization
//!
//! Splits recordings and transcripts into bounded segments, drives each one
//! through an external transcription, translation or synthesis service with
//! retry and pacing, persists every result as its own file so interrupted
//! runs resume where they stopped, and reassembles the results in order.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod pipeline;
pub mod stages;
pub mod text;

// Core engine
pub use pipeline::{
    ArtifactSink, ArtifactSource, Merger, ResumableRunner, RetryPolicy, RetryingTransform,
    RunOutcome, RunReport, Segment, SegmentStore, Transform,
};

// Stage capabilities
pub use stages::{SpeechSynthesizer, SpeechToText, Translator};

// Error handling
pub use error::{DubshError, Result, TransformError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.0.1+abc1234"` when git hash is available, `"0.0.1"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
