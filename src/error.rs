//! Error types for dubsh.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DubshError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio errors
    #[error("Failed to decode audio: {message}")]
    AudioDecode { message: String },

    #[error("Failed to encode audio: {message}")]
    AudioEncode { message: String },

    #[error("Audio format mismatch: expected {expected}, got {actual}")]
    AudioFormatMismatch { expected: String, actual: String },

    // Run-level input errors
    #[error("No segments produced from {source_name}: nothing to process")]
    NoSegments { source_name: String },

    #[error("No segment results matching '*.{extension}' found in {dir}: nothing to merge")]
    NothingToMerge { dir: String, extension: String },

    #[error("Segment {id} appears more than once in the run")]
    DuplicateSegment { id: String },

    #[error("Segment {id} has an incompatible payload: {message}")]
    PayloadMismatch { id: String, message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, DubshError>;

/// Failure of a single segment transformation.
///
/// Transient failures are retried by [`crate::pipeline::retry::RetryingTransform`];
/// permanent failures abort the segment (never the run).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// Timeouts, rate-limit responses, transport errors.
    #[error("transient: {0}")]
    Transient(String),

    /// Malformed input, empty response, unrecoverable input.
    #[error("permanent: {0}")]
    Permanent(String),
}

impl TransformError {
    pub fn transient(message: impl Into<String>) -> Self {
        TransformError::Transient(message.into())
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        TransformError::Permanent(message.into())
    }

    pub fn timed_out(after: Duration) -> Self {
        TransformError::Transient(format!("attempt timed out after {:?}", after))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, TransformError::Transient(_))
    }
}
