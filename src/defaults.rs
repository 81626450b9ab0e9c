//! Default configuration constants for dubsh.
//!
//! Shared by the configuration sections and the component `Default` impls so
//! every entry point starts from the same tuning.

/// Minimum audio segment duration in milliseconds (4 minutes).
///
/// Long segments keep diarization stable inside a segment; the transcription
/// service does not track speaker identity across files.
pub const AUDIO_MIN_SEGMENT_MS: u64 = 4 * 60 * 1000;

/// Maximum audio segment duration in milliseconds (6 minutes).
pub const AUDIO_MAX_SEGMENT_MS: u64 = 6 * 60 * 1000;

/// Silence threshold never rises above this level (dBFS).
pub const SILENCE_FLOOR_DBFS: f32 = -40.0;

/// Silence threshold sits this many dB below the measured loudness.
pub const SILENCE_MARGIN_DB: f32 = 10.0;

/// Minimum silent interval that counts as a split candidate.
pub const MIN_SILENCE_MS: u64 = 300;

/// Minimum silent interval removed by silence trimming.
pub const TRIM_MIN_SILENCE_MS: u64 = 500;

/// Audio kept on both sides of each non-silent range when trimming.
pub const TRIM_PADDING_MS: u64 = 500;

/// Analysis window for loudness measurement.
pub const FRAME_MS: u64 = 10;

/// Maximum characters per translation segment.
pub const TEXT_MAX_CHARS: usize = 3000;

/// Maximum characters per synthesis request.
pub const SYNTHESIS_MAX_CHARS: usize = 1500;

/// Canonical speaker prefix produced by the transcription service.
pub const SPEAKER_PREFIX: &str = "Speaker";

/// Label synthesized in front of unlabeled leading text.
pub const DEFAULT_LABEL: &str = "Speaker A";

/// Attempts per segment before it is recorded as failed.
pub const MAX_ATTEMPTS: u32 = 3;

/// First retry delay in milliseconds.
pub const BASE_DELAY_MS: u64 = 5000;

/// Growth factor between consecutive retry delays.
pub const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Upper bound for a single transform attempt in milliseconds.
pub const ATTEMPT_TIMEOUT_MS: u64 = 15_000;

/// Pacing for external calls (one call per second).
pub const REQUESTS_PER_MINUTE: u32 = 60;

/// Silence inserted between merged audio segments.
pub const MERGE_PAUSE_MS: u64 = 1000;

/// Separator inserted between merged text segments.
pub const TEXT_SEPARATOR: &str = "\n\n";

/// File listing the identifiers of permanently failed segments.
pub const FAILURE_LOG_NAME: &str = "failed_segments.txt";

/// Voice used for labels without an explicit mapping.
pub const DEFAULT_VOICE: &str = "ja-JP-Wavenet-C";
