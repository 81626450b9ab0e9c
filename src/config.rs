use crate::audio::silence::SilenceConfig;
use crate::audio::splitter::AudioSegmentConfig;
use crate::defaults;
use crate::error::{DubshError, Result};
use crate::pipeline::merger::Merger;
use crate::pipeline::retry::RetryPolicy;
use crate::stages::synthesize::VoiceMap;
use crate::text::line::{DEFAULT_ALIASES, LabelGrammar};
use crate::text::splitter::TextSegmentConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub text: TextConfig,
    pub retry: RetryConfig,
    pub merge: MergeConfig,
    pub normalizer: NormalizerConfig,
    pub voices: VoicesConfig,
}

/// Audio cleanup and segmentation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub min_segment_ms: u64,
    pub max_segment_ms: u64,
    pub silence_floor_dbfs: f32,
    pub silence_margin_db: f32,
    pub min_silence_ms: u64,
    pub frame_ms: u64,
    /// Remove long silences before splitting.
    pub trim_silence: bool,
    pub trim_min_silence_ms: u64,
    pub trim_padding_ms: u64,
}

/// Text segmentation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TextConfig {
    pub max_chars: usize,
    pub default_label: String,
    /// Longest utterance sent to synthesis in one call.
    pub synthesis_max_chars: usize,
}

/// Retry, timeout and pacing of external calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    /// Zero disables pacing.
    pub requests_per_minute: u32,
    pub attempt_timeout_ms: u64,
}

/// Reassembly of segment results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MergeConfig {
    pub pause_ms: u64,
    pub separator: String,
    pub chunk_markers: bool,
}

/// Speaker label grammar
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NormalizerConfig {
    pub prefix: String,
    /// Alternative spellings of the prefix that get repaired.
    pub aliases: Vec<String>,
}

/// Speaker label → synthesis voice
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VoicesConfig {
    pub default: String,
    pub speakers: BTreeMap<String, String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            min_segment_ms: defaults::AUDIO_MIN_SEGMENT_MS,
            max_segment_ms: defaults::AUDIO_MAX_SEGMENT_MS,
            silence_floor_dbfs: defaults::SILENCE_FLOOR_DBFS,
            silence_margin_db: defaults::SILENCE_MARGIN_DB,
            min_silence_ms: defaults::MIN_SILENCE_MS,
            frame_ms: defaults::FRAME_MS,
            trim_silence: true,
            trim_min_silence_ms: defaults::TRIM_MIN_SILENCE_MS,
            trim_padding_ms: defaults::TRIM_PADDING_MS,
        }
    }
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            max_chars: defaults::TEXT_MAX_CHARS,
            default_label: defaults::DEFAULT_LABEL.to_string(),
            synthesis_max_chars: defaults::SYNTHESIS_MAX_CHARS,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::MAX_ATTEMPTS,
            base_delay_ms: defaults::BASE_DELAY_MS,
            multiplier: defaults::BACKOFF_MULTIPLIER,
            requests_per_minute: defaults::REQUESTS_PER_MINUTE,
            attempt_timeout_ms: defaults::ATTEMPT_TIMEOUT_MS,
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            pause_ms: defaults::MERGE_PAUSE_MS,
            separator: defaults::TEXT_SEPARATOR.to_string(),
            chunk_markers: false,
        }
    }
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            prefix: defaults::SPEAKER_PREFIX.to_string(),
            aliases: DEFAULT_ALIASES.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl Default for VoicesConfig {
    fn default() -> Self {
        let mut speakers = BTreeMap::new();
        speakers.insert("Speaker A".to_string(), "ja-JP-Wavenet-C".to_string());
        speakers.insert("Speaker B".to_string(), "ja-JP-Wavenet-D".to_string());
        Self {
            default: defaults::DEFAULT_VOICE.to_string(),
            speakers,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DubshError::ConfigFileNotFound {
                    path: path.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(DubshError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - DUBSH_REQUESTS_PER_MINUTE → retry.requests_per_minute
    /// - DUBSH_MAX_ATTEMPTS → retry.max_attempts
    /// - DUBSH_DEFAULT_VOICE → voices.default
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = std::env::var("DUBSH_REQUESTS_PER_MINUTE")
            && !value.is_empty()
        {
            match value.trim().parse() {
                Ok(rpm) => self.retry.requests_per_minute = rpm,
                Err(_) => log::warn!("Ignoring DUBSH_REQUESTS_PER_MINUTE={:?}", value),
            }
        }

        if let Ok(value) = std::env::var("DUBSH_MAX_ATTEMPTS")
            && !value.is_empty()
        {
            match value.trim().parse() {
                Ok(attempts) => self.retry.max_attempts = attempts,
                Err(_) => log::warn!("Ignoring DUBSH_MAX_ATTEMPTS={:?}", value),
            }
        }

        if let Ok(voice) = std::env::var("DUBSH_DEFAULT_VOICE")
            && !voice.is_empty()
        {
            self.voices.default = voice;
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/dubsh/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dubsh")
            .join("config.toml")
    }

    /// Serializes the effective configuration back to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DubshError::Other(format!("Failed to serialize config: {}", e)))
    }

    /// Checks cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.audio_segment_config().validate()?;
        if self.audio.frame_ms == 0 {
            return Err(DubshError::ConfigInvalidValue {
                key: "audio.frame_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        self.retry_policy().validate()?;
        let grammar = self.label_grammar()?;
        if self.text.max_chars <= self.text.default_label.chars().count() + 2 {
            return Err(DubshError::ConfigInvalidValue {
                key: "text.max_chars".to_string(),
                message: format!(
                    "{} leaves no room after the label '{}'",
                    self.text.max_chars, self.text.default_label
                ),
            });
        }
        if !self.text.default_label.starts_with(grammar.prefix()) {
            return Err(DubshError::ConfigInvalidValue {
                key: "text.default_label".to_string(),
                message: format!(
                    "'{}' does not start with the prefix '{}'",
                    self.text.default_label,
                    grammar.prefix()
                ),
            });
        }
        if self.text.synthesis_max_chars == 0 {
            return Err(DubshError::ConfigInvalidValue {
                key: "text.synthesis_max_chars".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn silence_config(&self) -> SilenceConfig {
        SilenceConfig {
            floor_dbfs: self.audio.silence_floor_dbfs,
            margin_db: self.audio.silence_margin_db,
            min_silence_ms: self.audio.min_silence_ms,
            frame_ms: self.audio.frame_ms,
        }
    }

    pub fn audio_segment_config(&self) -> AudioSegmentConfig {
        AudioSegmentConfig {
            min_ms: self.audio.min_segment_ms,
            max_ms: self.audio.max_segment_ms,
        }
    }

    pub fn text_segment_config(&self) -> TextSegmentConfig {
        TextSegmentConfig {
            max_chars: self.text.max_chars,
            default_label: self.text.default_label.clone(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            multiplier: self.retry.multiplier,
            attempt_timeout: Duration::from_millis(self.retry.attempt_timeout_ms),
        }
    }

    pub fn label_grammar(&self) -> Result<LabelGrammar> {
        LabelGrammar::new(&self.normalizer.prefix, &self.normalizer.aliases)
    }

    pub fn merger(&self) -> Merger {
        Merger::new(self.merge.pause_ms, self.merge.separator.clone())
            .with_chunk_markers(self.merge.chunk_markers)
    }

    pub fn voice_map(&self) -> VoiceMap {
        VoiceMap::from_map(self.voices.speakers.clone(), self.voices.default.clone())
    }
}
