//! Audio loading, silence analysis and segmentation.

pub mod clip;
pub mod silence;
pub mod splitter;

pub use clip::AudioClip;
pub use silence::{SilenceConfig, SilenceDetector, SilenceMap, TimeRange, trim_silence};
pub use splitter::{AudioSegmentConfig, AudioSegmenter};
