//! Silence-aware audio segmentation.
//!
//! Cuts a clip into segments between `min_ms` and `max_ms` long, preferring
//! the earliest silence inside that window and falling back to a hard cut at
//! `max_ms`. Only the final remainder may be shorter than `min_ms`.

use crate::audio::clip::AudioClip;
use crate::audio::silence::{SilenceDetector, SilenceMap};
use crate::defaults;
use crate::error::{DubshError, Result};
use crate::pipeline::segment::Segment;

/// Size constraints for audio segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSegmentConfig {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for AudioSegmentConfig {
    fn default() -> Self {
        Self {
            min_ms: defaults::AUDIO_MIN_SEGMENT_MS,
            max_ms: defaults::AUDIO_MAX_SEGMENT_MS,
        }
    }
}

impl AudioSegmentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_ms == 0 {
            return Err(DubshError::ConfigInvalidValue {
                key: "audio.max_segment_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.min_ms > self.max_ms {
            return Err(DubshError::ConfigInvalidValue {
                key: "audio.min_segment_ms".to_string(),
                message: format!(
                    "{} exceeds audio.max_segment_ms ({})",
                    self.min_ms, self.max_ms
                ),
            });
        }
        Ok(())
    }
}

/// Computes cut positions (segment end points, ascending, last == duration).
///
/// `split_points` must be ascending.
pub fn plan_cuts(duration_ms: u64, split_points: &[u64], config: AudioSegmentConfig) -> Vec<u64> {
    let mut cuts = Vec::new();
    let mut current = 0;

    while current < duration_ms {
        let remaining = duration_ms - current;
        if remaining <= config.max_ms {
            cuts.push(duration_ms);
            break;
        }

        let window_start = current + config.min_ms;
        let window_end = current + config.max_ms;
        let cut = split_points
            .iter()
            .copied()
            .find(|&p| p >= window_start && p <= window_end && p > current)
            .unwrap_or(window_end);

        cuts.push(cut);
        current = cut;
    }

    cuts
}

/// Splits audio into bounded segments at detected silences.
#[derive(Debug, Clone, Default)]
pub struct AudioSegmenter {
    config: AudioSegmentConfig,
    detector: SilenceDetector,
}

impl AudioSegmenter {
    pub fn new(config: AudioSegmentConfig, detector: SilenceDetector) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, detector })
    }

    pub fn config(&self) -> AudioSegmentConfig {
        self.config
    }

    /// Detects silences and splits the clip.
    pub fn split(&self, clip: &AudioClip) -> Vec<Segment> {
        let map = self.detector.analyze(clip);
        self.split_with(clip, &map)
    }

    /// Splits the clip using an existing silence analysis.
    pub fn split_with(&self, clip: &AudioClip, map: &SilenceMap) -> Vec<Segment> {
        let cuts = plan_cuts(clip.duration_ms(), &map.split_points(), self.config);

        let mut segments = Vec::with_capacity(cuts.len());
        let mut start = 0;
        for (index, &end) in cuts.iter().enumerate() {
            let piece = clip.slice_ms(start, end);
            log::debug!(
                "Segment {:03}: {} ms - {} ms ({:.2} s)",
                index + 1,
                start,
                end,
                piece.duration_ms() as f64 / 1000.0
            );
            segments.push(Segment::audio(index as u32 + 1, piece));
            start = end;
        }

        log::info!(
            "Split {:.2} s of audio into {} segment(s)",
            clip.duration_ms() as f64 / 1000.0,
            segments.len()
        );
        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::silence::tests::sectioned_clip;
    use crate::pipeline::segment::Payload;

    fn config(min_ms: u64, max_ms: u64) -> AudioSegmentConfig {
        AudioSegmentConfig { min_ms, max_ms }
    }

    #[test]
    fn test_short_input_is_one_segment() {
        assert_eq!(plan_cuts(5000, &[1000, 2000], config(1000, 6000)), vec![5000]);
    }

    #[test]
    fn test_empty_input_has_no_cuts() {
        assert!(plan_cuts(0, &[], config(1000, 6000)).is_empty());
    }

    #[test]
    fn test_cuts_at_earliest_silence_in_window() {
        // Window for the first cut is [4000, 6000]
        let cuts = plan_cuts(14_000, &[3000, 4500, 5500, 9000], config(4000, 6000));
        assert_eq!(cuts[0], 4500);
        // Next window is [8500, 10500]
        assert_eq!(cuts[1], 9000);
        assert_eq!(*cuts.last().unwrap(), 14_000);
    }

    #[test]
    fn test_hard_cut_without_silence() {
        let cuts = plan_cuts(13_000, &[], config(4000, 6000));
        assert_eq!(cuts, vec![6000, 12_000, 13_000]);
    }

    #[test]
    fn test_silence_before_min_is_ignored() {
        let cuts = plan_cuts(10_000, &[500, 3999], config(4000, 6000));
        assert_eq!(cuts[0], 6000);
    }

    #[test]
    fn test_size_bounds_hold_for_non_final_segments() {
        let points: Vec<u64> = (1..200).map(|i| i * 733).collect();
        let cfg = config(2000, 5000);
        let cuts = plan_cuts(120_000, &points, cfg);

        let mut start = 0;
        for (i, &end) in cuts.iter().enumerate() {
            let len = end - start;
            assert!(len <= cfg.max_ms, "segment {} too long: {}", i, len);
            if i + 1 < cuts.len() {
                assert!(len >= cfg.min_ms, "segment {} too short: {}", i, len);
            }
            start = end;
        }
        assert_eq!(start, 120_000);
    }

    #[test]
    fn test_segments_reconstitute_clip() {
        let clip = sectioned_clip(&[
            (3000, true),
            (400, false),
            (3000, true),
            (400, false),
            (3000, true),
        ]);
        let segmenter = AudioSegmenter::new(config(2000, 4000), SilenceDetector::default()).unwrap();
        let segments = segmenter.split(&clip);

        assert!(segments.len() > 1);
        let ordinals: Vec<u32> = segments.iter().map(|s| s.ordinal).collect();
        let expected: Vec<u32> = (1..=segments.len() as u32).collect();
        assert_eq!(ordinals, expected);

        let mut rebuilt = Vec::new();
        for segment in &segments {
            match &segment.payload {
                Payload::Audio(piece) => rebuilt.extend_from_slice(piece.samples()),
                Payload::Text(_) => panic!("audio segmenter produced text"),
            }
        }
        assert_eq!(rebuilt, clip.samples());
    }

    #[test]
    fn test_odd_sample_rate_tail_is_kept() {
        let samples: Vec<i16> = (0..22065)
            .map(|i| if i % 2 == 0 { 8000 } else { -8000 })
            .collect();
        let clip = AudioClip::new(samples, 22050);
        let segmenter = AudioSegmenter::new(config(100, 400), SilenceDetector::default()).unwrap();

        let segments = segmenter.split(&clip);

        let rebuilt: usize = segments
            .iter()
            .filter_map(|s| s.payload.as_audio())
            .map(|piece| piece.samples().len())
            .sum();
        assert_eq!(rebuilt, 22065);
    }

    #[test]
    fn test_first_cut_lands_in_silence() {
        let clip = sectioned_clip(&[(3000, true), (400, false), (3000, true)]);
        let segmenter = AudioSegmenter::new(config(2000, 4000), SilenceDetector::default()).unwrap();
        let segments = segmenter.split(&clip);
        assert_eq!(segments[0].size(), 3200);
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let err = AudioSegmenter::new(config(7000, 6000), SilenceDetector::default()).unwrap_err();
        assert!(matches!(err, DubshError::ConfigInvalidValue { .. }));
    }
}
