//! Silence detection for audio segmentation.
//!
//! Measures loudness in fixed frames, derives an adaptive threshold from the
//! overall loudness of the clip, and reports silent intervals that are long
//! enough to cut at. A louder recording gets a higher threshold, but the
//! threshold never rises above the configured floor.

use crate::audio::clip::{AudioClip, ms_to_samples, samples_to_ms};
use crate::defaults;

/// Configuration for the silence detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceConfig {
    /// Threshold ceiling in dBFS.
    pub floor_dbfs: f32,
    /// Distance below measured loudness, in dB.
    pub margin_db: f32,
    /// Shortest silent interval reported.
    pub min_silence_ms: u64,
    /// Analysis frame length.
    pub frame_ms: u64,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            floor_dbfs: defaults::SILENCE_FLOOR_DBFS,
            margin_db: defaults::SILENCE_MARGIN_DB,
            min_silence_ms: defaults::MIN_SILENCE_MS,
            frame_ms: defaults::FRAME_MS,
        }
    }
}

/// A half-open `[start_ms, end_ms)` interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl TimeRange {
    pub fn new(start_ms: u64, end_ms: u64) -> Self {
        Self { start_ms, end_ms }
    }

    pub fn len_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    pub fn midpoint_ms(&self) -> u64 {
        self.start_ms + self.len_ms() / 2
    }
}

/// Result of silence analysis over one clip.
#[derive(Debug, Clone, PartialEq)]
pub struct SilenceMap {
    /// Threshold that was applied.
    pub threshold_dbfs: f32,
    /// Silent intervals, ascending, non-overlapping.
    pub silences: Vec<TimeRange>,
    /// Total clip duration.
    pub duration_ms: u64,
}

impl SilenceMap {
    /// Candidate split points: the midpoint of every silent interval.
    ///
    /// Empty when no silence was found; the whole clip is then one region.
    pub fn split_points(&self) -> Vec<u64> {
        self.silences.iter().map(TimeRange::midpoint_ms).collect()
    }

    /// Complement of the silent intervals.
    pub fn sounding(&self) -> Vec<TimeRange> {
        let mut ranges = Vec::new();
        let mut cursor = 0;
        for silence in &self.silences {
            if silence.start_ms > cursor {
                ranges.push(TimeRange::new(cursor, silence.start_ms));
            }
            cursor = silence.end_ms;
        }
        if cursor < self.duration_ms {
            ranges.push(TimeRange::new(cursor, self.duration_ms));
        }
        ranges
    }
}

/// RMS level of a sample block in dBFS (`-inf` for digital silence).
pub fn dbfs(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return f32::NEG_INFINITY;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (sum_sq / samples.len() as f64).sqrt();
    if rms == 0.0 {
        return f32::NEG_INFINITY;
    }
    (20.0 * (rms / 32768.0).log10()) as f32
}

/// `min(floor, loudness - margin)`.
pub fn adaptive_threshold(loudness_dbfs: f32, floor_dbfs: f32, margin_db: f32) -> f32 {
    floor_dbfs.min(loudness_dbfs - margin_db)
}

/// Detects silent intervals in audio clips.
#[derive(Debug, Clone, Default)]
pub struct SilenceDetector {
    config: SilenceConfig,
}

impl SilenceDetector {
    pub fn new(config: SilenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SilenceConfig {
        &self.config
    }

    /// Threshold for this clip, derived from its overall loudness.
    pub fn threshold_for(&self, clip: &AudioClip) -> f32 {
        adaptive_threshold(
            dbfs(clip.samples()),
            self.config.floor_dbfs,
            self.config.margin_db,
        )
    }

    /// Analyzes the clip with its adaptive threshold.
    pub fn analyze(&self, clip: &AudioClip) -> SilenceMap {
        let threshold = self.threshold_for(clip);
        self.analyze_with_threshold(clip, threshold, self.config.min_silence_ms)
    }

    /// Analyzes the clip with an explicit threshold and minimum silence length.
    pub fn analyze_with_threshold(
        &self,
        clip: &AudioClip,
        threshold_dbfs: f32,
        min_silence_ms: u64,
    ) -> SilenceMap {
        let duration_ms = clip.duration_ms();
        let frame_len = ms_to_samples(self.config.frame_ms.max(1), clip.sample_rate()).max(1);
        let rate = clip.sample_rate();

        let mut silences = Vec::new();
        let mut run_start: Option<usize> = None;

        for (index, frame) in clip.samples().chunks(frame_len).enumerate() {
            let offset = index * frame_len;
            let is_silent = dbfs(frame) <= threshold_dbfs;
            match (is_silent, run_start) {
                (true, None) => run_start = Some(offset),
                (false, Some(start)) => {
                    push_if_long(&mut silences, start, offset, rate, min_silence_ms);
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(start) = run_start {
            push_if_long(
                &mut silences,
                start,
                clip.samples().len(),
                rate,
                min_silence_ms,
            );
        }

        log::debug!(
            "Silence analysis: threshold {:.2} dBFS, {} interval(s) in {} ms",
            threshold_dbfs,
            silences.len(),
            duration_ms
        );

        SilenceMap {
            threshold_dbfs,
            silences,
            duration_ms,
        }
    }
}

fn push_if_long(
    silences: &mut Vec<TimeRange>,
    start: usize,
    end: usize,
    sample_rate: u32,
    min_silence_ms: u64,
) {
    let range = TimeRange::new(
        samples_to_ms(start, sample_rate),
        samples_to_ms(end, sample_rate),
    );
    if range.len_ms() >= min_silence_ms {
        silences.push(range);
    }
}

/// Removes long silences, keeping `padding_ms` of context around sound.
///
/// Padded ranges that touch or overlap are merged so no audio is duplicated.
/// When nothing sounding is found, the clip is returned unchanged.
pub fn trim_silence(
    detector: &SilenceDetector,
    clip: &AudioClip,
    min_silence_ms: u64,
    padding_ms: u64,
) -> AudioClip {
    let threshold = detector.threshold_for(clip);
    let map = detector.analyze_with_threshold(clip, threshold, min_silence_ms);
    let sounding = map.sounding();
    if sounding.is_empty() || map.silences.is_empty() {
        log::info!("No removable silence detected, keeping full audio");
        return clip.clone();
    }

    let mut padded: Vec<TimeRange> = Vec::with_capacity(sounding.len());
    for range in sounding {
        let start = range.start_ms.saturating_sub(padding_ms);
        let end = (range.end_ms + padding_ms).min(map.duration_ms);
        match padded.last_mut() {
            Some(last) if start <= last.end_ms => last.end_ms = last.end_ms.max(end),
            _ => padded.push(TimeRange::new(start, end)),
        }
    }

    let mut samples = Vec::new();
    for range in &padded {
        samples.extend_from_slice(clip.slice_ms(range.start_ms, range.end_ms).samples());
    }
    let trimmed = AudioClip::new(samples, clip.sample_rate());
    log::info!(
        "Trimmed silence: {} ms -> {} ms",
        clip.duration_ms(),
        trimmed.duration_ms()
    );
    trimmed
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const RATE: u32 = 1000;

    /// Builds a clip from `(duration_ms, is_loud)` sections at 1 kHz.
    pub(crate) fn sectioned_clip(sections: &[(u64, bool)]) -> AudioClip {
        let mut samples = Vec::new();
        for &(ms, loud) in sections {
            let n = ms_to_samples(ms, RATE);
            for i in 0..n {
                let value = if loud {
                    if i % 2 == 0 { 8000 } else { -8000 }
                } else {
                    0
                };
                samples.push(value);
            }
        }
        AudioClip::new(samples, RATE)
    }

    #[test]
    fn test_dbfs_levels() {
        assert_eq!(dbfs(&[]), f32::NEG_INFINITY);
        assert_eq!(dbfs(&[0, 0, 0]), f32::NEG_INFINITY);
        let full = dbfs(&[i16::MIN, i16::MIN]);
        assert!(full.abs() < 0.01, "full scale should be ~0 dBFS, got {}", full);
        let quarter = dbfs(&[8192, -8192]);
        assert!((quarter - (-12.04)).abs() < 0.05, "got {}", quarter);
    }

    #[test]
    fn test_adaptive_threshold_never_exceeds_floor() {
        // Loud source: loudness - margin is above the floor, floor wins
        assert_eq!(adaptive_threshold(-12.0, -40.0, 10.0), -40.0);
        // Quiet source: threshold drops below the floor
        assert_eq!(adaptive_threshold(-45.0, -40.0, 10.0), -55.0);
    }

    #[test]
    fn test_detects_long_silences_only() {
        let clip = sectioned_clip(&[(1000, true), (200, false), (1000, true), (600, false), (500, true)]);
        let map = SilenceDetector::default().analyze(&clip);

        assert_eq!(map.silences, vec![TimeRange::new(2200, 2800)]);
        assert_eq!(map.split_points(), vec![2500]);
        assert_eq!(map.duration_ms, 3300);
    }

    #[test]
    fn test_trailing_silence_is_reported() {
        let clip = sectioned_clip(&[(1000, true), (400, false)]);
        let map = SilenceDetector::default().analyze(&clip);
        assert_eq!(map.silences, vec![TimeRange::new(1000, 1400)]);
    }

    #[test]
    fn test_no_silence_means_no_split_points() {
        let clip = sectioned_clip(&[(3000, true)]);
        let map = SilenceDetector::default().analyze(&clip);
        assert!(map.silences.is_empty());
        assert!(map.split_points().is_empty());
        assert_eq!(map.sounding(), vec![TimeRange::new(0, 3000)]);
    }

    #[test]
    fn test_trim_removes_long_silence_with_padding() {
        let clip = sectioned_clip(&[(1000, true), (3000, false), (1000, true)]);
        let trimmed = trim_silence(&SilenceDetector::default(), &clip, 500, 500);
        // 1000 + 500 pad, then 500 pad + 1000
        assert_eq!(trimmed.duration_ms(), 3000);
    }

    #[test]
    fn test_trim_merges_overlapping_padding() {
        let clip = sectioned_clip(&[(1000, true), (600, false), (1000, true)]);
        let trimmed = trim_silence(&SilenceDetector::default(), &clip, 500, 500);
        // Gap of 600 ms is smaller than two paddings: nothing is duplicated or removed
        assert_eq!(trimmed.duration_ms(), clip.duration_ms());
    }

    #[test]
    fn test_trim_keeps_trailing_samples_at_odd_rates() {
        let mut samples: Vec<i16> = (0..22050)
            .map(|i| if i % 2 == 0 { 8000 } else { -8000 })
            .collect();
        samples.extend(std::iter::repeat_n(0, 44100));
        samples.extend((0..22065).map(|i| 4000 + i as i16));
        let clip = AudioClip::new(samples, 22050);

        let trimmed = trim_silence(&SilenceDetector::default(), &clip, 500, 500);

        assert!(trimmed.samples().len() < clip.samples().len());
        assert_eq!(trimmed.samples().last(), Some(&(4000 + 22064)));
    }

    #[test]
    fn test_trim_without_silence_keeps_clip() {
        let clip = sectioned_clip(&[(2000, true)]);
        let trimmed = trim_silence(&SilenceDetector::default(), &clip, 500, 500);
        assert_eq!(trimmed, clip);
    }
}
