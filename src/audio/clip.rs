//! In-memory mono PCM clip with WAV encoding and decoding.

use crate::error::{DubshError, Result};
use std::io::{Cursor, Read, Seek};
use std::path::Path;

/// Mono 16-bit PCM audio addressed in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// A clip of digital silence.
    pub fn silent(duration_ms: u64, sample_rate: u32) -> Self {
        let len = ms_to_samples(duration_ms, sample_rate);
        Self::new(vec![0; len], sample_rate)
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        samples_to_ms(self.samples.len(), self.sample_rate)
    }

    /// Copy of the `[start_ms, end_ms)` range, clamped to the clip.
    ///
    /// An `end_ms` at or past `duration_ms()` reaches the last sample, so the
    /// sub-millisecond tail dropped by `duration_ms()` is never lost.
    pub fn slice_ms(&self, start_ms: u64, end_ms: u64) -> AudioClip {
        let start = ms_to_samples(start_ms, self.sample_rate).min(self.samples.len());
        let end = if end_ms >= self.duration_ms() {
            self.samples.len()
        } else {
            ms_to_samples(end_ms, self.sample_rate).clamp(start, self.samples.len())
        };
        AudioClip::new(self.samples[start..end].to_vec(), self.sample_rate)
    }

    /// Appends another clip recorded at the same sample rate.
    pub fn append(&mut self, other: &AudioClip) -> Result<()> {
        if other.sample_rate != self.sample_rate {
            return Err(DubshError::AudioFormatMismatch {
                expected: format!("{} Hz", self.sample_rate),
                actual: format!("{} Hz", other.sample_rate),
            });
        }
        self.samples.extend_from_slice(&other.samples);
        Ok(())
    }

    /// Decodes WAV data. Multi-channel input is averaged down to mono.
    pub fn from_wav_reader<R: Read>(reader: R) -> Result<Self> {
        let mut wav_reader = hound::WavReader::new(reader).map_err(|e| DubshError::AudioDecode {
            message: format!("Failed to parse WAV data: {}", e),
        })?;

        let spec = wav_reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(DubshError::AudioFormatMismatch {
                expected: "16-bit integer PCM".to_string(),
                actual: format!("{}-bit {:?}", spec.bits_per_sample, spec.sample_format),
            });
        }

        let raw_samples: Vec<i16> = wav_reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| DubshError::AudioDecode {
                message: format!("Failed to read WAV samples: {}", e),
            })?;

        let channels = spec.channels.max(1) as usize;
        let samples = if channels == 1 {
            raw_samples
        } else {
            raw_samples
                .chunks_exact(channels)
                .map(|frame| {
                    let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                    (sum / channels as i32) as i16
                })
                .collect()
        };

        Ok(Self::new(samples, spec.sample_rate))
    }

    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_wav_reader(Cursor::new(bytes))
    }

    pub fn read_wav(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_wav_reader(std::io::BufReader::new(file))
    }

    /// Encodes the clip as a mono 16-bit WAV.
    pub fn write_wav_to<W: std::io::Write + Seek>(&self, writer: W) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut wav_writer =
            hound::WavWriter::new(writer, spec).map_err(|e| DubshError::AudioEncode {
                message: e.to_string(),
            })?;
        for &sample in &self.samples {
            wav_writer
                .write_sample(sample)
                .map_err(|e| DubshError::AudioEncode {
                    message: e.to_string(),
                })?;
        }
        wav_writer.finalize().map_err(|e| DubshError::AudioEncode {
            message: e.to_string(),
        })
    }

    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_wav_to(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

pub fn ms_to_samples(ms: u64, sample_rate: u32) -> usize {
    (ms * sample_rate as u64 / 1000) as usize
}

pub fn samples_to_ms(samples: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    samples as u64 * 1000 / sample_rate as u64
}
