//! Deterministic reassembly of persisted segment results.

use crate::audio::clip::AudioClip;
use crate::defaults;
use crate::error::{DubshError, Result};
use crate::pipeline::segment::{Artifact, SegmentId};
use crate::pipeline::store::SegmentStore;
use crate::text::TagNormalizer;
use std::fs;
use std::path::PathBuf;

/// Concatenates the results in a [`SegmentStore`] in `(ordinal, part)` order.
#[derive(Debug, Clone)]
pub struct Merger {
    pause_ms: u64,
    separator: String,
    chunk_markers: bool,
    normalizer: Option<TagNormalizer>,
}

impl Default for Merger {
    fn default() -> Self {
        Self {
            pause_ms: defaults::MERGE_PAUSE_MS,
            separator: defaults::TEXT_SEPARATOR.to_string(),
            chunk_markers: false,
            normalizer: None,
        }
    }
}

impl Merger {
    pub fn new(pause_ms: u64, separator: impl Into<String>) -> Self {
        Self {
            pause_ms,
            separator: separator.into(),
            ..Self::default()
        }
    }

    /// Precede each text chunk with `=== CHUNK {name} ===`.
    pub fn with_chunk_markers(mut self, enabled: bool) -> Self {
        self.chunk_markers = enabled;
        self
    }

    /// Re-separate speaker changes inside each text chunk.
    pub fn with_normalizer(mut self, normalizer: TagNormalizer) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub fn pause_ms(&self) -> u64 {
        self.pause_ms
    }

    fn collect(&self, store: &SegmentStore) -> Result<Vec<(SegmentId, PathBuf)>> {
        let entries = store.list()?;
        if entries.is_empty() {
            return Err(DubshError::NothingToMerge {
                dir: store.dir().display().to_string(),
                extension: store.extension().to_string(),
            });
        }
        log::info!(
            "Merging {} result(s) from {}",
            entries.len(),
            store.dir().display()
        );
        Ok(entries)
    }

    /// Joins audio results with a silent pause between consecutive clips.
    ///
    /// Parts sharing an ordinal belong to one utterance and are joined
    /// without a pause.
    pub fn merge_audio(&self, store: &SegmentStore) -> Result<AudioClip> {
        let mut merged: Option<AudioClip> = None;
        let mut previous: Option<u32> = None;
        for (id, path) in self.collect(store)? {
            let clip = AudioClip::read_wav(&path)?;
            log::debug!("Appending {} ({} ms)", id, clip.duration_ms());
            match merged.as_mut() {
                None => merged = Some(clip),
                Some(out) => {
                    if self.pause_ms > 0 && previous != Some(id.ordinal) {
                        out.append(&AudioClip::silent(self.pause_ms, out.sample_rate()))?;
                    }
                    out.append(&clip)?;
                }
            }
            previous = Some(id.ordinal);
        }
        merged.ok_or_else(|| DubshError::NothingToMerge {
            dir: store.dir().display().to_string(),
            extension: store.extension().to_string(),
        })
    }

    /// Joins text results with the separator.
    pub fn merge_text(&self, store: &SegmentStore) -> Result<String> {
        let mut chunks = Vec::new();
        for (id, path) in self.collect(store)? {
            let content = fs::read_to_string(&path)?;
            let content = match &self.normalizer {
                Some(normalizer) => normalizer.normalize(&content),
                None => content,
            };
            let content = content.trim_end_matches('\n');
            if self.chunk_markers {
                let name = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| id.to_string());
                chunks.push(format!("=== CHUNK {} ===\n{}", name, content));
            } else {
                chunks.push(content.to_string());
            }
        }
        Ok(chunks.join(&self.separator))
    }

    /// Merges according to the store's extension.
    pub fn merge(&self, store: &SegmentStore) -> Result<Artifact> {
        match store.extension() {
            "wav" => Ok(Artifact::Audio(self.merge_audio(store)?)),
            _ => Ok(Artifact::Text(self.merge_text(store)?)),
        }
    }
}
