//! Where source artifacts come from and final artifacts go.

use crate::audio::clip::AudioClip;
use crate::error::Result;
use crate::pipeline::segment::Artifact;
use crate::pipeline::store::write_atomic;
use std::fs;
use std::path::{Path, PathBuf};

/// Provides the artifact a stage starts from.
pub trait ArtifactSource {
    /// Human-readable origin, used in logs and errors.
    fn describe(&self) -> String;

    fn read_audio(&self) -> Result<AudioClip>;

    fn read_text(&self) -> Result<String>;
}

/// Receives the merged artifact a stage produces.
pub trait ArtifactSink {
    fn describe(&self) -> String;

    fn write(&self, artifact: &Artifact) -> Result<()>;
}

/// Source backed by a file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArtifactSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read_audio(&self) -> Result<AudioClip> {
        AudioClip::read_wav(&self.path)
    }

    fn read_text(&self) -> Result<String> {
        Ok(fs::read_to_string(&self.path)?)
    }
}

/// Sink writing the artifact to a single file, creating parent directories.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArtifactSink for FileSink {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn write(&self, artifact: &Artifact) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        write_atomic(&self.path, &artifact.to_bytes()?)?;
        log::info!("Wrote {}", self.path.display());
        Ok(())
    }
}
