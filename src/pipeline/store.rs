//! Per-segment result persistence.
//!
//! A result file at its canonical path is the completion marker for that
//! segment. Files are written to a hidden `.part` sibling and renamed into
//! place, so an interrupted write never looks complete. One writer per
//! directory is assumed.

use crate::defaults;
use crate::error::{DubshError, Result};
use crate::pipeline::segment::{Artifact, SegmentId};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory of persisted results sharing one extension.
#[derive(Debug, Clone)]
pub struct SegmentStore {
    dir: PathBuf,
    extension: String,
}

impl SegmentStore {
    /// Opens (creating if needed) the result directory.
    pub fn open(dir: impl Into<PathBuf>, extension: &str) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            extension: extension.trim_start_matches('.').to_ascii_lowercase(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn path_for(&self, id: &SegmentId) -> PathBuf {
        self.dir.join(id.file_name(&self.extension))
    }

    pub fn exists(&self, id: &SegmentId) -> bool {
        self.path_for(id).is_file()
    }

    /// Writes the artifact for `id` atomically and returns its path.
    pub fn persist(&self, id: &SegmentId, artifact: &Artifact) -> Result<PathBuf> {
        if artifact.extension() != self.extension {
            return Err(DubshError::PayloadMismatch {
                id: id.to_string(),
                message: format!(
                    "store holds .{} results, got a .{} artifact",
                    self.extension,
                    artifact.extension()
                ),
            });
        }

        let path = self.path_for(id);
        let bytes = artifact.to_bytes()?;
        write_atomic(&path, &bytes)?;
        log::debug!("Persisted {}", path.display());
        Ok(path)
    }

    /// Persisted result ids sorted by `(ordinal, part)`; foreign files are ignored.
    pub fn list(&self) -> Result<Vec<(SegmentId, PathBuf)>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            match SegmentId::parse_file_name(name, &self.extension) {
                Some(id) => entries.push((id, entry.path())),
                None => log::debug!("Ignoring {} in {}", name, self.dir.display()),
            }
        }
        entries.sort_by(|(a, pa), (b, pb)| a.sort_key().cmp(&b.sort_key()).then(pa.cmp(pb)));
        Ok(entries)
    }

    pub fn failure_log_path(&self) -> PathBuf {
        self.dir.join(defaults::FAILURE_LOG_NAME)
    }

    /// Persisted results and the failure log of the last run.
    pub fn status(&self) -> Result<StoreStatus> {
        let persisted = self.list()?.into_iter().map(|(id, _)| id.to_string()).collect();
        let failed = FailureLog::load(&self.failure_log_path())?
            .entries()
            .map(str::to_string)
            .collect();
        Ok(StoreStatus {
            dir: self.dir.clone(),
            extension: self.extension.clone(),
            persisted,
            failed,
        })
    }
}

/// Snapshot of a result directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    pub dir: PathBuf,
    pub extension: String,
    pub persisted: Vec<String>,
    pub failed: Vec<String>,
}

impl StoreStatus {
    /// Pretty-printed JSON for machine consumers.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| DubshError::Other(format!("Invalid output path: {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.part", file_name));
    fs::write(&tmp, bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        if let Err(cleanup) = fs::remove_file(&tmp) {
            log::debug!("Could not remove {}: {}", tmp.display(), cleanup);
        }
        return Err(e.into());
    }
    Ok(())
}

/// Identifiers of segments that failed permanently in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureLog {
    entries: BTreeSet<String>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: &SegmentId) {
        self.entries.insert(id.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn contains(&self, id: &SegmentId) -> bool {
        self.entries.contains(&id.to_string())
    }

    /// One identifier per line.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let mut body = String::new();
        for entry in &self.entries {
            body.push_str(entry);
            body.push('\n');
        }
        write_atomic(path, body.as_bytes())
    }

    /// Reads a log back; a missing file is an empty log.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(Self {
            entries: content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }

    /// Removes a log left by an earlier run.
    pub fn clear(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
