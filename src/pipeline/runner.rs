//! Resumable, strictly ordered driver for one stage.

use crate::error::{DubshError, Result, TransformError};
use crate::pipeline::clock::Clock;
use crate::pipeline::retry::RetryingTransform;
use crate::pipeline::segment::{Artifact, Segment, SegmentId, SegmentResult, SegmentStatus};
use crate::pipeline::store::{FailureLog, SegmentStore};
use crate::pipeline::transform::Transform;
use crate::text::TagNormalizer;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

/// Whether every segment has a persisted result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Complete,
    /// Finished, but some segments failed permanently.
    Degraded,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Complete => write!(f, "complete"),
            RunOutcome::Degraded => write!(f, "degraded"),
        }
    }
}

/// Summary of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub results: Vec<SegmentResult>,
    /// Where the failure log was written, if any segment failed.
    pub failure_log: Option<PathBuf>,
}

impl RunReport {
    fn record(&mut self, id: SegmentId, status: SegmentStatus) {
        match &status {
            SegmentStatus::Success => self.succeeded += 1,
            SegmentStatus::Skipped => self.skipped += 1,
            SegmentStatus::PermanentFailure(_) => self.failed += 1,
        }
        self.results.push(SegmentResult { id, status });
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.failed == 0 {
            RunOutcome::Complete
        } else {
            RunOutcome::Degraded
        }
    }

    /// Identifiers of the failed segments, in run order.
    pub fn failures(&self) -> impl Iterator<Item = &SegmentResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.status, SegmentStatus::PermanentFailure(_)))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} segment(s): {} succeeded, {} skipped, {} failed ({})",
            self.total(),
            self.succeeded,
            self.skipped,
            self.failed,
            self.outcome()
        )
    }
}

/// Drives segments through a retrying transform, persisting each result.
///
/// Segments whose result already exists in the store are skipped without
/// calling the transform, which makes re-runs after an interruption cheap.
pub struct ResumableRunner<T: Transform, C: Clock + Clone> {
    transform: RetryingTransform<T, C>,
    store: SegmentStore,
    normalizer: Option<TagNormalizer>,
    failure_log: PathBuf,
}

impl<T: Transform, C: Clock + Clone> ResumableRunner<T, C> {
    pub fn new(transform: RetryingTransform<T, C>, store: SegmentStore) -> Self {
        let failure_log = store.failure_log_path();
        Self {
            transform,
            store,
            normalizer: None,
            failure_log,
        }
    }

    /// Repairs speaker tags in text results before they are persisted.
    pub fn with_normalizer(mut self, normalizer: TagNormalizer) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub fn with_failure_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.failure_log = path.into();
        self
    }

    pub fn store(&self) -> &SegmentStore {
        &self.store
    }

    pub fn transform(&self) -> &RetryingTransform<T, C> {
        &self.transform
    }

    /// Processes every segment in ordinal order.
    ///
    /// Per-segment failures never abort the run; they are collected and
    /// written to the failure log once at the end. A log left by an earlier
    /// run is removed when this run has no failures.
    pub async fn run(&mut self, segments: &[Segment]) -> Result<RunReport> {
        if segments.is_empty() {
            return Err(DubshError::NoSegments {
                source_name: self.store.dir().display().to_string(),
            });
        }

        let mut ordered: Vec<&Segment> = segments.iter().collect();
        ordered.sort_by_key(|s| s.id().sort_key());
        let mut seen = HashSet::new();
        for segment in &ordered {
            if !seen.insert(segment.id().sort_key()) {
                return Err(DubshError::DuplicateSegment {
                    id: segment.id().to_string(),
                });
            }
        }

        let total = ordered.len();
        let name = self.transform.inner().name().to_string();
        log::info!(
            "[{}] Processing {} segment(s) into {}",
            name,
            total,
            self.store.dir().display()
        );

        let mut report = RunReport::default();
        let mut failures = FailureLog::new();

        for (index, segment) in ordered.into_iter().enumerate() {
            let id = segment.id();
            if self.store.exists(&id) {
                log::info!("[{}] {}/{} {}: already done, skipping", name, index + 1, total, id);
                report.record(id, SegmentStatus::Skipped);
                continue;
            }

            let outcome = match self.transform.apply(segment).await {
                Ok(artifact) => {
                    let artifact = self.normalize(artifact);
                    self.store
                        .persist(&id, &artifact)
                        .map_err(|e| format!("could not persist result: {}", e))
                }
                Err(TransformError::Permanent(message) | TransformError::Transient(message)) => {
                    Err(message)
                }
            };

            match outcome {
                Ok(_) => {
                    log::info!("[{}] {}/{} {}: done", name, index + 1, total, id);
                    report.record(id, SegmentStatus::Success);
                }
                Err(reason) => {
                    log::error!("[{}] {}/{} {}: failed: {}", name, index + 1, total, id, reason);
                    failures.push(&id);
                    report.record(id, SegmentStatus::PermanentFailure(reason));
                }
            }
        }

        if failures.is_empty() {
            FailureLog::clear(&self.failure_log)?;
        } else {
            failures.persist(&self.failure_log)?;
            log::warn!(
                "[{}] {} segment(s) failed, see {}",
                name,
                failures.len(),
                self.failure_log.display()
            );
            report.failure_log = Some(self.failure_log.clone());
        }

        log::info!("[{}] {}", name, report.summary());
        Ok(report)
    }

    fn normalize(&self, artifact: Artifact) -> Artifact {
        match (&self.normalizer, artifact) {
            (Some(normalizer), Artifact::Text(text)) => Artifact::Text(normalizer.normalize(&text)),
            (_, artifact) => artifact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::clip::AudioClip;
    use crate::pipeline::clock::ManualClock;
    use crate::pipeline::retry::RetryPolicy;
    use crate::pipeline::transform::ScriptedTransform;
    use std::fs;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn runner(
        transform: ScriptedTransform,
        dir: &TempDir,
    ) -> ResumableRunner<ScriptedTransform, ManualClock> {
        let retrying =
            RetryingTransform::new(transform, RetryPolicy::default(), 0, ManualClock::new())
                .unwrap();
        ResumableRunner::new(retrying, SegmentStore::open(dir.path(), "txt").unwrap())
    }

    fn segments(n: u32) -> Vec<Segment> {
        (1..=n).map(|i| Segment::text(i, format!("line {}", i))).collect()
    }

    #[tokio::test]
    async fn test_all_succeed() {
        let dir = TempDir::new().unwrap();
        let mut runner = runner(ScriptedTransform::echo(), &dir);

        let report = runner.run(&segments(3)).await.unwrap();

        assert_eq!(report.succeeded, 3);
        assert_eq!(report.outcome(), RunOutcome::Complete);
        assert!(report.failure_log.is_none());
        assert_eq!(runner.store().list().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_processes_in_ordinal_order() {
        let dir = TempDir::new().unwrap();
        let transform = ScriptedTransform::echo();
        let seen = transform.seen_ordinals();
        let mut runner = runner(transform, &dir);

        let mut input = segments(4);
        input.reverse();
        runner.run(&input).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_existing_results_are_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("002.txt"), "kept").unwrap();
        let transform = ScriptedTransform::echo();
        let counter = transform.call_counter();
        let mut runner = runner(transform, &dir);

        let report = runner.run(&segments(3)).await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(
            fs::read_to_string(dir.path().join("002.txt")).unwrap(),
            "kept"
        );
    }

    #[tokio::test]
    async fn test_permanent_failure_is_logged_and_run_continues() {
        let dir = TempDir::new().unwrap();
        let transform =
            ScriptedTransform::echo().fail_ordinal(2, TransformError::permanent("empty response"));
        let mut runner = runner(transform, &dir);

        let report = runner.run(&segments(3)).await.unwrap();

        assert_eq!(report.outcome(), RunOutcome::Degraded);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        let log_path = report.failure_log.clone().unwrap();
        assert_eq!(fs::read_to_string(log_path).unwrap(), "002\n");
        assert!(!dir.path().join("002.txt").exists());
    }

    #[tokio::test]
    async fn test_persist_error_fails_only_that_segment() {
        let dir = TempDir::new().unwrap();
        let transform = ScriptedTransform::echo()
            .fail_ordinal(1, TransformError::permanent("empty response"))
            .with_output(|segment| match segment.ordinal {
                2 => Artifact::Audio(AudioClip::silent(10, 1000)),
                _ => Artifact::Text(segment.payload.as_text().unwrap_or_default().to_string()),
            });
        let mut runner = runner(transform, &dir);

        let report = runner.run(&segments(3)).await.unwrap();

        assert_eq!(report.failed, 2);
        assert_eq!(report.succeeded, 1);
        assert!(dir.path().join("003.txt").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("failed_segments.txt")).unwrap(),
            "001\n002\n"
        );
        match &report.results[1].status {
            SegmentStatus::PermanentFailure(reason) => {
                assert!(reason.starts_with("could not persist result"), "{}", reason)
            }
            other => panic!("expected a failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stale_failure_log_is_cleared() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join(crate::defaults::FAILURE_LOG_NAME);
        fs::write(&log_path, "002\n").unwrap();
        let mut runner = runner(ScriptedTransform::echo(), &dir);

        runner.run(&segments(2)).await.unwrap();

        assert!(!log_path.exists());
    }

    #[tokio::test]
    async fn test_empty_input_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut runner = runner(ScriptedTransform::echo(), &dir);
        let result = runner.run(&[]).await;
        assert!(matches!(result, Err(DubshError::NoSegments { .. })));
    }

    #[tokio::test]
    async fn test_duplicate_ordinals_are_rejected() {
        let dir = TempDir::new().unwrap();
        let mut runner = runner(ScriptedTransform::echo(), &dir);
        let input = vec![Segment::text(1, "a"), Segment::text(1, "b")];
        let result = runner.run(&input).await;
        assert!(matches!(result, Err(DubshError::DuplicateSegment { .. })));
    }

    #[tokio::test]
    async fn test_normalizer_repairs_text_before_persisting() {
        let dir = TempDir::new().unwrap();
        let mut runner = runner(ScriptedTransform::echo(), &dir).with_normalizer(TagNormalizer::default());

        runner
            .run(&[Segment::text(1, "話者A: こんにちは\nSpeaker B: やあ")])
            .await
            .unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("001.txt")).unwrap(),
            "Speaker A: こんにちは\n\nSpeaker B: やあ"
        );
    }

    #[test]
    fn test_report_serializes_to_json() {
        let mut report = RunReport::default();
        report.record(SegmentId::new(1), SegmentStatus::Success);
        report.record(
            SegmentId::new(2),
            SegmentStatus::PermanentFailure("timeout".into()),
        );
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["succeeded"], 1);
        assert_eq!(json["failed"], 1);
        assert_eq!(json["results"][1]["status"], "permanent_failure");
        assert_eq!(
            report.summary(),
            "2 segment(s): 1 succeeded, 0 skipped, 1 failed (degraded)"
        );
    }
}
