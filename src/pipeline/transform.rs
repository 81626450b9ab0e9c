//! The external transformation capability applied to each segment.

use crate::error::TransformError;
use crate::pipeline::segment::{Artifact, Payload, Segment};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Turns one segment into one artifact.
///
/// Implementations wrap a vendor service (transcription, translation,
/// synthesis) and classify its failures as transient or permanent.
#[async_trait]
pub trait Transform: Send + Sync {
    async fn apply(&self, segment: &Segment) -> Result<Artifact, TransformError>;

    /// Name for logging.
    fn name(&self) -> &str {
        "transform"
    }
}

#[async_trait]
impl<T: Transform + ?Sized> Transform for Arc<T> {
    async fn apply(&self, segment: &Segment) -> Result<Artifact, TransformError> {
        (**self).apply(segment).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<T: Transform + ?Sized> Transform for Box<T> {
    async fn apply(&self, segment: &Segment) -> Result<Artifact, TransformError> {
        (**self).apply(segment).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// One scripted reaction, consumed by the next call.
#[derive(Debug, Clone)]
pub enum Step {
    Fail(TransformError),
    /// Stall for the duration, then answer normally.
    Hang(Duration),
}

type OutputFn = dyn Fn(&Segment) -> Artifact + Send + Sync;

/// Scripted transform for tests and dry runs.
///
/// By default echoes the payload back. Scripted steps are consumed one per
/// call; ordinals registered with [`ScriptedTransform::fail_ordinal`] always fail.
pub struct ScriptedTransform {
    steps: Mutex<VecDeque<Step>>,
    failing: HashMap<u32, TransformError>,
    output: Box<OutputFn>,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<u32>>>,
}

impl Default for ScriptedTransform {
    fn default() -> Self {
        Self::echo()
    }
}

impl ScriptedTransform {
    /// Returns each segment's payload unchanged.
    pub fn echo() -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            failing: HashMap::new(),
            output: Box::new(|segment| match &segment.payload {
                Payload::Text(text) => Artifact::Text(text.clone()),
                Payload::Audio(clip) => Artifact::Audio(clip.clone()),
            }),
            calls: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replaces the success output.
    pub fn with_output(mut self, f: impl Fn(&Segment) -> Artifact + Send + Sync + 'static) -> Self {
        self.output = Box::new(f);
        self
    }

    /// Queues a step for the next unscripted call.
    pub fn then(self, step: Step) -> Self {
        self.steps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(step);
        self
    }

    pub fn then_fail(self, error: TransformError) -> Self {
        self.then(Step::Fail(error))
    }

    /// Every call for `ordinal` fails with `error`.
    pub fn fail_ordinal(mut self, ordinal: u32, error: TransformError) -> Self {
        self.failing.insert(ordinal, error);
        self
    }

    /// Shared call counter, readable after the transform has been moved.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Shared list of ordinals in call order.
    pub fn seen_ordinals(&self) -> Arc<Mutex<Vec<u32>>> {
        Arc::clone(&self.seen)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transform for ScriptedTransform {
    async fn apply(&self, segment: &Segment) -> Result<Artifact, TransformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(segment.ordinal);

        if let Some(error) = self.failing.get(&segment.ordinal) {
            return Err(error.clone());
        }

        let step = self
            .steps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match step {
            Some(Step::Fail(error)) => return Err(error),
            Some(Step::Hang(duration)) => tokio::time::sleep(duration).await,
            None => {}
        }

        Ok((self.output)(segment))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_returns_payload() {
        let transform = ScriptedTransform::echo();
        let artifact = transform.apply(&Segment::text(1, "hola")).await.unwrap();
        assert_eq!(artifact, Artifact::Text("hola".to_string()));
        assert_eq!(transform.calls(), 1);
    }

    #[tokio::test]
    async fn test_steps_are_consumed_in_order() {
        let transform = ScriptedTransform::echo()
            .then_fail(TransformError::transient("503"))
            .then_fail(TransformError::permanent("bad"));
        let segment = Segment::text(1, "x");

        assert!(transform.apply(&segment).await.unwrap_err().is_transient());
        assert!(!transform.apply(&segment).await.unwrap_err().is_transient());
        assert!(transform.apply(&segment).await.is_ok());
        assert_eq!(transform.calls(), 3);
    }

    #[tokio::test]
    async fn test_failing_ordinal_always_fails() {
        let transform =
            ScriptedTransform::echo().fail_ordinal(2, TransformError::permanent("unlabeled"));
        assert!(transform.apply(&Segment::text(1, "a")).await.is_ok());
        assert!(transform.apply(&Segment::text(2, "b")).await.is_err());
        assert!(transform.apply(&Segment::text(2, "b")).await.is_err());
        let seen = transform.seen_ordinals();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 2]);
    }

    #[tokio::test]
    async fn test_custom_output_through_arc() {
        let transform = Arc::new(
            ScriptedTransform::echo().with_output(|s| Artifact::Text(format!("#{}", s.ordinal))),
        );
        let artifact = transform.apply(&Segment::text(9, "x")).await.unwrap();
        assert_eq!(artifact, Artifact::Text("#9".to_string()));
    }
}
