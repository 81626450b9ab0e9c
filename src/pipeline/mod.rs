//! Segment-oriented, resumable processing engine.
//!
//! Each stage runs one sequential loop: segments are driven in ordinal order
//! through a [`RetryingTransform`], results are persisted one file per
//! segment by the [`SegmentStore`], and the [`Merger`] reassembles them.

pub mod clock;
pub mod io;
pub mod merger;
pub mod retry;
pub mod runner;
pub mod segment;
pub mod store;
pub mod transform;

pub use clock::{Clock, ManualClock, SystemClock};
pub use io::{ArtifactSink, ArtifactSource, FileSink, FileSource};
pub use merger::Merger;
pub use retry::{RateLimiter, RetryPolicy, RetryState, RetryingTransform};
pub use runner::{ResumableRunner, RunOutcome, RunReport};
pub use segment::{Artifact, Payload, Segment, SegmentId, SegmentResult, SegmentStatus};
pub use store::{FailureLog, SegmentStore, StoreStatus};
pub use transform::{ScriptedTransform, Step, Transform};
