use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::model::ThreadId;
use crate::resolver::AttachmentFailure;

/// A condition the session recovered from. Recorded on the report; none of
/// these abort a run.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
pub enum Degradation {
    #[error("{target}: {step} failed ({reason}), candidate skipped")]
    AttachmentFailure {
        target: String,
        step: String,
        reason: String,
    },
    #[error("no candidate target could be attached, profiled the primary target")]
    NoTargetAvailable,
    #[error("trace not complete after {}, report uses partial data", seconds(.window))]
    IncompleteData { window: Duration },
    #[error("event channel closed before the trace completed ({events} events kept), report uses partial data")]
    ChannelClosed { events: usize },
    #[error("{samples} samples ({micros}µs) on thread {thread_id} reference unknown nodes")]
    DanglingNodeReference {
        thread_id: ThreadId,
        samples: usize,
        micros: i128,
    },
    #[error("no samples collected")]
    EmptySession,
    #[error("profiler unavailable: {reason}")]
    ProfilerUnavailable { reason: String },
}

impl From<&AttachmentFailure> for Degradation {
    fn from(failure: &AttachmentFailure) -> Self {
        Self::AttachmentFailure {
            target: failure.target.clone(),
            step: failure.step.to_string(),
            reason: failure.source.to_string(),
        }
    }
}

fn seconds(window: &Duration) -> String {
    format!("{:.1}s", window.as_secs_f64())
}
