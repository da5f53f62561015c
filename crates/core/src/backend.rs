//! Seams to the remote debugging protocol. The core drives these traits; a
//! protocol client (or a test double) implements them.

use crossbeam_channel::Sender;
use thiserror::Error;
use wasmprof_protocol::{CpuProfile, ProtocolEvent, SessionId, TargetId, TargetInfo};

/// A protocol call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{method}: {message}")]
pub struct ProtocolError {
    pub method: String,
    pub message: String,
}

impl ProtocolError {
    pub fn new(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            message: message.into(),
        }
    }
}

/// Per-target profiling: attach to one target at a time and run the
/// sampling profiler on it directly.
pub trait ProfilerBackend {
    /// `Target.getTargets`.
    fn targets(&mut self) -> Result<Vec<TargetInfo>, ProtocolError>;

    /// `Target.attachToTarget` (flattened).
    fn attach(&mut self, target: &TargetId) -> Result<SessionId, ProtocolError>;

    /// Route every event delivered on `session` into `events`.
    fn subscribe(&mut self, session: &SessionId, events: Sender<ProtocolEvent>);

    /// `Runtime.enable`.
    fn enable_runtime(&mut self, session: &SessionId) -> Result<(), ProtocolError>;

    /// `Profiler.enable`.
    fn enable_profiler(&mut self, session: &SessionId) -> Result<(), ProtocolError>;

    /// `Profiler.start`.
    fn start_profiler(&mut self, session: &SessionId) -> Result<(), ProtocolError>;

    /// `Profiler.stop`.
    fn stop_profiler(&mut self, session: &SessionId) -> Result<CpuProfile, ProtocolError>;

    /// Session on the default/primary target (the page itself).
    fn primary_session(&mut self) -> Result<SessionId, ProtocolError>;
}

/// Whole-system tracing: every thread at once, tagged by OS thread id.
pub trait TracingBackend {
    /// `Tracing.start`. Data batches and the completion signal go to `events`.
    fn start_tracing(
        &mut self,
        categories: &[String],
        options: &str,
        events: Sender<ProtocolEvent>,
    ) -> Result<(), ProtocolError>;

    /// `Tracing.end`.
    fn end_tracing(&mut self) -> Result<(), ProtocolError>;
}
