use serde::{Deserialize, Serialize};

use crate::trace::RawTraceEvent;

/// A console message delivered on an attached session (`Runtime.consoleAPICalled`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    /// Message level (`log`, `warning`, `error`, ...).
    pub level: String,
    pub text: String,
}

/// Everything a protocol collaborator pushes into a session channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProtocolEvent {
    /// One `Tracing.dataCollected` batch.
    TraceBatch(Vec<RawTraceEvent>),
    Console(ConsoleMessage),
    /// `Tracing.tracingComplete`: no more trace data will follow.
    TracingComplete,
}
