use serde::{Deserialize, Serialize};

/// Raw trace event as delivered by `Tracing.dataCollected` or found in
/// DevTools JSON exports.
///
/// `args` stays untyped here; the core resolves it into a typed payload once,
/// at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTraceEvent {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cat: String,
    #[serde(default)]
    pub ph: String,
    #[serde(default)]
    pub ts: f64,
    #[serde(default)]
    pub pid: u64,
    #[serde(default)]
    pub tid: u64,
    #[serde(default)]
    pub args: Option<serde_json::Value>,
}

/// Top-level saved trace JSON: both the object format and the bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TraceFile {
    Object {
        #[serde(rename = "traceEvents")]
        trace_events: Vec<RawTraceEvent>,
    },
    Array(Vec<RawTraceEvent>),
}

impl TraceFile {
    pub fn into_events(self) -> Vec<RawTraceEvent> {
        match self {
            TraceFile::Object { trace_events } => trace_events,
            TraceFile::Array(events) => events,
        }
    }
}
