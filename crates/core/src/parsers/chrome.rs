use thiserror::Error;
use wasmprof_protocol::TraceFile;

use crate::model::TraceEvent;

#[derive(Debug, Error)]
pub enum ChromeParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse a saved Chrome trace (object or bare-array format) into typed
/// events, in file order.
///
/// Produced by DevTools "Save profile", `Tracing.dataCollected` dumps, and
/// `chrome://tracing` exports.
pub fn parse_chrome_trace(data: &[u8]) -> Result<Vec<TraceEvent>, ChromeParseError> {
    let trace_file: TraceFile = serde_json::from_slice(data)?;
    Ok(trace_file
        .into_events()
        .into_iter()
        .map(TraceEvent::from)
        .collect())
}
