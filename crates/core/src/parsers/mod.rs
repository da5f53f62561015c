pub mod chrome;
pub mod cpuprofile;

use thiserror::Error;
use wasmprof_protocol::CpuProfile;

use crate::model::TraceEvent;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("chrome: {0}")]
    Chrome(#[from] chrome::ChromeParseError),
    #[error("cpuprofile: {0}")]
    CpuProfile(#[from] cpuprofile::CpuProfileParseError),
    #[error("unable to detect format")]
    UnknownFormat,
}

/// A saved profiling artifact, decoded.
#[derive(Debug)]
pub enum LoadedTrace {
    /// Whole-system trace: every thread, tagged by OS thread id.
    Trace(Vec<TraceEvent>),
    /// Single-target profile from a direct profiler start/stop.
    CpuProfile(CpuProfile),
}

/// Auto-detect the file format and parse it.
///
/// Detection strategy:
/// 1. V8 CPU profile: object with "nodes" + "startTime" + "endTime".
/// 2. Chrome trace object: has "traceEvents".
/// 3. Chrome trace array: top-level array of objects containing "ph".
pub fn parse_auto(data: &[u8]) -> Result<LoadedTrace, ParseError> {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return Err(ParseError::UnknownFormat);
    };

    if let Some(obj) = value.as_object() {
        if obj.contains_key("nodes") && obj.contains_key("startTime") && obj.contains_key("endTime")
        {
            return Ok(LoadedTrace::CpuProfile(cpuprofile::parse_cpuprofile(data)?));
        }
        if obj.contains_key("traceEvents") {
            return Ok(LoadedTrace::Trace(chrome::parse_chrome_trace(data)?));
        }
    }

    if let Some(arr) = value.as_array()
        && arr.iter().any(|v| v.get("ph").is_some())
    {
        return Ok(LoadedTrace::Trace(chrome::parse_chrome_trace(data)?));
    }

    Err(ParseError::UnknownFormat)
}
