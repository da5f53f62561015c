use serde::{Deserialize, Serialize};

/// Script location of a profiled function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFrame {
    #[serde(default, rename = "functionName")]
    pub function_name: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// V8 CPU profile node, as found in `Profiler.stop` results, `.cpuprofile`
/// files, and `Profile`/`ProfileChunk` trace payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileNode {
    pub id: u64,
    #[serde(rename = "callFrame")]
    pub call_frame: CallFrame,
}

/// Result of a direct `Profiler.start`/`Profiler.stop` pair on one target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuProfile {
    #[serde(default)]
    pub nodes: Vec<ProfileNode>,
    #[serde(default, rename = "startTime")]
    pub start_time: f64,
    #[serde(default, rename = "endTime")]
    pub end_time: f64,
    #[serde(default)]
    pub samples: Vec<u64>,
    /// Microseconds since the previous sample.
    #[serde(default, rename = "timeDeltas")]
    pub time_deltas: Vec<i64>,
}
