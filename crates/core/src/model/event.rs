use serde::{Deserialize, Serialize};
use wasmprof_protocol::{CpuProfile, ProfileNode, RawTraceEvent};

use super::CallNode;

/// OS-level thread id (trace mode) or a synthetic id handed out by the
/// registry for attached targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ThreadId(pub u64);

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Profiler payload carried by `Profile` and `ProfileChunk` events.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfilePayload {
    /// Initial node table of a profiling session.
    Snapshot { nodes: Vec<CallNode> },
    /// Incremental chunk: extra nodes plus parallel sample/delta lists.
    Chunk {
        nodes: Vec<CallNode>,
        samples: Vec<u64>,
        time_deltas: Vec<i64>,
    },
}

/// What a trace event means to us, resolved once at ingestion.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEventKind {
    ThreadName(String),
    Profile(ProfilePayload),
    /// Anything else; kept in the buffer, ignored by reconstruction.
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceEvent {
    pub name: String,
    pub thread_id: ThreadId,
    pub kind: TraceEventKind,
}

#[derive(Deserialize)]
struct ThreadNameArgs {
    name: String,
}

#[derive(Deserialize)]
struct SnapshotArgs {
    data: SnapshotData,
}

#[derive(Deserialize)]
struct SnapshotData {
    #[serde(default)]
    nodes: Vec<ProfileNode>,
}

#[derive(Deserialize)]
struct ChunkArgs {
    data: ChunkData,
}

#[derive(Deserialize)]
struct ChunkData {
    #[serde(default, rename = "cpuProfile")]
    cpu_profile: ChunkProfile,
    #[serde(default, rename = "timeDeltas")]
    time_deltas: Vec<i64>,
}

#[derive(Default, Deserialize)]
struct ChunkProfile {
    #[serde(default)]
    nodes: Vec<ProfileNode>,
    #[serde(default)]
    samples: Vec<u64>,
}

fn into_call_nodes(nodes: Vec<ProfileNode>) -> Vec<CallNode> {
    nodes.into_iter().map(CallNode::from).collect()
}

/// Decode `args` for the event families we understand. Shapes that do not
/// match are classified as `Other` instead of guessed at.
fn classify(name: &str, args: Option<serde_json::Value>) -> TraceEventKind {
    let Some(args) = args else {
        return TraceEventKind::Other;
    };
    match name {
        "thread_name" => match serde_json::from_value::<ThreadNameArgs>(args) {
            Ok(a) => TraceEventKind::ThreadName(a.name),
            Err(err) => {
                tracing::debug!("ignoring malformed thread_name args: {err}");
                TraceEventKind::Other
            }
        },
        "Profile" => match serde_json::from_value::<SnapshotArgs>(args) {
            Ok(a) => TraceEventKind::Profile(ProfilePayload::Snapshot {
                nodes: into_call_nodes(a.data.nodes),
            }),
            Err(err) => {
                tracing::debug!("ignoring malformed Profile args: {err}");
                TraceEventKind::Other
            }
        },
        "ProfileChunk" => match serde_json::from_value::<ChunkArgs>(args) {
            Ok(a) => TraceEventKind::Profile(ProfilePayload::Chunk {
                nodes: into_call_nodes(a.data.cpu_profile.nodes),
                samples: a.data.cpu_profile.samples,
                time_deltas: a.data.time_deltas,
            }),
            Err(err) => {
                tracing::debug!("ignoring malformed ProfileChunk args: {err}");
                TraceEventKind::Other
            }
        },
        _ => TraceEventKind::Other,
    }
}

impl From<RawTraceEvent> for TraceEvent {
    fn from(raw: RawTraceEvent) -> Self {
        let kind = classify(&raw.name, raw.args);
        Self {
            name: raw.name,
            thread_id: ThreadId(raw.tid),
            kind,
        }
    }
}

impl TraceEvent {
    pub fn thread_name(thread_id: ThreadId, name: impl Into<String>) -> Self {
        Self {
            name: "thread_name".to_string(),
            thread_id,
            kind: TraceEventKind::ThreadName(name.into()),
        }
    }

    pub fn snapshot(thread_id: ThreadId, nodes: Vec<CallNode>) -> Self {
        Self {
            name: "Profile".to_string(),
            thread_id,
            kind: TraceEventKind::Profile(ProfilePayload::Snapshot { nodes }),
        }
    }

    pub fn chunk(
        thread_id: ThreadId,
        nodes: Vec<CallNode>,
        samples: Vec<u64>,
        time_deltas: Vec<i64>,
    ) -> Self {
        Self {
            name: "ProfileChunk".to_string(),
            thread_id,
            kind: TraceEventKind::Profile(ProfilePayload::Chunk {
                nodes,
                samples,
                time_deltas,
            }),
        }
    }

    /// Express a direct `Profiler.stop` result as the snapshot + chunk pair
    /// that trace mode would have delivered, so both modes share one
    /// reconstruction path.
    pub fn from_cpu_profile(thread_id: ThreadId, profile: CpuProfile) -> [Self; 2] {
        [
            Self::snapshot(thread_id, into_call_nodes(profile.nodes)),
            Self::chunk(thread_id, Vec::new(), profile.samples, profile.time_deltas),
        ]
    }

    pub fn is_profile(&self) -> bool {
        matches!(self.kind, TraceEventKind::Profile(_))
    }
}
