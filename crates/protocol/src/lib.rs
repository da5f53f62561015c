pub mod cpu_profile;
pub mod event;
pub mod target;
pub mod trace;

pub use cpu_profile::{CallFrame, CpuProfile, ProfileNode};
pub use event::{ConsoleMessage, ProtocolEvent};
pub use target::{SessionId, TargetId, TargetInfo};
pub use trace::{RawTraceEvent, TraceFile};
