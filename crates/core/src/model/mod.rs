pub mod event;
pub mod node;
pub mod profile;

pub use event::{ProfilePayload, ThreadId, TraceEvent, TraceEventKind};
pub use node::CallNode;
pub use profile::{ProfiledTarget, SampleStream};
