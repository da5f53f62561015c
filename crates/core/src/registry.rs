use std::collections::HashMap;

use wasmprof_protocol::SessionId;

use crate::model::{ThreadId, TraceEvent, TraceEventKind};

/// Whether a debugging session is attached to a target.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttachmentState {
    #[default]
    Unattached,
    Attached(SessionId),
    Failed(String),
}

#[derive(Debug, Default)]
struct Entry {
    name: Option<String>,
    attachment: AttachmentState,
}

/// Maps thread/target ids to display names and attachment state.
///
/// Lookups never fail: unknown ids resolve to a synthesized `Thread {id}`
/// label and `Unattached`.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    entries: HashMap<ThreadId, Entry>,
    next_synthetic: u64,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the display name of a thread. Recording the same name twice is
    /// a no-op; a different name replaces the previous one.
    pub fn record_name(&mut self, thread_id: ThreadId, name: impl Into<String>) {
        self.entries.entry(thread_id).or_default().name = Some(name.into());
    }

    pub fn resolve_name(&self, thread_id: ThreadId) -> String {
        self.entries
            .get(&thread_id)
            .and_then(|e| e.name.clone())
            .unwrap_or_else(|| format!("Thread {thread_id}"))
    }

    /// Record every `thread_name` event of a trace.
    pub fn observe<'a>(&mut self, events: impl IntoIterator<Item = &'a TraceEvent>) {
        for event in events {
            if let TraceEventKind::ThreadName(name) = &event.kind {
                self.record_name(event.thread_id, name.clone());
            }
        }
    }

    /// Hand out an id for a target that has no OS thread id (attach mode).
    pub fn allocate(&mut self, name: impl Into<String>) -> ThreadId {
        self.next_synthetic += 1;
        while self.entries.contains_key(&ThreadId(self.next_synthetic)) {
            self.next_synthetic += 1;
        }
        let id = ThreadId(self.next_synthetic);
        self.record_name(id, name);
        id
    }

    pub fn set_attachment(&mut self, thread_id: ThreadId, state: AttachmentState) {
        self.entries.entry(thread_id).or_default().attachment = state;
    }

    pub fn attachment(&self, thread_id: ThreadId) -> &AttachmentState {
        const UNATTACHED: &AttachmentState = &AttachmentState::Unattached;
        self.entries
            .get(&thread_id)
            .map_or(UNATTACHED, |e| &e.attachment)
    }

    /// All named threads, ordered by id.
    pub fn named_threads(&self) -> Vec<(ThreadId, &str)> {
        let mut named: Vec<_> = self
            .entries
            .iter()
            .filter_map(|(id, e)| e.name.as_deref().map(|n| (*id, n)))
            .collect();
        named.sort_by_key(|(id, _)| *id);
        named
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_thread_gets_fallback_label() {
        let registry = TargetRegistry::new();
        assert_eq!(registry.resolve_name(ThreadId(1234)), "Thread 1234");
        assert_eq!(registry.attachment(ThreadId(1234)), &AttachmentState::Unattached);
    }

    #[test]
    fn last_recorded_name_wins() {
        let mut registry = TargetRegistry::new();
        registry.record_name(ThreadId(7), "DedicatedWorker thread");
        registry.record_name(ThreadId(7), "DedicatedWorker thread");
        assert_eq!(registry.resolve_name(ThreadId(7)), "DedicatedWorker thread");
        registry.record_name(ThreadId(7), "qemu");
        assert_eq!(registry.resolve_name(ThreadId(7)), "qemu");
    }

    #[test]
    fn observe_picks_up_thread_names() {
        let mut registry = TargetRegistry::new();
        registry.observe(&[
            TraceEvent::thread_name(ThreadId(2), "CrRendererMain"),
            TraceEvent::snapshot(ThreadId(3), vec![]),
            TraceEvent::thread_name(ThreadId(3), "DedicatedWorker thread"),
        ]);
        assert_eq!(
            registry.named_threads(),
            vec![
                (ThreadId(2), "CrRendererMain"),
                (ThreadId(3), "DedicatedWorker thread")
            ]
        );
    }

    #[test]
    fn allocate_skips_ids_in_use() {
        let mut registry = TargetRegistry::new();
        registry.record_name(ThreadId(1), "taken");
        let id = registry.allocate("worker.js");
        assert_ne!(id, ThreadId(1));
        assert_eq!(registry.resolve_name(id), "worker.js");
    }

    #[test]
    fn attachment_state_is_tracked() {
        let mut registry = TargetRegistry::new();
        let id = registry.allocate("worker.js");
        registry.set_attachment(id, AttachmentState::Attached(SessionId("S1".into())));
        assert_eq!(
            registry.attachment(id),
            &AttachmentState::Attached(SessionId("S1".into()))
        );
    }
}
