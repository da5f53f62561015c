use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use wasmprof_protocol::{ConsoleMessage, ProtocolEvent};

use crate::model::{ThreadId, TraceEvent};

/// How a collection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// An explicit end-of-trace signal (or the profiler's stop result) arrived.
    Signalled,
    /// The collection window elapsed first.
    TimedOut,
    /// Every sender went away before the signal.
    Disconnected,
}

/// Why a drain returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    Completed,
    DeadlineReached,
    Disconnected,
}

/// Append-only, order-preserving store of everything delivered on one
/// session until the session is declared complete.
#[derive(Debug, Default)]
pub struct EventBuffer {
    events: Vec<TraceEvent>,
    console: Vec<ConsoleMessage>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Ingest one delivered protocol event. Returns `true` on the completion
    /// signal.
    pub fn ingest_protocol(&mut self, event: ProtocolEvent) -> bool {
        match event {
            ProtocolEvent::TraceBatch(batch) => {
                self.events.extend(batch.into_iter().map(TraceEvent::from));
                false
            }
            ProtocolEvent::Console(message) => {
                self.console.push(message);
                false
            }
            ProtocolEvent::TracingComplete => true,
        }
    }

    /// Pull events until the completion signal, the deadline, or the sender
    /// disconnecting, whichever comes first. Without a deadline only the
    /// signal or a disconnect ends the drain.
    pub fn drain_until(
        &mut self,
        events: &Receiver<ProtocolEvent>,
        deadline: Option<Instant>,
    ) -> Drain {
        loop {
            let received = match deadline {
                Some(deadline) => events.recv_deadline(deadline),
                None => events.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(event) => {
                    if self.ingest_protocol(event) {
                        return Drain::Completed;
                    }
                }
                Err(RecvTimeoutError::Timeout) => return Drain::DeadlineReached,
                Err(RecvTimeoutError::Disconnected) => return Drain::Disconnected,
            }
        }
    }

    /// Collect until the completion signal or until `window` elapses, then
    /// freeze. Running out of time is not an error; whatever arrived is kept.
    pub fn collect(mut self, events: &Receiver<ProtocolEvent>, window: Duration) -> FrozenBuffer {
        let completion = match self.drain_until(events, deadline_after(window)) {
            Drain::Completed => Completion::Signalled,
            Drain::DeadlineReached => {
                tracing::warn!(
                    ?window,
                    events = self.events.len(),
                    "trace did not complete in time, keeping partial data"
                );
                Completion::TimedOut
            }
            Drain::Disconnected => {
                tracing::warn!(
                    events = self.events.len(),
                    "event channel closed before the trace completed, keeping partial data"
                );
                Completion::Disconnected
            }
        };
        self.freeze(completion)
    }

    pub fn freeze(self, completion: Completion) -> FrozenBuffer {
        tracing::debug!(
            events = self.events.len(),
            console = self.console.len(),
            ?completion,
            "event buffer frozen"
        );
        FrozenBuffer {
            events: self.events,
            console: self.console,
            completion,
        }
    }
}

/// `now + window`, or `None` when that instant is not representable, which
/// callers treat as no deadline at all.
pub fn deadline_after(window: Duration) -> Option<Instant> {
    Instant::now().checked_add(window)
}

/// A completed, read-only event buffer.
#[derive(Debug)]
pub struct FrozenBuffer {
    events: Vec<TraceEvent>,
    console: Vec<ConsoleMessage>,
    completion: Completion,
}

impl FrozenBuffer {
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn console(&self) -> &[ConsoleMessage] {
        &self.console
    }

    pub fn completion(&self) -> Completion {
        self.completion
    }

    /// Events grouped by thread, arrival order kept within each thread.
    pub fn by_thread(&self) -> BTreeMap<ThreadId, Vec<&TraceEvent>> {
        let mut grouped: BTreeMap<ThreadId, Vec<&TraceEvent>> = BTreeMap::new();
        for event in &self.events {
            grouped.entry(event.thread_id).or_default().push(event);
        }
        grouped
    }
}
