use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, bounded};
use thiserror::Error;
use wasmprof_protocol::{ProtocolEvent, TargetInfo};

use crate::aggregate::aggregate;
use crate::backend::{ProfilerBackend, TracingBackend};
use crate::buffer::{Completion, Drain, EventBuffer, FrozenBuffer, deadline_after};
use crate::config::Config;
use crate::error::Degradation;
use crate::model::TraceEvent;
use crate::parsers::LoadedTrace;
use crate::reconstruct::reconstruct_all;
use crate::registry::TargetRegistry;
use crate::report::{Report, SkippedThread, TargetReport, summarize_wasm_events};
use crate::resolver::{AttachedTarget, ResolveError, TargetResolver};

/// Lifecycle of one profiling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Discovering,
    Attaching,
    Profiling,
    Collecting,
    Aggregated,
    Failed,
}

impl SessionState {
    /// Attach mode walks every state in declaration order. Trace mode and
    /// offline replay skip straight from `Idle`. `Failed` recovers into a
    /// degraded `Profiling` on the primary target, or ends the session
    /// when there is nothing left to profile.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Discovering | Profiling | Collecting | Failed)
                | (Discovering, Attaching | Failed)
                | (Attaching, Profiling | Failed)
                | (Profiling, Collecting)
                | (Collecting, Aggregated)
                | (Failed, Profiling | Aggregated)
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("invalid session transition {from} -> {to}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },
}

/// Drives discovery, attachment, profiling, collection and aggregation
/// against the collaborator traits. Every run ends in `Aggregated` with a
/// report; problems along the way become degradations on it.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    config: Config,
    registry: TargetRegistry,
    degradations: Vec<Degradation>,
    history: Vec<SessionState>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            state: SessionState::Idle,
            config,
            registry: TargetRegistry::new(),
            degradations: Vec::new(),
            history: vec![SessionState::Idle],
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(from = %self.state, to = %next, "session transition");
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    fn advance(&mut self, next: SessionState) {
        if let Err(err) = self.transition(next) {
            tracing::error!("{err}");
        }
    }

    /// Profile one candidate target of `targets` for `duration`, falling back
    /// to the primary target when no candidate can be attached.
    pub fn run_attached<B: ProfilerBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        targets: &[TargetInfo],
        duration: Duration,
    ) -> Report {
        self.advance(SessionState::Discovering);
        let resolver = TargetResolver::new(
            self.config.candidate_kinds.clone(),
            self.config.channel_capacity,
        );
        let candidates = resolver.candidates(targets);
        tracing::info!(
            targets = targets.len(),
            candidates = candidates.len(),
            "discovered targets"
        );

        let attached = if candidates.is_empty() {
            self.advance(SessionState::Failed);
            None
        } else {
            self.advance(SessionState::Attaching);
            match resolver.resolve(backend, &candidates, &mut self.registry) {
                Ok(resolution) => {
                    self.degradations
                        .extend(resolution.failures.iter().map(Degradation::from));
                    Some(resolution.attached)
                }
                Err(ResolveError::NoTargetAvailable { failures }) => {
                    self.degradations
                        .extend(failures.iter().map(Degradation::from));
                    self.advance(SessionState::Failed);
                    None
                }
            }
        };

        let attached = match attached {
            Some(attached) => attached,
            None => {
                self.degradations.push(Degradation::NoTargetAvailable);
                match resolver.attach_primary(backend, &mut self.registry) {
                    Ok(attached) => attached,
                    Err(failure) => {
                        tracing::error!("{failure}");
                        self.degradations.push(Degradation::ProfilerUnavailable {
                            reason: failure.to_string(),
                        });
                        self.advance(SessionState::Aggregated);
                        return self.take_report();
                    }
                }
            }
        };

        self.advance(SessionState::Profiling);
        let mut buffer = EventBuffer::new();
        wait_profiling(&mut buffer, &attached.events, duration);

        self.advance(SessionState::Collecting);
        let frozen = self.stop_attached(backend, &attached, buffer);
        self.finish(frozen)
    }

    fn stop_attached<B: ProfilerBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        attached: &AttachedTarget,
        mut buffer: EventBuffer,
    ) -> FrozenBuffer {
        match backend.stop_profiler(&attached.session) {
            Ok(profile) => {
                tracing::info!(
                    target_name = %attached.label,
                    samples = profile.samples.len(),
                    nodes = profile.nodes.len(),
                    "profiler stopped"
                );
                for event in TraceEvent::from_cpu_profile(attached.thread_id, profile) {
                    buffer.ingest(event);
                }
            }
            Err(err) => {
                tracing::error!(target_name = %attached.label, "{err}");
                self.degradations.push(Degradation::ProfilerUnavailable {
                    reason: err.to_string(),
                });
            }
        }
        // Console messages that raced the stop call.
        for event in attached.events.try_iter() {
            buffer.ingest_protocol(event);
        }
        // The stop result is the completion signal in attach mode.
        buffer.freeze(Completion::Signalled)
    }

    /// Trace every thread for `duration`, then collect until the tracer
    /// signals completion or the collection window runs out.
    pub fn run_traced<B: TracingBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        duration: Duration,
    ) -> Report {
        let (tx, events) = bounded(self.config.channel_capacity.max(1));
        if let Err(err) = backend.start_tracing(
            &self.config.trace_categories,
            &self.config.trace_options(),
            tx,
        ) {
            tracing::error!("{err}");
            self.advance(SessionState::Failed);
            self.degradations.push(Degradation::ProfilerUnavailable {
                reason: err.to_string(),
            });
            self.advance(SessionState::Aggregated);
            return self.take_report();
        }

        self.advance(SessionState::Profiling);
        let mut buffer = EventBuffer::new();
        let drain = wait_profiling(&mut buffer, &events, duration);

        self.advance(SessionState::Collecting);
        let frozen = if drain == Drain::Completed {
            buffer.freeze(Completion::Signalled)
        } else {
            if let Err(err) = backend.end_tracing() {
                tracing::warn!("{err}");
            }
            buffer.collect(&events, self.config.collection_timeout)
        };
        self.finish(frozen)
    }

    /// Rank a previously saved trace or CPU profile. `label` names the
    /// profiled target when the artifact carries no thread names.
    pub fn replay(&mut self, loaded: LoadedTrace, label: &str) -> Report {
        self.advance(SessionState::Collecting);
        let mut buffer = EventBuffer::new();
        match loaded {
            LoadedTrace::Trace(events) => {
                for event in events {
                    buffer.ingest(event);
                }
            }
            LoadedTrace::CpuProfile(profile) => {
                let thread_id = self.registry.allocate(label);
                for event in TraceEvent::from_cpu_profile(thread_id, profile) {
                    buffer.ingest(event);
                }
            }
        }
        self.finish(buffer.freeze(Completion::Signalled))
    }

    fn finish(&mut self, frozen: FrozenBuffer) -> Report {
        let mut report = Report::default();

        match frozen.completion() {
            Completion::Signalled => {}
            Completion::TimedOut => self.degradations.push(Degradation::IncompleteData {
                window: self.config.collection_timeout,
            }),
            Completion::Disconnected => self.degradations.push(Degradation::ChannelClosed {
                events: frozen.events().len(),
            }),
        }

        for target in reconstruct_all(&frozen, &mut self.registry) {
            if self.config.skips(&target.display_name) {
                tracing::info!(thread = %target.thread_id, thread_name = %target.display_name, "skipping thread");
                report.skipped.push(SkippedThread {
                    thread_id: target.thread_id,
                    display_name: target.display_name,
                    reason: "in skip list".to_string(),
                });
                continue;
            }
            let aggregation = aggregate(&target, self.config.top_n);
            if aggregation.dangling_samples > 0 {
                tracing::warn!(
                    thread = %target.thread_id,
                    samples = aggregation.dangling_samples,
                    "samples reference unknown nodes"
                );
                self.degradations.push(Degradation::DanglingNodeReference {
                    thread_id: target.thread_id,
                    samples: aggregation.dangling_samples,
                    micros: aggregation.dangling_micros,
                });
            }
            report.targets.push(TargetReport {
                thread_id: target.thread_id,
                display_name: target.display_name,
                aggregation,
            });
        }

        if report.is_empty() {
            self.degradations.push(Degradation::EmptySession);
        }
        if self.config.wasm_summary {
            report.wasm_events = summarize_wasm_events(frozen.events());
        }
        report.console = frozen.console().to_vec();

        self.advance(SessionState::Aggregated);
        report.degradations = std::mem::take(&mut self.degradations);
        report
    }

    fn take_report(&mut self) -> Report {
        Report {
            degradations: std::mem::take(&mut self.degradations),
            ..Report::default()
        }
    }
}

/// Keep ingesting while the profiler runs. A sender that goes away early
/// does not shorten the profiling period.
fn wait_profiling(
    buffer: &mut EventBuffer,
    events: &Receiver<ProtocolEvent>,
    duration: Duration,
) -> Drain {
    let deadline = deadline_after(duration);
    let drain = buffer.drain_until(events, deadline);
    if drain == Drain::Disconnected {
        // Without a representable deadline there is nothing left to wait for.
        if let Some(deadline) = deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            tracing::debug!(?remaining, "event channel closed while profiling");
            std::thread::sleep(remaining);
        }
    }
    drain
}

/// Profile the best candidate among `targets` for `duration`.
pub fn run_session<B: ProfilerBackend + ?Sized>(
    backend: &mut B,
    targets: &[TargetInfo],
    duration: Duration,
    config: Config,
) -> Report {
    Session::new(config).run_attached(backend, targets, duration)
}

/// Like [`run_session`], asking the backend for its target list first. A
/// failed listing is treated as an empty one.
pub fn run_discovered_session<B: ProfilerBackend + ?Sized>(
    backend: &mut B,
    duration: Duration,
    config: Config,
) -> Report {
    let targets = backend.targets().unwrap_or_else(|err| {
        tracing::warn!("{err}");
        Vec::new()
    });
    run_session(backend, &targets, duration, config)
}

/// Trace every thread for `duration` and rank each one that was sampled.
pub fn run_trace_session<B: TracingBackend + ?Sized>(
    backend: &mut B,
    duration: Duration,
    config: Config,
) -> Report {
    Session::new(config).run_traced(backend, duration)
}
