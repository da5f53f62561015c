use crossbeam_channel::{Receiver, bounded};
use thiserror::Error;
use wasmprof_protocol::{ProtocolEvent, SessionId, TargetInfo};

use crate::backend::{ProfilerBackend, ProtocolError};
use crate::model::ThreadId;
use crate::registry::{AttachmentState, TargetRegistry};

/// One step of the attach-and-enable handshake, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStep {
    Attach,
    EnableRuntime,
    EnableProfiler,
    StartProfiler,
}

impl std::fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Attach => write!(f, "attach"),
            Self::EnableRuntime => write!(f, "enable runtime"),
            Self::EnableProfiler => write!(f, "enable profiler"),
            Self::StartProfiler => write!(f, "start profiler"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to {step} on {target}: {source}")]
pub struct AttachmentFailure {
    /// Human label of the candidate.
    pub target: String,
    pub step: HandshakeStep,
    #[source]
    pub source: ProtocolError,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no candidate target could be attached ({} tried)", failures.len())]
    NoTargetAvailable { failures: Vec<AttachmentFailure> },
}

/// A target with a running profiler and a routed event channel.
#[derive(Debug)]
pub struct AttachedTarget {
    pub label: String,
    pub thread_id: ThreadId,
    pub session: SessionId,
    pub events: Receiver<ProtocolEvent>,
}

#[derive(Debug)]
pub struct Resolution {
    pub attached: AttachedTarget,
    /// Candidates tried and skipped before `attached` succeeded.
    pub failures: Vec<AttachmentFailure>,
}

/// Picks the target to profile when the profiling surface can only attach
/// to one target at a time.
#[derive(Debug, Clone)]
pub struct TargetResolver {
    candidate_kinds: Vec<String>,
    channel_capacity: usize,
}

impl TargetResolver {
    pub fn new(candidate_kinds: Vec<String>, channel_capacity: usize) -> Self {
        Self {
            candidate_kinds,
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Candidates among `targets`, in their original order.
    pub fn candidates<'t>(&self, targets: &'t [TargetInfo]) -> Vec<&'t TargetInfo> {
        targets
            .iter()
            .filter(|t| self.candidate_kinds.iter().any(|k| *k == t.kind))
            .collect()
    }

    /// Try each candidate in order; the first complete handshake wins. A
    /// failed candidate is logged and never retried.
    pub fn resolve<B: ProfilerBackend + ?Sized>(
        &self,
        backend: &mut B,
        candidates: &[&TargetInfo],
        registry: &mut TargetRegistry,
    ) -> Result<Resolution, ResolveError> {
        let mut failures = Vec::new();
        for target in candidates {
            let label = target.label();
            let thread_id = registry.allocate(label.clone());
            match self.handshake(backend, target, &label) {
                Ok((session, events)) => {
                    tracing::info!(candidate = %label, %session, "attached to {}", target.kind);
                    registry.set_attachment(thread_id, AttachmentState::Attached(session.clone()));
                    return Ok(Resolution {
                        attached: AttachedTarget {
                            label,
                            thread_id,
                            session,
                            events,
                        },
                        failures,
                    });
                }
                Err(failure) => {
                    tracing::warn!("{failure}");
                    registry.set_attachment(thread_id, AttachmentState::Failed(failure.to_string()));
                    failures.push(failure);
                }
            }
        }
        Err(ResolveError::NoTargetAvailable { failures })
    }

    /// Profile the primary target instead, after resolution found nothing.
    pub fn attach_primary<B: ProfilerBackend + ?Sized>(
        &self,
        backend: &mut B,
        registry: &mut TargetRegistry,
    ) -> Result<AttachedTarget, AttachmentFailure> {
        const LABEL: &str = "Main thread";
        let fail = |step, source| AttachmentFailure {
            target: LABEL.to_string(),
            step,
            source,
        };

        let session = backend
            .primary_session()
            .map_err(|e| fail(HandshakeStep::Attach, e))?;
        let (tx, events) = bounded(self.channel_capacity);
        backend.subscribe(&session, tx);
        backend
            .enable_profiler(&session)
            .map_err(|e| fail(HandshakeStep::EnableProfiler, e))?;
        backend
            .start_profiler(&session)
            .map_err(|e| fail(HandshakeStep::StartProfiler, e))?;

        let thread_id = registry.allocate(LABEL);
        registry.set_attachment(thread_id, AttachmentState::Attached(session.clone()));
        tracing::info!(%session, "profiling primary target");
        Ok(AttachedTarget {
            label: LABEL.to_string(),
            thread_id,
            session,
            events,
        })
    }

    fn handshake<B: ProfilerBackend + ?Sized>(
        &self,
        backend: &mut B,
        target: &TargetInfo,
        label: &str,
    ) -> Result<(SessionId, Receiver<ProtocolEvent>), AttachmentFailure> {
        let fail = |step, source| AttachmentFailure {
            target: label.to_string(),
            step,
            source,
        };

        let session = backend
            .attach(&target.target_id)
            .map_err(|e| fail(HandshakeStep::Attach, e))?;
        // Subscribe before enabling so no early console event is lost.
        let (tx, events) = bounded(self.channel_capacity);
        backend.subscribe(&session, tx);
        backend
            .enable_runtime(&session)
            .map_err(|e| fail(HandshakeStep::EnableRuntime, e))?;
        backend
            .enable_profiler(&session)
            .map_err(|e| fail(HandshakeStep::EnableProfiler, e))?;
        backend
            .start_profiler(&session)
            .map_err(|e| fail(HandshakeStep::StartProfiler, e))?;
        Ok((session, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::Sender;
    use std::collections::HashMap;
    use wasmprof_protocol::{CpuProfile, TargetId};

    /// Scripted backend: each target id may fail at one handshake step.
    #[derive(Default)]
    struct Scripted {
        fail_at: HashMap<String, HandshakeStep>,
        primary_fails: bool,
        calls: Vec<String>,
        subscribers: Vec<(SessionId, Sender<ProtocolEvent>)>,
    }

    impl Scripted {
        fn check(&mut self, session: &SessionId, step: HandshakeStep) -> Result<(), ProtocolError> {
            self.calls.push(format!("{step} {session}"));
            match self.fail_at.get(&session.0) {
                Some(s) if *s == step => Err(ProtocolError::new(step.to_string(), "target closed")),
                _ => Ok(()),
            }
        }
    }

    impl ProfilerBackend for Scripted {
        fn targets(&mut self) -> Result<Vec<TargetInfo>, ProtocolError> {
            Ok(vec![])
        }
        fn attach(&mut self, target: &TargetId) -> Result<SessionId, ProtocolError> {
            let session = SessionId(target.0.clone());
            self.check(&session, HandshakeStep::Attach)?;
            Ok(session)
        }
        fn subscribe(&mut self, session: &SessionId, events: Sender<ProtocolEvent>) {
            self.subscribers.push((session.clone(), events));
        }
        fn enable_runtime(&mut self, session: &SessionId) -> Result<(), ProtocolError> {
            self.check(session, HandshakeStep::EnableRuntime)
        }
        fn enable_profiler(&mut self, session: &SessionId) -> Result<(), ProtocolError> {
            self.check(session, HandshakeStep::EnableProfiler)
        }
        fn start_profiler(&mut self, session: &SessionId) -> Result<(), ProtocolError> {
            self.check(session, HandshakeStep::StartProfiler)
        }
        fn stop_profiler(&mut self, _session: &SessionId) -> Result<CpuProfile, ProtocolError> {
            Ok(CpuProfile::default())
        }
        fn primary_session(&mut self) -> Result<SessionId, ProtocolError> {
            if self.primary_fails {
                Err(ProtocolError::new("Target.attachToTarget", "no page"))
            } else {
                Ok(SessionId("page".into()))
            }
        }
    }

    fn target(id: &str, kind: &str) -> TargetInfo {
        TargetInfo {
            target_id: TargetId(id.into()),
            kind: kind.into(),
            title: String::new(),
            url: format!("http://localhost:8080/{id}.js"),
        }
    }

    fn resolver() -> TargetResolver {
        TargetResolver::new(vec!["worker".into(), "service_worker".into()], 16)
    }

    #[test]
    fn candidates_filter_by_kind_and_keep_order() {
        let targets = vec![
            target("page", "page"),
            target("sw", "service_worker"),
            target("w", "worker"),
            target("ext", "background_page"),
        ];
        let ids: Vec<_> = resolver()
            .candidates(&targets)
            .iter()
            .map(|t| t.target_id.0.as_str())
            .collect();
        assert_eq!(ids, vec!["sw", "w"]);
    }

    #[test]
    fn falls_back_to_next_candidate() {
        let mut backend = Scripted::default();
        backend
            .fail_at
            .insert("workerA".into(), HandshakeStep::EnableProfiler);
        let targets = [target("workerA", "worker"), target("workerB", "worker")];
        let candidates: Vec<_> = targets.iter().collect();
        let mut registry = TargetRegistry::new();

        let resolution = resolver()
            .resolve(&mut backend, &candidates, &mut registry)
            .unwrap();

        assert_eq!(resolution.attached.session, SessionId("workerB".into()));
        assert_eq!(resolution.attached.label, "workerB.js");
        assert_eq!(resolution.failures.len(), 1);
        assert_eq!(resolution.failures[0].step, HandshakeStep::EnableProfiler);
        // workerA's chain stopped at the failing step and was not retried.
        assert_eq!(
            backend.calls,
            vec![
                "attach workerA",
                "enable runtime workerA",
                "enable profiler workerA",
                "attach workerB",
                "enable runtime workerB",
                "enable profiler workerB",
                "start profiler workerB",
            ]
        );
        assert!(matches!(
            registry.attachment(resolution.attached.thread_id),
            AttachmentState::Attached(_)
        ));
    }

    #[test]
    fn exhausting_candidates_reports_every_failure() {
        let mut backend = Scripted::default();
        backend.fail_at.insert("a".into(), HandshakeStep::Attach);
        backend.fail_at.insert("b".into(), HandshakeStep::StartProfiler);
        let targets = [target("a", "worker"), target("b", "worker")];
        let candidates: Vec<_> = targets.iter().collect();
        let mut registry = TargetRegistry::new();

        let err = resolver()
            .resolve(&mut backend, &candidates, &mut registry)
            .unwrap_err();
        let ResolveError::NoTargetAvailable { failures } = err;
        let steps: Vec<_> = failures.iter().map(|f| f.step).collect();
        assert_eq!(steps, vec![HandshakeStep::Attach, HandshakeStep::StartProfiler]);
    }

    #[test]
    fn subscription_is_keyed_by_session() {
        let mut backend = Scripted::default();
        let targets = [target("w", "worker")];
        let candidates: Vec<_> = targets.iter().collect();
        let mut registry = TargetRegistry::new();
        let resolution = resolver()
            .resolve(&mut backend, &candidates, &mut registry)
            .unwrap();

        let (session, tx) = &backend.subscribers[0];
        assert_eq!(session, &resolution.attached.session);
        tx.send(ProtocolEvent::TracingComplete).unwrap();
        assert_eq!(
            resolution.attached.events.try_recv().ok(),
            Some(ProtocolEvent::TracingComplete)
        );
    }

    #[test]
    fn primary_fallback() {
        let mut registry = TargetRegistry::new();
        let attached = resolver()
            .attach_primary(&mut Scripted::default(), &mut registry)
            .unwrap();
        assert_eq!(attached.session, SessionId("page".into()));
        assert_eq!(registry.resolve_name(attached.thread_id), "Main thread");

        let mut broken = Scripted {
            primary_fails: true,
            ..Scripted::default()
        };
        let failure = resolver()
            .attach_primary(&mut broken, &mut registry)
            .unwrap_err();
        assert_eq!(failure.step, HandshakeStep::Attach);
    }
}
