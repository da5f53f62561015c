use crate::buffer::FrozenBuffer;
use crate::model::{ProfilePayload, ProfiledTarget, ThreadId, TraceEvent, TraceEventKind};
use crate::registry::TargetRegistry;

/// Rebuild one thread's node table and sample stream from its events, in
/// arrival order.
///
/// Nodes from snapshots and chunks merge first-seen-wins. Chunk samples and
/// deltas are appended pairwise; a short delta list is padded with zeros.
/// Samples may reference ids that never arrive; those are kept and dealt
/// with at aggregation time.
pub fn reconstruct<'a>(
    thread_id: ThreadId,
    display_name: impl Into<String>,
    events: impl IntoIterator<Item = &'a TraceEvent>,
) -> ProfiledTarget {
    let mut target = ProfiledTarget::new(thread_id, display_name);
    let mut collisions = 0usize;

    for event in events {
        if event.thread_id != thread_id {
            continue;
        }
        let TraceEventKind::Profile(payload) = &event.kind else {
            continue;
        };
        match payload {
            ProfilePayload::Snapshot { nodes } => {
                target.profile_events += 1;
                for node in nodes {
                    if !target.insert_node(node.clone()) {
                        collisions += 1;
                    }
                }
            }
            ProfilePayload::Chunk {
                nodes,
                samples,
                time_deltas,
            } => {
                target.chunks += 1;
                for node in nodes {
                    if !target.insert_node(node.clone()) {
                        collisions += 1;
                    }
                }
                if time_deltas.len() != samples.len() {
                    tracing::debug!(
                        %thread_id,
                        samples = samples.len(),
                        deltas = time_deltas.len(),
                        "chunk sample/delta length mismatch"
                    );
                }
                target.samples.push_chunk(samples, time_deltas);
            }
        }
    }

    if collisions > 0 {
        tracing::debug!(%thread_id, collisions, "kept first record for repeated node ids");
    }
    target
}

/// Rebuild every thread of a frozen buffer that carried profile records,
/// ordered by thread id. Thread names seen in the buffer are recorded in
/// `registry` first.
pub fn reconstruct_all(frozen: &FrozenBuffer, registry: &mut TargetRegistry) -> Vec<ProfiledTarget> {
    registry.observe(frozen.events());
    frozen
        .by_thread()
        .into_iter()
        .filter(|(_, events)| events.iter().any(|e| e.is_profile()))
        .map(|(thread_id, events)| {
            reconstruct(thread_id, registry.resolve_name(thread_id), events)
        })
        .collect()
}
