use std::collections::HashMap;

use super::{CallNode, ThreadId};

/// Parallel `(node id, time delta)` sequence. The i-th sample is attributed
/// the i-th delta; both lists always have the same length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleStream {
    samples: Vec<u64>,
    time_deltas: Vec<i64>,
}

impl SampleStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one chunk. Missing deltas count as 0; deltas past the last
    /// sample have nothing to be attributed to and are dropped.
    pub fn push_chunk(&mut self, samples: &[u64], time_deltas: &[i64]) {
        self.samples.extend_from_slice(samples);
        self.time_deltas.extend(
            (0..samples.len()).map(|i| time_deltas.get(i).copied().unwrap_or(0)),
        );
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[u64] {
        &self.samples
    }

    pub fn time_deltas(&self) -> &[i64] {
        &self.time_deltas
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, i64)> + '_ {
        self.samples
            .iter()
            .copied()
            .zip(self.time_deltas.iter().copied())
    }

    /// Sum of all deltas, in microseconds. Widened so that no delta list
    /// can overflow it.
    pub fn total_micros(&self) -> i128 {
        self.time_deltas.iter().map(|&d| i128::from(d)).sum()
    }
}

/// Everything sampled on one thread/target during one profiling session.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfiledTarget {
    pub thread_id: ThreadId,
    pub display_name: String,
    nodes: HashMap<u64, CallNode>,
    pub samples: SampleStream,
    /// `Profile` records seen for this target.
    pub profile_events: usize,
    /// `ProfileChunk` records seen for this target.
    pub chunks: usize,
}

impl ProfiledTarget {
    pub fn new(thread_id: ThreadId, display_name: impl Into<String>) -> Self {
        Self {
            thread_id,
            display_name: display_name.into(),
            nodes: HashMap::new(),
            samples: SampleStream::new(),
            profile_events: 0,
            chunks: 0,
        }
    }

    /// Add a node unless its id is already known. The first record seen for
    /// an id is canonical. Returns whether the node was inserted.
    pub fn insert_node(&mut self, node: CallNode) -> bool {
        match self.nodes.entry(node.id) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(node);
                true
            }
        }
    }

    pub fn node(&self, id: u64) -> Option<&CallNode> {
        self.nodes.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &CallNode> {
        self.nodes.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_delta_list_is_zero_padded() {
        let mut stream = SampleStream::new();
        stream.push_chunk(&[1, 2, 3], &[10]);
        assert_eq!(stream.samples(), &[1, 2, 3]);
        assert_eq!(stream.time_deltas(), &[10, 0, 0]);
        assert_eq!(stream.total_micros(), 10);
    }

    #[test]
    fn surplus_deltas_are_dropped() {
        let mut stream = SampleStream::new();
        stream.push_chunk(&[1], &[10, 20]);
        stream.push_chunk(&[2], &[5]);
        assert_eq!(stream.iter().collect::<Vec<_>>(), vec![(1, 10), (2, 5)]);
    }

    #[test]
    fn chunks_concatenate_in_order() {
        let mut stream = SampleStream::new();
        stream.push_chunk(&[3, 3], &[1, 2]);
        stream.push_chunk(&[], &[]);
        stream.push_chunk(&[1], &[4]);
        assert_eq!(stream.len(), 3);
        assert_eq!(stream.samples(), &[3, 3, 1]);
        assert_eq!(stream.total_micros(), 7);
    }

    #[test]
    fn total_does_not_overflow_on_huge_deltas() {
        let mut stream = SampleStream::new();
        stream.push_chunk(&[1, 1, 1], &[i64::MAX, i64::MAX, 1]);
        assert_eq!(stream.total_micros(), 2 * i128::from(i64::MAX) + 1);
    }

    #[test]
    fn first_seen_node_wins() {
        let mut target = ProfiledTarget::new(ThreadId(1), "worker");
        assert!(target.insert_node(CallNode::new(1, "first")));
        assert!(!target.insert_node(CallNode::new(1, "second")));
        assert_eq!(target.node(1).map(|n| n.function_name.as_str()), Some("first"));
        assert_eq!(target.node_count(), 1);
    }
}
