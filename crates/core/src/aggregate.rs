use std::collections::HashMap;

use serde::Serialize;

use crate::model::{CallNode, ProfiledTarget};

pub const DEFAULT_TOP_N: usize = 30;

/// A single row of the self-time ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    pub node: CallNode,
    pub self_time_micros: i128,
    pub percent_of_total: f64,
}

/// Self-time picture of one profiled target.
///
/// Sums are `i128`: deltas come from untrusted input and any number of
/// `i64` values must add up exactly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregation {
    /// Sum of every delta, dangling samples included.
    pub total_elapsed_micros: i128,
    pub sample_count: usize,
    /// Samples whose node id never arrived in the node table.
    pub dangling_samples: usize,
    pub dangling_micros: i128,
    /// `Profile` records the target was rebuilt from.
    pub profile_events: usize,
    pub chunks: usize,
    /// Descending self time, ties by ascending node id, at most `top_n` rows.
    pub ranking: Vec<RankingEntry>,
}

impl Aggregation {
    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }
}

/// `part / total * 100`, or 0 when nothing was sampled.
pub fn percent_of(part: i128, total: i128) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Sum deltas by node id and rank the result.
pub fn aggregate(target: &ProfiledTarget, top_n: usize) -> Aggregation {
    let mut by_id: HashMap<u64, i128> = HashMap::new();
    let mut dangling_samples = 0;
    let mut dangling_micros = 0i128;

    for (node_id, delta) in target.samples.iter() {
        let delta = i128::from(delta);
        if target.node(node_id).is_some() {
            *by_id.entry(node_id).or_default() += delta;
        } else {
            dangling_samples += 1;
            dangling_micros += delta;
        }
    }

    let total_elapsed_micros = target.samples.total_micros();

    let mut ranked: Vec<(u64, i128)> = by_id.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(top_n);

    let ranking = ranked
        .into_iter()
        .filter_map(|(id, self_time_micros)| {
            target.node(id).map(|node| RankingEntry {
                node: node.clone(),
                self_time_micros,
                percent_of_total: percent_of(self_time_micros, total_elapsed_micros),
            })
        })
        .collect();

    Aggregation {
        total_elapsed_micros,
        sample_count: target.samples.len(),
        dangling_samples,
        dangling_micros,
        profile_events: target.profile_events,
        chunks: target.chunks,
        ranking,
    }
}
