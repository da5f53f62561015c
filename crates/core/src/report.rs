use std::collections::HashMap;
use std::fmt::{self, Write};

use serde::Serialize;
use wasmprof_protocol::ConsoleMessage;

use crate::aggregate::Aggregation;
use crate::error::Degradation;
use crate::model::{ThreadId, TraceEvent};

const PCT_WIDTH: usize = 7;
const TIME_WIDTH: usize = 9;
const NAME_RULE_WIDTH: usize = 60;
const WASM_SUMMARY_LIMIT: usize = 10;

/// Ranked self-time table of one profiled target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub thread_id: ThreadId,
    pub display_name: String,
    pub aggregation: Aggregation,
}

/// A thread that carried samples but was excluded by configuration.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedThread {
    pub thread_id: ThreadId,
    pub display_name: String,
    pub reason: String,
}

/// Counts of trace events whose name mentions wasm, heaviest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WasmEventSummary {
    pub total: usize,
    pub top: Vec<(String, usize)>,
}

/// Outcome of one profiling session: per-target rankings for programmatic
/// use, rendered as text through `Display`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub targets: Vec<TargetReport>,
    pub skipped: Vec<SkippedThread>,
    pub degradations: Vec<Degradation>,
    pub console: Vec<ConsoleMessage>,
    pub wasm_events: Option<WasmEventSummary>,
}

impl Report {
    /// Whether no target produced a single sample.
    pub fn is_empty(&self) -> bool {
        self.targets.iter().all(|t| t.aggregation.is_empty())
    }

    pub fn target(&self, display_name: &str) -> Option<&TargetReport> {
        self.targets.iter().find(|t| t.display_name == display_name)
    }
}

/// `value / divisor` rounded half away from zero.
fn round_div(value: i128, divisor: i128) -> i128 {
    let quotient = value / divisor;
    let remainder = value % divisor;
    if remainder.abs() * 2 >= divisor {
        quotient + remainder.signum()
    } else {
        quotient
    }
}

/// Whole milliseconds, halves rounded away from zero.
fn millis(micros: i128) -> i128 {
    round_div(micros, 1000)
}

fn write_millis(out: &mut impl Write, micros: i128) -> fmt::Result {
    let tenths = round_div(micros, 100);
    let sign = if tenths < 0 { "-" } else { "" };
    let tenths = tenths.abs();
    write!(out, "{sign}{}.{}ms", tenths / 10, tenths % 10)
}

/// Write the ranking table for one aggregation: percentage and milliseconds
/// right-aligned, then the function name and the source file, if known.
fn write_table(out: &mut impl Write, agg: &Aggregation) -> fmt::Result {
    if agg.ranking.is_empty() {
        return writeln!(out, "  No samples collected");
    }

    write!(out, "  Total time: ")?;
    write_millis(out, agg.total_elapsed_micros)?;
    writeln!(out, ", Samples: {}", agg.sample_count)?;
    writeln!(out)?;
    writeln!(
        out,
        "  {:>PCT_WIDTH$}  {:>TIME_WIDTH$}  Function",
        "%Self", "Time(ms)"
    )?;
    writeln!(
        out,
        "  {}  {}  {}",
        "─".repeat(PCT_WIDTH),
        "─".repeat(TIME_WIDTH),
        "─".repeat(NAME_RULE_WIDTH)
    )?;

    for entry in &agg.ranking {
        write!(
            out,
            "  {:>PCT_WIDTH$.1}%  {:>TIME_WIDTH$}  {}",
            entry.percent_of_total,
            millis(entry.self_time_micros),
            entry.node.display_name()
        )?;
        if let Some(file) = entry.node.source_label() {
            write!(out, " [{file}]")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Render one target's ranking under a `=== name ===` heading, followed by
/// the record counts it was rebuilt from.
pub fn format_table(display_name: &str, agg: &Aggregation) -> String {
    let mut out = format!(
        "=== {display_name} ===\n  Profile events: {}, Chunks: {}\n",
        agg.profile_events, agg.chunks
    );
    // Writing into a String cannot fail.
    let _ = write_table(&mut out, agg);
    out
}

/// Count events whose name mentions wasm. `None` when there are none.
pub fn summarize_wasm_events(events: &[TraceEvent]) -> Option<WasmEventSummary> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for event in events {
        if event.name.contains("wasm") || event.name.contains("Wasm") {
            *counts.entry(&event.name).or_default() += 1;
        }
    }
    if counts.is_empty() {
        return None;
    }

    let total = counts.values().sum();
    let mut top: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top.truncate(WASM_SUMMARY_LIMIT);
    Some(WasmEventSummary { total, top })
}

impl fmt::Display for TargetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heading = format!("{} (tid={})", self.display_name, self.thread_id);
        f.write_str(&format_table(&heading, &self.aggregation))
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for skipped in &self.skipped {
            writeln!(
                f,
                "=== {} (tid={}) — SKIPPED ({}) ===",
                skipped.display_name, skipped.thread_id, skipped.reason
            )?;
            writeln!(f)?;
        }

        if self.targets.is_empty() {
            writeln!(f, "No samples collected")?;
        }
        for target in &self.targets {
            writeln!(f, "{target}")?;
        }

        if let Some(wasm) = &self.wasm_events {
            writeln!(f, "=== WASM Events ({}) ===", wasm.total)?;
            for (name, count) in &wasm.top {
                writeln!(f, "  {count}x {name}")?;
            }
            writeln!(f)?;
        }

        if !self.console.is_empty() {
            writeln!(f, "=== Console ({} messages) ===", self.console.len())?;
            for message in &self.console {
                writeln!(f, "  [{}] {}", message.level, message.text)?;
            }
            writeln!(f)?;
        }

        if !self.degradations.is_empty() {
            writeln!(f, "=== Notes ===")?;
            for degradation in &self.degradations {
                writeln!(f, "  - {degradation}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{DEFAULT_TOP_N, aggregate};
    use crate::model::{CallNode, ProfiledTarget};

    fn sample_aggregation() -> Aggregation {
        let mut target = ProfiledTarget::new(ThreadId(3), "DedicatedWorker thread");
        target.insert_node(
            CallNode::new(1, "cpu_tb_exec").with_url("http://localhost:8080/qemu-system-arm.wasm"),
        );
        target.insert_node(CallNode::new(2, ""));
        target.samples.push_chunk(&[1, 2, 1], &[20_000, 5_000, 5_000]);
        aggregate(&target, DEFAULT_TOP_N)
    }

    #[test]
    fn table_columns_are_fixed_width() {
        let text = format_table("DedicatedWorker thread", &sample_aggregation());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "=== DedicatedWorker thread ===");
        assert_eq!(lines[1], "  Profile events: 0, Chunks: 0");
        assert_eq!(lines[2], "  Total time: 30.0ms, Samples: 3");
        assert_eq!(lines[4], "    %Self   Time(ms)  Function");
        assert_eq!(
            lines[6],
            "     83.3%         25  cpu_tb_exec [qemu-system-arm.wasm]"
        );
        assert_eq!(lines[7], "     16.7%          5  (anonymous)");
    }

    #[test]
    fn half_milliseconds_round_away_from_zero() {
        let mut target = ProfiledTarget::new(ThreadId(1), "worker");
        target.insert_node(CallNode::new(1, "f"));
        target.insert_node(CallNode::new(2, "g"));
        target.samples.push_chunk(&[1, 2], &[2_500, 500]);
        let text = format_table("worker", &aggregate(&target, DEFAULT_TOP_N));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[2], "  Total time: 3.0ms, Samples: 2");
        assert_eq!(lines[6], "     83.3%          3  f");
        assert_eq!(lines[7], "     16.7%          1  g");

        assert_eq!(millis(1_499), 1);
        assert_eq!(millis(-2_500), -3);
        let mut total = String::new();
        write_millis(&mut total, 50).unwrap();
        assert_eq!(total, "0.1ms");
        total.clear();
        write_millis(&mut total, -250).unwrap();
        assert_eq!(total, "-0.3ms");
    }

    #[test]
    fn target_display_shares_the_table_layout() {
        let agg = sample_aggregation();
        let target = TargetReport {
            thread_id: ThreadId(3),
            display_name: "DedicatedWorker thread".into(),
            aggregation: agg.clone(),
        };
        assert_eq!(
            target.to_string(),
            format_table("DedicatedWorker thread (tid=3)", &agg)
        );
    }

    #[test]
    fn empty_ranking_prints_explicit_line() {
        let target = ProfiledTarget::new(ThreadId(3), "idle");
        let text = format_table("idle", &aggregate(&target, DEFAULT_TOP_N));
        assert!(text.contains("No samples collected"));
        assert!(!text.contains("%Self"));
    }

    #[test]
    fn wasm_summary_counts_and_orders() {
        let t = ThreadId(1);
        let mut events = Vec::new();
        for name in [
            "wasm.CompileLazy",
            "v8.wasm.streamingCompile",
            "wasm.CompileLazy",
            "WasmCode",
            "ProfileChunk",
        ] {
            let mut event = TraceEvent::thread_name(t, "x");
            event.name = name.to_string();
            events.push(event);
        }
        let summary = summarize_wasm_events(&events).unwrap();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.top[0], ("wasm.CompileLazy".to_string(), 2));
        assert_eq!(summary.top.len(), 3);

        assert!(summarize_wasm_events(&events[4..]).is_none());
    }

    #[test]
    fn report_lists_sections_and_notes() {
        let report = Report {
            targets: vec![TargetReport {
                thread_id: ThreadId(3),
                display_name: "DedicatedWorker thread".into(),
                aggregation: sample_aggregation(),
            }],
            skipped: vec![SkippedThread {
                thread_id: ThreadId(1),
                display_name: "CrRendererMain".into(),
                reason: "main thread".into(),
            }],
            degradations: vec![Degradation::NoTargetAvailable],
            console: vec![],
            wasm_events: None,
        };
        let text = report.to_string();
        assert!(text.contains("=== CrRendererMain (tid=1) — SKIPPED (main thread) ==="));
        assert!(text.contains("=== DedicatedWorker thread (tid=3) ==="));
        assert!(text.contains("=== Notes ===\n  - no candidate target could be attached"));
        assert!(!report.is_empty());
    }

    #[test]
    fn report_without_targets_says_so() {
        let report = Report::default();
        assert!(report.is_empty());
        assert!(report.to_string().starts_with("No samples collected"));
    }
}
