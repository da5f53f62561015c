use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use wasmprof_core::model::TraceEventKind;
use wasmprof_core::registry::TargetRegistry;
use wasmprof_core::{Config, LoadedTrace, Session, parse_auto};

const DEFAULT_CONFIG: &str = "wasmprof.toml";

#[derive(Parser)]
#[command(name = "wasmprof")]
#[command(about = "self-time ranking for saved browser traces and CPU profiles")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rank functions by self time in a saved trace or .cpuprofile.
    Analyze {
        file: PathBuf,

        #[arg(long, help = "rows per ranking")]
        top: Option<usize>,

        #[arg(long, help = "configuration file path (toml format)")]
        config: Option<PathBuf>,

        #[arg(long = "skip-thread", value_name = "NAME", help = "report this thread as skipped")]
        skip_threads: Vec<String>,

        #[arg(long, help = "print the report as JSON")]
        json: bool,

        #[arg(long, help = "omit the wasm trace event summary")]
        no_wasm_summary: bool,
    },
    /// List the threads named in a saved trace.
    Targets { file: PathBuf },
}

fn load(path: &Path) -> Result<LoadedTrace> {
    let data = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_auto(&data).with_context(|| format!("failed to parse {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config path={}", path.display())),
        None => Ok(Config::load_optional(Path::new(DEFAULT_CONFIG))),
    }
}

fn analyze(
    file: &Path,
    mut config: Config,
    top: Option<usize>,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    if let Some(top) = top {
        config.top_n = top;
    }
    let loaded = load(file)?;
    let label = file
        .file_name()
        .map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().into_owned());

    let report = Session::new(config).replay(loaded, &label);
    for degradation in &report.degradations {
        tracing::warn!("{degradation}");
    }

    if json {
        serde_json::to_writer_pretty(&mut *out, &report)?;
        writeln!(out)?;
    } else {
        write!(out, "{report}")?;
    }
    Ok(())
}

fn list_targets(file: &Path, out: &mut impl Write) -> Result<()> {
    let events = match load(file)? {
        LoadedTrace::Trace(events) => events,
        LoadedTrace::CpuProfile(profile) => {
            writeln!(
                out,
                "single-target CPU profile ({} nodes, {} samples)",
                profile.nodes.len(),
                profile.samples.len()
            )?;
            return Ok(());
        }
    };

    let mut registry = TargetRegistry::new();
    registry.observe(&events);
    for (thread_id, name) in registry.named_threads() {
        let profiled = events
            .iter()
            .any(|e| e.thread_id == thread_id && matches!(e.kind, TraceEventKind::Profile(_)));
        let marker = if profiled { "  (profiled)" } else { "" };
        writeln!(out, "{thread_id:>8}  {name}{marker}")?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match args.command {
        Command::Analyze {
            file,
            top,
            config,
            skip_threads,
            json,
            no_wasm_summary,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            cfg.skip_threads.extend(skip_threads);
            if no_wasm_summary {
                cfg.wasm_summary = false;
            }
            analyze(&file, cfg, top, json, &mut out)
        }
        Command::Targets { file } => list_targets(&file, &mut out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../core/tests/fixtures/worker-trace.json"
    );

    fn run(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn analyze_prints_table() {
        let text = run(|out| analyze(Path::new(FIXTURE), Config::default(), Some(1), false, out));
        assert!(text.contains("=== DedicatedWorker thread (tid=7) ==="));
        assert!(text.contains("cpu_tb_exec [qemu-system-arm.wasm]"));
        assert!(!text.contains("tci_run"));
    }

    #[test]
    fn analyze_json_round_trips_through_serde() {
        let text = run(|out| analyze(Path::new(FIXTURE), Config::default(), None, true, out));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["targets"].as_array().unwrap().len(), 2);
        assert_eq!(value["targets"][1]["thread_id"], 7);
    }

    #[test]
    fn targets_marks_profiled_threads() {
        let text = run(|out| list_targets(Path::new(FIXTURE), out));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "       1  CrRendererMain  (profiled)");
        assert_eq!(lines[2], "       9  Compositor");
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut out = Vec::new();
        let err = analyze(Path::new("/nonexistent.json"), Config::default(), None, false, &mut out)
            .unwrap_err();
        assert!(err.to_string().starts_with("failed to read"));
    }
}
