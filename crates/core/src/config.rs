//! `wasmprof.toml` config loading.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::DEFAULT_TOP_N;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Rows kept per ranking.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// How long the profiler runs before it is stopped.
    #[serde(default = "default_profile_duration", with = "humantime_serde")]
    pub profile_duration: Duration,

    /// How long to wait for the end-of-trace signal after stopping.
    #[serde(default = "default_collection_timeout", with = "humantime_serde")]
    pub collection_timeout: Duration,

    /// Capacity of each per-session event channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Target types eligible for attachment, in no particular order.
    #[serde(default = "default_candidate_kinds")]
    pub candidate_kinds: Vec<String>,

    /// Thread names reported as skipped instead of ranked.
    #[serde(default)]
    pub skip_threads: Vec<String>,

    #[serde(default = "default_trace_categories")]
    pub trace_categories: Vec<String>,

    /// Sampling frequency passed to the tracer, in Hz.
    #[serde(default = "default_sampling_frequency")]
    pub sampling_frequency: u32,

    /// Append a summary of wasm-related trace events to reports.
    #[serde(default = "default_wasm_summary")]
    pub wasm_summary: bool,
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_profile_duration() -> Duration {
    Duration::from_secs(30)
}

fn default_collection_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_candidate_kinds() -> Vec<String> {
    vec!["worker".to_string(), "service_worker".to_string()]
}

fn default_trace_categories() -> Vec<String> {
    [
        "v8.cpu_profiler",
        "devtools.timeline",
        "disabled-by-default-v8.cpu_profiler",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_sampling_frequency() -> u32 {
    1000
}

fn default_wasm_summary() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            profile_duration: default_profile_duration(),
            collection_timeout: default_collection_timeout(),
            channel_capacity: default_channel_capacity(),
            candidate_kinds: default_candidate_kinds(),
            skip_threads: Vec::new(),
            trace_categories: default_trace_categories(),
            sampling_frequency: default_sampling_frequency(),
            wasm_summary: default_wasm_summary(),
        }
    }
}

impl Config {
    pub fn from_toml(text: &str, path: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Toml {
            path: path.to_string(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        Self::from_toml(&text, &display)
    }

    /// Like `load`, but a missing or broken file means defaults.
    pub fn load_optional(path: &Path) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(ConfigError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::default()
            }
            Err(err) => {
                tracing::warn!("{err}, using defaults");
                Self::default()
            }
        }
    }

    /// Tracer option string, e.g. `sampling-frequency=1000`.
    pub fn trace_options(&self) -> String {
        format!("sampling-frequency={}", self.sampling_frequency)
    }

    pub fn skips(&self, thread_name: &str) -> bool {
        self.skip_threads.iter().any(|s| s == thread_name)
    }
}
