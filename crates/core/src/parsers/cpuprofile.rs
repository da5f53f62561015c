use thiserror::Error;
use wasmprof_protocol::CpuProfile;

#[derive(Debug, Error)]
pub enum CpuProfileParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing or empty nodes")]
    MissingNodes,
}

/// Parse a V8 CPU profile (.cpuprofile, or a saved `Profiler.stop` result).
///
/// Used by: Node.js `--cpu-prof`, Chrome DevTools CPU profiler, Deno.
pub fn parse_cpuprofile(data: &[u8]) -> Result<CpuProfile, CpuProfileParseError> {
    let cpu_profile: CpuProfile = serde_json::from_slice(data)?;

    if cpu_profile.nodes.is_empty() {
        return Err(CpuProfileParseError::MissingNodes);
    }
    if cpu_profile.time_deltas.len() != cpu_profile.samples.len() {
        tracing::debug!(
            samples = cpu_profile.samples.len(),
            deltas = cpu_profile.time_deltas.len(),
            "cpuprofile sample/delta length mismatch"
        );
    }
    Ok(cpu_profile)
}
