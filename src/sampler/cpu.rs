//! CPU utilization by two-point sampling of per-core tick counters.

use std::fs;
use std::thread;
use std::time::Duration;

use serde::Serialize;

use crate::error::{SampleError, SampleResult};

// ----------------------------------------------------------------------------
// Core Ticks
// ----------------------------------------------------------------------------

/// Cumulative idle and total ticks of one logical core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreTicks {
    pub idle: u64,
    pub total: u64,
}

impl CoreTicks {
    pub const fn new(idle: u64, total: u64) -> Self {
        Self { idle, total }
    }

    /// Parse a per-core line from /proc/stat.
    /// Format: "cpu0 12345 678 9012 34567 890 12 34 56"
    ///
    /// The aggregate "cpu" line is rejected. Idle includes iowait.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let core_id = parts.next()?;
        let index = core_id.strip_prefix("cpu")?;
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let user: u64 = parts.next()?.parse().ok()?;
        let nice: u64 = parts.next()?.parse().ok()?;
        let system: u64 = parts.next()?.parse().ok()?;
        let idle: u64 = parts.next()?.parse().ok()?;
        let mut rest = parts.take(4).map(|s| s.parse::<u64>().unwrap_or(0));
        let iowait = rest.next().unwrap_or(0);
        let irq = rest.next().unwrap_or(0);
        let softirq = rest.next().unwrap_or(0);
        let steal = rest.next().unwrap_or(0);

        Some(Self {
            idle: idle + iowait,
            total: user + nice + system + idle + iowait + irq + softirq + steal,
        })
    }
}

/// Usage of one core between two readings, in percent.
///
/// A core whose total did not advance contributes 0.
pub fn core_usage(before: CoreTicks, after: CoreTicks) -> f64 {
    let total_diff = after.total.saturating_sub(before.total);
    if total_diff == 0 {
        return 0.0;
    }
    let idle_diff = after.idle.saturating_sub(before.idle);
    100.0 - 100.0 * (idle_diff as f64 / total_diff as f64)
}

/// Mean usage across cores, clamped to [0, 100].
pub fn cpu_usage(before: &[CoreTicks], after: &[CoreTicks]) -> SampleResult<f64> {
    if before.is_empty() || after.is_empty() {
        return Err(SampleError::unavailable("cpu", "no cores reported"));
    }
    if before.len() != after.len() {
        return Err(SampleError::unavailable(
            "cpu",
            format!("core count changed between readings ({} -> {})", before.len(), after.len()),
        ));
    }

    let sum: f64 = before
        .iter()
        .zip(after)
        .map(|(b, a)| core_usage(*b, *a))
        .sum();
    Ok((sum / before.len() as f64).clamp(0.0, 100.0))
}

// ----------------------------------------------------------------------------
// Tick Sources
// ----------------------------------------------------------------------------

/// Anything that can report per-core tick counters.
pub trait CpuTickSource: Send + Sync {
    fn read_ticks(&self) -> SampleResult<Vec<CoreTicks>>;
}

/// Reads /proc/stat.
#[derive(Debug, Clone)]
pub struct ProcStatSource {
    path: String,
}

impl Default for ProcStatSource {
    fn default() -> Self {
        Self { path: "/proc/stat".into() }
    }
}

impl ProcStatSource {
    pub fn with_path(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn parse(content: &str) -> Vec<CoreTicks> {
        content
            .lines()
            .filter(|line| line.starts_with("cpu"))
            .filter_map(CoreTicks::parse)
            .collect()
    }
}

impl CpuTickSource for ProcStatSource {
    fn read_ticks(&self) -> SampleResult<Vec<CoreTicks>> {
        let content = fs::read_to_string(&self.path).map_err(|error| SampleError::Read {
            source_path: self.path.clone(),
            error,
        })?;
        let ticks = Self::parse(&content);
        if ticks.is_empty() {
            return Err(SampleError::malformed(&self.path, "no per-core cpu lines"));
        }
        Ok(ticks)
    }
}

// ----------------------------------------------------------------------------
// CPU Sampler
// ----------------------------------------------------------------------------

/// Takes two tick readings `window` apart and reports the mean core usage.
///
/// Blocks the calling thread for `window`. Holds no locks of its own, so
/// callers must not hold theirs across [`sample`](CpuSampler::sample) either.
#[derive(Debug)]
pub struct CpuSampler<S> {
    source: S,
    window: Duration,
}

impl<S: CpuTickSource> CpuSampler<S> {
    pub fn new(source: S, window: Duration) -> Self {
        Self { source, window }
    }

    pub fn sample(&self) -> SampleResult<f64> {
        let before = self.source.read_ticks()?;
        if !self.window.is_zero() {
            thread::sleep(self.window);
        }
        let after = self.source.read_ticks()?;
        cpu_usage(&before, &after)
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Static description of the processor.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuInfo {
    pub cores: usize,
    pub model: String,
    #[serde(rename = "speedMHz")]
    pub speed_mhz: u64,
}
