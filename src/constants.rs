//! Engine-wide constants: identity, buffer sizes, timing, and display colors.

/// Engine version - follows semantic versioning
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const ENGINE_NAME: &str = "pulse-engine";

// ----------------------------------------------------------------------------
// Buffer & Window Sizes
// ----------------------------------------------------------------------------

/// Samples kept per resource history (CPU %, memory %, network %)
pub const DEFAULT_HISTORY_CAPACITY: usize = 60;

/// Request latencies kept for the moving average
pub const DEFAULT_LATENCY_CAPACITY: usize = 100;

/// Horizon of the recent-activity window (milliseconds)
pub const DEFAULT_WINDOW_HORIZON_MS: u64 = 60_000;

/// Hard cap on recent-activity entries, independent of age
pub const DEFAULT_WINDOW_HARD_CAP: usize = 10_000;

/// Events returned by a recent-activity read when no limit is given
pub const DEFAULT_RECENT_EVENTS: usize = 20;

/// Routes listed per category in the breakdown
pub const DEFAULT_TOP_ROUTES: usize = 5;

// ----------------------------------------------------------------------------
// Timing & Intervals
// ----------------------------------------------------------------------------

/// Length of one hit-rate measurement interval (milliseconds)
pub const DEFAULT_ROLLOVER_INTERVAL_MS: u64 = 1000;

/// Minimum allowed rollover interval (milliseconds)
pub const MIN_ROLLOVER_INTERVAL_MS: u64 = 100;

/// Sleep between the two CPU tick readings (milliseconds)
pub const DEFAULT_CPU_SAMPLE_WINDOW_MS: u64 = 100;

/// Period of background resource sampling (milliseconds)
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 5000;

// ----------------------------------------------------------------------------
// Resource Sampling
// ----------------------------------------------------------------------------

/// Link capacity assumed when no interface reports its speed (Mbit/s)
pub const DEFAULT_LINK_CAPACITY_MBPS: u64 = 1000;

/// Filesystem path whose usage is reported
pub const DEFAULT_DISK_PATH: &str = "/";

// ----------------------------------------------------------------------------
// Classification
// ----------------------------------------------------------------------------

/// Category for routes no rule matches
pub const FALLBACK_CATEGORY: &str = "other";

// ----------------------------------------------------------------------------
// Health Colors
// ----------------------------------------------------------------------------

pub const COLOR_EXCELLENT: &str = "#10b981";
pub const COLOR_GOOD: &str = "#84cc16";
pub const COLOR_FAIR: &str = "#f59e0b";
pub const COLOR_POOR: &str = "#ef4444";
/// Shown while there is nothing to score
pub const COLOR_UNKNOWN: &str = "#6b7280";
