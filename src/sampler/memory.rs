//! System and process memory.

use serde::Serialize;
use sysinfo::{Pid, System};

use crate::error::{SampleError, SampleResult};

/// Memory figures of the current process. Diagnostics only; never scored.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMemory {
    pub pid: u32,
    pub resident_bytes: u64,
    pub virtual_bytes: u64,
    pub run_time_seconds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySample {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub usage_percent: f64,
    pub process: ProcessMemory,
}

impl MemorySample {
    /// Build from totals; `free` is memory available to new allocations.
    pub fn from_totals(total: u64, free: u64, process: ProcessMemory) -> Self {
        let free = free.min(total);
        Self {
            total_bytes: total,
            used_bytes: total - free,
            free_bytes: free,
            usage_percent: memory_usage_percent(total, free),
            process,
        }
    }
}

/// `(total - free) / total * 100`, or 0 when total is unknown.
pub fn memory_usage_percent(total: u64, free: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let used = total.saturating_sub(free);
    (used as f64 / total as f64) * 100.0
}

/// Refresh and read memory through an existing `sysinfo` handle.
pub(crate) fn read_memory(sys: &mut System, pid: Option<Pid>) -> SampleResult<MemorySample> {
    sys.refresh_memory();
    let total = sys.total_memory();
    if total == 0 {
        return Err(SampleError::unavailable("memory", "total memory reported as zero"));
    }

    let process = pid
        .filter(|pid| sys.refresh_process(*pid))
        .and_then(|pid| sys.process(pid).map(|p| (pid, p)))
        .map(|(pid, p)| ProcessMemory {
            pid: pid.as_u32(),
            resident_bytes: p.memory(),
            virtual_bytes: p.virtual_memory(),
            run_time_seconds: p.run_time(),
        })
        .unwrap_or_default();

    Ok(MemorySample::from_totals(total, sys.available_memory(), process))
}
