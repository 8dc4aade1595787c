//! Resource sampling.
//!
//! The engine talks to the host only through [`ResourceSampler`]. [`HostSampler`]
//! is the real implementation: CPU ticks from /proc/stat, everything else
//! through `sysinfo`. Each `sysinfo` handle sits behind its own lock, private to
//! the sampler, so a slow refresh of one metric never blocks another.

pub mod cpu;
pub mod disk;
pub mod memory;
pub mod network;
pub mod system;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sysinfo::{Disks, Networks, Pid, System};

use crate::config::SamplerConfig;
use crate::error::{SampleError, SampleResult};

pub use cpu::{CoreTicks, CpuInfo, CpuSampler, CpuTickSource, ProcStatSource};
pub use disk::DiskSample;
pub use memory::{MemorySample, ProcessMemory};
pub use network::{InterfaceDetail, NetworkCounters, NetworkSample, Throughput};
pub use system::{LoadAverage, SystemInfo};

// ----------------------------------------------------------------------------
// Sampler Trait
// ----------------------------------------------------------------------------

/// Source of host resource readings.
///
/// `sample_cpu` blocks for the measurement window; the engine calls it without
/// holding any of its own locks.
pub trait ResourceSampler: Send + Sync {
    /// Mean utilization across logical cores, in percent.
    fn sample_cpu(&self) -> SampleResult<f64>;

    fn cpu_info(&self) -> CpuInfo;

    fn load_average(&self) -> LoadAverage;

    fn sample_memory(&self) -> SampleResult<MemorySample>;

    /// Throughput since the previous call. The first call only records the
    /// baseline and fails with [`SampleError::NotReady`].
    fn sample_network(&self) -> SampleResult<NetworkSample>;

    fn sample_disk(&self) -> SampleResult<DiskSample>;

    fn system_info(&self) -> SystemInfo;
}

// ----------------------------------------------------------------------------
// Host Sampler
// ----------------------------------------------------------------------------

struct NetworkState {
    networks: Networks,
    previous: Option<(NetworkCounters, Instant)>,
}

/// Samples the machine the engine runs on.
pub struct HostSampler {
    cpu: CpuSampler<ProcStatSource>,
    system: Mutex<System>,
    network: Mutex<NetworkState>,
    disks: Mutex<Disks>,
    disk_path: PathBuf,
    link_capacity_mbps: u64,
    pid: Option<Pid>,
}

impl std::fmt::Debug for HostSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostSampler")
            .field("cpu_window", &self.cpu.window())
            .field("disk_path", &self.disk_path)
            .field("link_capacity_mbps", &self.link_capacity_mbps)
            .field("pid", &self.pid)
            .finish()
    }
}

impl HostSampler {
    pub fn new(cpu_window: Duration, disk_path: impl Into<PathBuf>, link_capacity_mbps: u64) -> Self {
        Self {
            cpu: CpuSampler::new(ProcStatSource::default(), cpu_window),
            system: Mutex::new(System::new()),
            network: Mutex::new(NetworkState {
                networks: Networks::new_with_refreshed_list(),
                previous: None,
            }),
            disks: Mutex::new(Disks::new_with_refreshed_list()),
            disk_path: disk_path.into(),
            link_capacity_mbps,
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    pub fn from_config(config: &SamplerConfig) -> Self {
        Self::new(
            Duration::from_millis(config.cpu_sample_window_ms),
            &config.disk_path,
            config.link_capacity_mbps,
        )
    }

    pub fn disk_path(&self) -> &Path {
        &self.disk_path
    }
}

impl ResourceSampler for HostSampler {
    fn sample_cpu(&self) -> SampleResult<f64> {
        let usage = self.cpu.sample()?;
        crate::log_sample!("cpu", "sampled", usage_percent = usage);
        Ok(usage)
    }

    fn cpu_info(&self) -> CpuInfo {
        let mut sys = self.system.lock();
        sys.refresh_cpu();
        let cpus = sys.cpus();

        let cores = if cpus.is_empty() {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            cpus.len()
        };
        let (model, speed_mhz) = cpus
            .first()
            .map(|cpu| (cpu.brand().trim().to_string(), cpu.frequency()))
            .unwrap_or_else(|| ("unknown".to_string(), 0));

        CpuInfo { cores, model, speed_mhz }
    }

    fn load_average(&self) -> LoadAverage {
        system::read_load_average()
    }

    fn sample_memory(&self) -> SampleResult<MemorySample> {
        let sample = memory::read_memory(&mut self.system.lock(), self.pid)?;
        crate::log_sample!("memory", "sampled", usage_percent = sample.usage_percent);
        Ok(sample)
    }

    fn sample_network(&self) -> SampleResult<NetworkSample> {
        let mut state = self.network.lock();
        let interfaces = network::read_interfaces(&mut state.networks);
        let counters = NetworkCounters::sum(&interfaces);
        let now = Instant::now();

        let previous = state.previous.replace((counters, now));
        drop(state);

        let Some((before, at)) = previous else {
            crate::log_sample!("network", "baseline", interfaces = interfaces.len());
            return Err(SampleError::not_ready("network"));
        };
        let rate = network::throughput(
            before,
            counters,
            now.saturating_duration_since(at),
            network::link_capacity_bits(&interfaces, self.link_capacity_mbps),
        );

        crate::log_sample!("network", "sampled", usage_percent = rate.usage_percent);
        Ok(NetworkSample {
            interface_count: interfaces.len(),
            interface_details: interfaces,
            rx_bytes_per_sec: rate.rx_bytes_per_sec,
            tx_bytes_per_sec: rate.tx_bytes_per_sec,
            usage_percent: rate.usage_percent,
        })
    }

    fn sample_disk(&self) -> SampleResult<DiskSample> {
        let sample = disk::read_disk(&mut self.disks.lock(), &self.disk_path)?;
        crate::log_sample!("disk", "sampled", mount_point = %sample.mount_point, usage_percent = sample.usage_percent);
        Ok(sample)
    }

    fn system_info(&self) -> SystemInfo {
        let process_uptime = system::process_run_time(&mut self.system.lock(), self.pid);
        system::read_system_info(process_uptime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> HostSampler {
        HostSampler::new(Duration::from_millis(10), "/", 1_000)
    }

    #[test]
    fn test_first_network_sample_is_baseline() {
        let sampler = host();
        let first = sampler.sample_network();
        assert!(matches!(first, Err(ref e) if e.is_not_ready()));

        let sample = sampler.sample_network().unwrap();
        assert!(sample.rx_bytes_per_sec >= 0.0);
        assert!((0.0..=100.0).contains(&sample.usage_percent));
        assert_eq!(sample.interface_count, sample.interface_details.len());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_process_uptime_counts_from_process_start() {
        let sampler = host();
        let memory = sampler.sample_memory().unwrap();
        let info = sampler.system_info();
        assert!(info.process_uptime_seconds >= memory.process.run_time_seconds);
        assert!(info.process_uptime_seconds <= info.uptime_seconds);
    }

    #[test]
    fn test_cpu_info_reports_cores() {
        assert!(host().cpu_info().cores >= 1);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_host_cpu_sample_in_range() {
        let usage = host().sample_cpu().unwrap();
        assert!((0.0..=100.0).contains(&usage));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_host_memory_sample() {
        let sample = host().sample_memory().unwrap();
        assert!(sample.total_bytes > 0);
        assert!((0.0..=100.0).contains(&sample.usage_percent));
    }
}
