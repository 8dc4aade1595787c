//! The monitoring engine.
//!
//! [`MonitorEngine`] is the one value the serving process constructs at
//! startup and shares by `Arc`. It owns two independent pieces of state:
//!
//! - the hit registry (its own mutex, see [`crate::hits`]);
//! - the cached resource readings and their histories, behind a second mutex.
//!
//! No code path holds both. CPU sampling blocks for the measurement window and
//! always runs before the resource lock is taken.

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use quanta::Clock;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::config::EngineConfig;
use crate::constants::ENGINE_VERSION;
use crate::error::{PulseResult, SampleResult};
use crate::health;
use crate::hits::{CategoryCounter, ConnectionGuard, HitCounterRegistry, RateReading, TrafficSummary};
use crate::sampler::{DiskSample, HostSampler, MemorySample, NetworkSample, ResourceSampler};
use crate::series::HistorySeries;
use crate::snapshot::{
    Availability, CpuSection, DiskSection, HealthSnapshot, MemorySection, NetworkSection, PerformanceSection,
};
use crate::window::RecentEvent;

// ----------------------------------------------------------------------------
// Cached Readings
// ----------------------------------------------------------------------------

/// The engine's view of one sampled metric.
///
/// A failed sample keeps the previous value and marks the reading unavailable
/// until the next success.
#[derive(Debug, Clone, Default)]
pub struct Reading<T> {
    value: T,
    available: bool,
    last_error: Option<String>,
    sampled_at: Option<DateTime<Utc>>,
}

impl<T> Reading<T> {
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn sampled_at(&self) -> Option<DateTime<Utc>> {
        self.sampled_at
    }

    /// Apply a sample result; returns the new value on success.
    fn update(&mut self, result: SampleResult<T>, at: DateTime<Utc>) -> Option<&T> {
        match result {
            Ok(value) => {
                self.value = value;
                self.available = true;
                self.last_error = None;
                self.sampled_at = Some(at);
                Some(&self.value)
            }
            Err(e) => {
                self.available = false;
                self.last_error = Some(e.to_string());
                None
            }
        }
    }

    fn availability(&self) -> Availability {
        Availability {
            available: self.available,
            error: self.last_error.clone(),
            sampled_at: self.sampled_at,
        }
    }
}

#[derive(Debug)]
struct ResourceState {
    cpu: Reading<f64>,
    memory: Reading<MemorySample>,
    network: Reading<NetworkSample>,
    disk: Reading<DiskSample>,
    cpu_history: HistorySeries,
    memory_history: HistorySeries,
    network_history: HistorySeries,
}

impl ResourceState {
    fn new(capacity: usize) -> Self {
        Self {
            cpu: Reading::default(),
            memory: Reading::default(),
            network: Reading::default(),
            disk: Reading::default(),
            cpu_history: HistorySeries::new(capacity),
            memory_history: HistorySeries::new(capacity),
            network_history: HistorySeries::new(capacity),
        }
    }
}

/// Owned copy of the resource state, taken under the lock.
struct ResourceCopy {
    cpu: Reading<f64>,
    memory: Reading<MemorySample>,
    network: Reading<NetworkSample>,
    disk: Reading<DiskSample>,
    cpu_history: Vec<f64>,
    memory_history: Vec<f64>,
    network_history: Vec<f64>,
}

/// Outcome of one sampling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleReport {
    pub succeeded: usize,
    pub failed: usize,
}

fn note_failure<T>(metric: &'static str, result: &SampleResult<T>) {
    match result {
        Err(e) if e.is_not_ready() => {
            debug!(target: "pulse::engine", metric, "Baseline taken, no reading yet");
        }
        Err(e) => {
            warn!(target: "pulse::engine", metric, error = %e, "Sample failed, keeping last reading");
        }
        Ok(_) => {}
    }
}

// ----------------------------------------------------------------------------
// Monitor Engine
// ----------------------------------------------------------------------------

pub struct MonitorEngine {
    config: EngineConfig,
    hits: HitCounterRegistry,
    sampler: Arc<dyn ResourceSampler>,
    resources: Mutex<ResourceState>,
}

impl std::fmt::Debug for MonitorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorEngine")
            .field("instance", &self.config.engine.instance_name)
            .field("total_hits", &self.hits.total_hits())
            .finish()
    }
}

impl MonitorEngine {
    /// Build an engine sampling the local host.
    pub fn new(config: EngineConfig) -> PulseResult<Self> {
        let sampler = Arc::new(HostSampler::from_config(&config.sampler));
        Self::with_sampler(config, sampler, Clock::new())
    }

    /// Build an engine with a specific sampler and clock.
    pub fn with_sampler(
        config: EngineConfig,
        sampler: Arc<dyn ResourceSampler>,
        clock: Clock,
    ) -> PulseResult<Self> {
        config.validate()?;
        let classifier = config.classifier.build()?;

        info!(
            target: "pulse::engine",
            version = ENGINE_VERSION,
            instance = %config.engine.instance_name,
            environment = %config.engine.environment,
            rules = classifier.rule_count(),
            "Monitor engine created"
        );

        let hits = HitCounterRegistry::new(classifier, clock, config.registry_options());
        let resources = Mutex::new(ResourceState::new(config.history.capacity));

        Ok(Self {
            config,
            hits,
            sampler,
            resources,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn hits(&self) -> &HitCounterRegistry {
        &self.hits
    }

    // ---- Record path ----

    pub fn record_hit(&self, route: &str, method: &str, latency_ms: Option<f64>) {
        self.hits.record_hit(route, method, latency_ms);
    }

    pub fn tick(&self) -> bool {
        self.hits.tick()
    }

    pub fn rate(&self) -> RateReading {
        self.hits.rate()
    }

    pub fn increment_active_connections(&self) {
        self.hits.increment_active_connections();
    }

    pub fn decrement_active_connections(&self) {
        self.hits.decrement_active_connections();
    }

    pub fn active_connections(&self) -> u64 {
        self.hits.active_connections()
    }

    pub fn track_connection(&self) -> ConnectionGuard<'_> {
        self.hits.track_connection()
    }

    // ---- Sampling ----

    /// Take one sample of every resource and append to the histories.
    ///
    /// Blocks for the CPU window. Call from a blocking context.
    pub fn sample_resources(&self) -> SampleReport {
        let cpu = self.sampler.sample_cpu();
        let memory = self.sampler.sample_memory();
        let network = self.sampler.sample_network();
        let disk = self.sampler.sample_disk();

        note_failure("cpu", &cpu);
        note_failure("memory", &memory);
        note_failure("network", &network);
        note_failure("disk", &disk);

        let failed = [cpu.is_err(), memory.is_err(), network.is_err(), disk.is_err()]
            .iter()
            .filter(|failed| **failed)
            .count();

        let now = Utc::now();
        {
            let mut state = self.resources.lock();
            if let Some(usage) = state.cpu.update(cpu, now).copied() {
                state.cpu_history.append(usage);
            }
            if let Some(usage) = state.memory.update(memory, now).map(|m| m.usage_percent) {
                state.memory_history.append(usage);
            }
            if let Some(usage) = state.network.update(network, now).map(|n| n.usage_percent) {
                state.network_history.append(usage);
            }
            state.disk.update(disk, now);
        }

        let report = SampleReport {
            succeeded: 4 - failed,
            failed,
        };
        debug!(target: "pulse::engine", succeeded = report.succeeded, failed = report.failed, "Resources sampled");
        report
    }

    fn copy_resources(&self) -> ResourceCopy {
        let state = self.resources.lock();
        ResourceCopy {
            cpu: state.cpu.clone(),
            memory: state.memory.clone(),
            network: state.network.clone(),
            disk: state.disk.clone(),
            cpu_history: state.cpu_history.values(),
            memory_history: state.memory_history.values(),
            network_history: state.network_history.values(),
        }
    }

    // ---- Reads ----

    /// Sample everything now, then assemble. Blocks for the CPU window.
    pub fn full_snapshot(&self) -> HealthSnapshot {
        self.sample_resources();
        self.assemble()
    }

    /// Assemble from the most recent cached readings without sampling.
    pub fn realtime_snapshot(&self) -> HealthSnapshot {
        self.assemble()
    }

    fn assemble(&self) -> HealthSnapshot {
        let cpu_info = self.sampler.cpu_info();
        let load_average = self.sampler.load_average();
        let system = self.sampler.system_info();
        let traffic = self.hits.traffic_summary();
        let copy = self.copy_resources();

        let cpu_percent = *copy.cpu.value();
        let memory_percent = copy.memory.value().usage_percent;
        // Stale readings still score; a metric never measured does not
        let performance = if copy.cpu.sampled_at().is_some() && copy.memory.sampled_at().is_some() {
            let verdict = health::score(cpu_percent, memory_percent, load_average.one);
            trace!(target: "pulse::engine", status = %verdict.status, overall = verdict.overall, "Health scored");
            PerformanceSection::new(cpu_percent, memory_percent, verdict)
        } else {
            trace!(target: "pulse::engine", "Health not scored, no readings yet");
            PerformanceSection::unavailable()
        };

        let cpu = CpuSection {
            cores: cpu_info.cores,
            usage_percent: cpu_percent,
            model: cpu_info.model,
            speed_mhz: cpu_info.speed_mhz,
            load_average,
            history: copy.cpu_history,
            availability: copy.cpu.availability(),
        };

        let memory_availability = copy.memory.availability();
        let memory_sample = copy.memory.value;
        let memory = MemorySection {
            total_bytes: memory_sample.total_bytes,
            used_bytes: memory_sample.used_bytes,
            free_bytes: memory_sample.free_bytes,
            usage_percent: memory_sample.usage_percent,
            history: copy.memory_history,
            process: memory_sample.process,
            availability: memory_availability,
        };

        let disk_availability = copy.disk.availability();
        let disk_sample = copy.disk.value;
        let disk = DiskSection {
            mount_point: disk_sample.mount_point,
            total_bytes: disk_sample.total_bytes,
            used_bytes: disk_sample.used_bytes,
            free_bytes: disk_sample.free_bytes,
            usage_percent: disk_sample.usage_percent,
            availability: disk_availability,
        };

        let network_availability = copy.network.availability();
        let network_sample = copy.network.value;
        let network = NetworkSection {
            interface_count: network_sample.interface_count,
            interface_details: network_sample.interface_details,
            rx_bytes_per_sec: network_sample.rx_bytes_per_sec,
            tx_bytes_per_sec: network_sample.tx_bytes_per_sec,
            usage_percent: network_sample.usage_percent,
            history: copy.network_history,
            availability: network_availability,
        };

        HealthSnapshot {
            system,
            cpu,
            memory,
            disk,
            network,
            performance,
            traffic,
            timestamp: Utc::now(),
        }
    }

    /// Hits per category, busiest first.
    pub fn category_breakdown(&self) -> Vec<CategoryCounter> {
        self.hits.snapshot_categories()
    }

    /// Up to `n` recent requests, most recent first. `n` is capped at the
    /// window's hard cap.
    pub fn recent_events(&self, n: usize) -> Vec<RecentEvent> {
        self.hits.recent_events(n.min(self.hits.window_hard_cap()))
    }

    pub fn recent_events_default(&self) -> Vec<RecentEvent> {
        self.hits.recent_events_default()
    }

    pub fn traffic_summary(&self) -> TrafficSummary {
        self.hits.traffic_summary()
    }

    // ---- Background work ----

    /// Start the rollover ticker and the periodic sampler on the current Tokio
    /// runtime.
    pub fn spawn_background(self: &Arc<Self>) -> BackgroundHandle {
        let shutdown = Arc::new(Notify::new());
        let running = Arc::new(AtomicBool::new(true));

        let ticker = {
            let engine = Arc::clone(self);
            let shutdown = Arc::clone(&shutdown);
            let running = Arc::clone(&running);
            tokio::spawn(async move {
                let notified = shutdown.notified();
                tokio::pin!(notified);

                let mut tick = interval(engine.config.rollover_interval());
                tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

                while running.load(AtomicOrdering::Acquire) {
                    tokio::select! {
                        _ = tick.tick() => {
                            if engine.tick() {
                                trace!(target: "pulse::engine", "Rate interval rolled over");
                            }
                        }
                        _ = &mut notified => break,
                    }
                }
                debug!(target: "pulse::engine", "Rollover ticker stopped");
            })
        };

        let sampler = {
            let engine = Arc::clone(self);
            let shutdown = Arc::clone(&shutdown);
            let running = Arc::clone(&running);
            tokio::spawn(async move {
                let notified = shutdown.notified();
                tokio::pin!(notified);

                let mut tick = interval(engine.config.sample_interval());
                tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

                while running.load(AtomicOrdering::Acquire) {
                    tokio::select! {
                        _ = tick.tick() => {
                            let engine = Arc::clone(&engine);
                            if let Err(e) = tokio::task::spawn_blocking(move || engine.sample_resources()).await {
                                warn!(target: "pulse::engine", error = %e, "Sampling task failed");
                            }
                        }
                        _ = &mut notified => break,
                    }
                }
                debug!(target: "pulse::engine", "Resource sampler stopped");
            })
        };

        info!(
            target: "pulse::engine",
            rollover_ms = self.config.engine.rollover_interval_ms,
            sample_ms = self.config.engine.sample_interval_ms,
            "Background tasks started"
        );

        BackgroundHandle {
            shutdown,
            running,
            tasks: vec![ticker, sampler],
        }
    }
}

/// Stops the engine's background tasks. Dropping the handle signals them to
/// stop without waiting.
#[derive(Debug)]
pub struct BackgroundHandle {
    shutdown: Arc<Notify>,
    running: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
}

impl BackgroundHandle {
    fn signal(&self) {
        self.running.store(false, AtomicOrdering::Release);
        self.shutdown.notify_waiters();
    }

    /// Signal shutdown and wait for both tasks to finish.
    pub async fn shutdown(mut self) {
        self.signal();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!(target: "pulse::engine", error = %e, "Background task ended abnormally");
            }
        }
        info!(target: "pulse::engine", "Background tasks stopped");
    }
}

impl Drop for BackgroundHandle {
    fn drop(&mut self) {
        self.signal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SampleError;
    use crate::sampler::{CpuInfo, LoadAverage, ProcessMemory, SystemInfo};
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Hands out scripted CPU readings; memory follows a switch.
    #[derive(Default)]
    struct FakeSampler {
        cpu: parking_lot::Mutex<VecDeque<SampleResult<f64>>>,
        memory_fails: AtomicBool,
        load: f64,
        /// First network call only takes the baseline, like the host sampler
        network_baseline: AtomicBool,
    }

    impl FakeSampler {
        fn with_cpu(readings: Vec<SampleResult<f64>>) -> Self {
            Self {
                cpu: parking_lot::Mutex::new(readings.into()),
                ..Self::default()
            }
        }
    }

    impl ResourceSampler for FakeSampler {
        fn sample_cpu(&self) -> SampleResult<f64> {
            self.cpu.lock().pop_front().unwrap_or(Ok(10.0))
        }

        fn cpu_info(&self) -> CpuInfo {
            CpuInfo {
                cores: 4,
                model: "Test CPU".into(),
                speed_mhz: 2_400,
            }
        }

        fn load_average(&self) -> LoadAverage {
            LoadAverage {
                one: self.load,
                five: self.load,
                fifteen: self.load,
            }
        }

        fn sample_memory(&self) -> SampleResult<MemorySample> {
            if self.memory_fails.load(AtomicOrdering::Relaxed) {
                return Err(SampleError::unavailable("memory", "meminfo missing"));
            }
            Ok(MemorySample::from_totals(1_000, 600, ProcessMemory::default()))
        }

        fn sample_network(&self) -> SampleResult<NetworkSample> {
            if self.network_baseline.swap(false, AtomicOrdering::Relaxed) {
                return Err(SampleError::not_ready("network"));
            }
            Ok(NetworkSample {
                usage_percent: 2.5,
                ..NetworkSample::default()
            })
        }

        fn sample_disk(&self) -> SampleResult<DiskSample> {
            Err(SampleError::unavailable("disk", "no filesystem mounted at or above /data"))
        }

        fn system_info(&self) -> SystemInfo {
            SystemInfo {
                hostname: "test-host".into(),
                ..SystemInfo::default()
            }
        }
    }

    fn engine_with(sampler: FakeSampler) -> (Arc<MonitorEngine>, Arc<quanta::Mock>) {
        let (clock, mock) = Clock::mock();
        let engine = MonitorEngine::with_sampler(EngineConfig::default(), Arc::new(sampler), clock).unwrap();
        (Arc::new(engine), mock)
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.history.capacity = 0;
        let result = MonitorEngine::with_sampler(config, Arc::new(FakeSampler::default()), Clock::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_sampling_fills_histories() {
        let (engine, _mock) = engine_with(FakeSampler::with_cpu(vec![Ok(20.0), Ok(40.0)]));

        let report = engine.sample_resources();
        assert_eq!(report, SampleReport { succeeded: 3, failed: 1 });
        engine.sample_resources();

        let snapshot = engine.realtime_snapshot();
        assert_eq!(snapshot.cpu.history, vec![20.0, 40.0]);
        assert_eq!(snapshot.cpu.usage_percent, 40.0);
        assert!(snapshot.cpu.availability.available);
        assert_eq!(snapshot.memory.history, vec![40.0, 40.0]);
        assert_eq!(snapshot.network.history, vec![2.5, 2.5]);
        assert!(!snapshot.disk.availability.available);
    }

    #[test]
    fn test_failed_sample_keeps_last_value() {
        let (engine, _mock) = engine_with(FakeSampler::with_cpu(vec![
            Ok(35.0),
            Err(SampleError::unavailable("cpu", "core count changed between readings (4 -> 2)")),
        ]));

        engine.sample_resources();
        engine.sample_resources();

        let snapshot = engine.realtime_snapshot();
        assert_eq!(snapshot.cpu.usage_percent, 35.0);
        assert_eq!(snapshot.cpu.history, vec![35.0]);
        assert!(!snapshot.cpu.availability.available);
        assert!(snapshot
            .cpu
            .availability
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("core count changed"));
        assert!(snapshot.cpu.availability.sampled_at.is_some());

        // Recovers on the next success
        engine.sample_resources();
        let snapshot = engine.realtime_snapshot();
        assert!(snapshot.cpu.availability.available);
        assert_eq!(snapshot.cpu.availability.error, None);
    }

    #[test]
    fn test_never_sampled_is_unavailable() {
        let (engine, _mock) = engine_with(FakeSampler::default());
        let snapshot = engine.realtime_snapshot();
        assert!(!snapshot.cpu.availability.available);
        assert!(snapshot.cpu.availability.sampled_at.is_none());
        assert!(snapshot.cpu.history.is_empty());
        assert_eq!(snapshot.cpu.cores, 4);
    }

    #[test]
    fn test_histories_are_bounded() {
        let readings = (1..=65).map(|i| Ok(i as f64)).collect();
        let (engine, _mock) = engine_with(FakeSampler::with_cpu(readings));
        for _ in 0..65 {
            engine.sample_resources();
        }
        let snapshot = engine.realtime_snapshot();
        let expected: Vec<f64> = (6..=65).map(|i| i as f64).collect();
        assert_eq!(snapshot.cpu.history, expected);
        assert_eq!(snapshot.memory.history.len(), 60);
    }

    #[test]
    fn test_memory_failure_marks_section() {
        let sampler = FakeSampler::default();
        sampler.memory_fails.store(true, AtomicOrdering::Relaxed);
        let (engine, _mock) = engine_with(sampler);

        let snapshot = engine.full_snapshot();
        assert!(!snapshot.memory.availability.available);
        assert_eq!(snapshot.memory.usage_percent, 0.0);
        assert!(snapshot.memory.history.is_empty());
        assert!(snapshot.cpu.availability.available);
        assert!(!snapshot.performance.available);
        assert_eq!(snapshot.performance.verdict, None);
    }

    #[test]
    fn test_network_baseline_is_not_a_reading() {
        let sampler = FakeSampler::default();
        sampler.network_baseline.store(true, AtomicOrdering::Relaxed);
        let (engine, _mock) = engine_with(sampler);

        let report = engine.sample_resources();
        assert_eq!(report, SampleReport { succeeded: 2, failed: 2 });
        let snapshot = engine.realtime_snapshot();
        assert!(!snapshot.network.availability.available);
        assert!(snapshot.network.availability.sampled_at.is_none());
        assert!(snapshot.network.history.is_empty());

        engine.sample_resources();
        let snapshot = engine.realtime_snapshot();
        assert!(snapshot.network.availability.available);
        assert_eq!(snapshot.network.history, vec![2.5]);
    }

    #[test]
    fn test_health_not_scored_before_first_sample() {
        let (engine, _mock) = engine_with(FakeSampler::with_cpu(vec![Ok(20.0)]));

        let snapshot = engine.realtime_snapshot();
        assert!(!snapshot.performance.available);
        assert_eq!(snapshot.performance.overall_health.status, "Unknown");
        assert_eq!(snapshot.performance.overall_health.score, 0);
        assert_eq!(snapshot.performance.verdict, None);

        engine.sample_resources();
        let snapshot = engine.realtime_snapshot();
        assert!(snapshot.performance.available);
        assert_eq!(snapshot.performance.verdict, Some(health::score(20.0, 40.0, 0.0)));
    }

    #[test]
    fn test_stale_readings_still_scored() {
        let (engine, _mock) = engine_with(FakeSampler::with_cpu(vec![
            Ok(30.0),
            Err(SampleError::unavailable("cpu", "no per-core cpu lines")),
        ]));
        engine.sample_resources();
        engine.sample_resources();

        let snapshot = engine.realtime_snapshot();
        assert!(!snapshot.cpu.availability.available);
        assert_eq!(snapshot.performance.verdict, Some(health::score(30.0, 40.0, 0.0)));
    }

    #[test]
    fn test_snapshot_health_and_contract() {
        let sampler = FakeSampler {
            load: 0.5,
            ..FakeSampler::with_cpu(vec![Ok(42.0)])
        };
        let (engine, _mock) = engine_with(sampler);
        engine.record_hit("/api/v1/users", "GET", Some(8.0));

        let snapshot = engine.full_snapshot();
        assert!(snapshot.performance.available);
        assert_eq!(snapshot.performance.verdict, Some(health::score(42.0, 40.0, 0.5)));
        assert_eq!(snapshot.performance.overall_health.status, "Excellent");
        assert_eq!(snapshot.traffic.total_requests, 1);
        assert_eq!(snapshot.system.hostname, "test-host");

        let json = serde_json::to_value(&snapshot).unwrap();
        for section in ["system", "cpu", "memory", "disk", "network", "performance", "traffic", "timestamp"] {
            assert!(json.get(section).is_some(), "missing {}", section);
        }
        assert_eq!(json["cpu"]["speedMHz"], 2_400);
        assert_eq!(json["cpu"]["loadAverage"]["1min"], 0.5);
        assert_eq!(json["cpu"]["available"], true);
        assert_eq!(json["disk"]["available"], false);
        assert_eq!(json["traffic"]["averageLatencyMs"], 8.0);
        assert!(json["timestamp"].as_str().unwrap_or_default().ends_with('Z'));
    }

    #[test]
    fn test_recent_events_capped_at_hard_cap() {
        let mut config = EngineConfig::default();
        config.window.hard_cap = 3;
        let (clock, _mock) = Clock::mock();
        let engine = MonitorEngine::with_sampler(config, Arc::new(FakeSampler::default()), clock).unwrap();

        for i in 0..5 {
            engine.record_hit(&format!("/api/v1/posts/{}", i), "GET", None);
        }
        let events = engine.recent_events(100);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].route, "/api/v1/posts/4");
    }

    #[test]
    fn test_rate_through_engine() {
        let (engine, mock) = engine_with(FakeSampler::default());
        engine.record_hit("/api/v1/themes", "GET", None);
        mock.increment(Duration::from_millis(1_000));
        assert!(engine.tick());
        assert_eq!(engine.rate().per_second_rate, 1);
        assert_eq!(engine.category_breakdown()[0].per_second_rate, 1);
    }

    #[tokio::test]
    async fn test_background_tasks_sample_and_stop() {
        let mut config = EngineConfig::default();
        config.engine.rollover_interval_ms = 100;
        config.engine.sample_interval_ms = 20;
        config.sampler.cpu_sample_window_ms = 0;
        let engine = Arc::new(
            MonitorEngine::with_sampler(config, Arc::new(FakeSampler::default()), Clock::new()).unwrap(),
        );

        let handle = engine.spawn_background();
        engine.record_hit("/api/v1/support/tickets", "POST", None);
        tokio::time::sleep(Duration::from_millis(250)).await;
        handle.shutdown().await;

        let sampled = engine.realtime_snapshot().cpu.history.len();
        assert!(sampled >= 2, "only {} samples taken", sampled);
        assert_eq!(engine.hits().total_hits(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(engine.realtime_snapshot().cpu.history.len(), sampled);
    }
}
