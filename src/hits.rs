//! API hit counting.
//!
//! [`HitCounterRegistry`] owns the per-category and per-route counters, the
//! recent-activity window and the request latency history. All of it sits behind
//! one mutex; the lifetime total and the active-connection gauge are atomics so
//! they can be read without contending with the record path.
//!
//! # Rate policy
//!
//! Hits are counted into the current interval. When an interval of at least
//! `rollover_interval` has elapsed, the next access (a hit, a rate read, or an
//! explicit [`tick`](HitCounterRegistry::tick)) publishes that interval's raw
//! count as `per_second_rate` and starts a new interval. The engine ticks on a
//! fixed period; without it intervals stretch across idle time, so the raw count
//! is only an approximation of hits per second. `normalized_rate` divides the
//! count by the interval's real length and `interval_ms` reports that length.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use quanta::{Clock, Instant};
use serde::Serialize;
use tracing::trace;

use crate::classifier::{normalize_path, route_key, RouteClassifier};
use crate::constants::{
    DEFAULT_LATENCY_CAPACITY, DEFAULT_RECENT_EVENTS, DEFAULT_ROLLOVER_INTERVAL_MS, DEFAULT_TOP_ROUTES,
    DEFAULT_WINDOW_HARD_CAP, DEFAULT_WINDOW_HORIZON_MS,
};
use crate::series::HistorySeries;
use crate::window::{RecentEvent, SlidingEventWindow};

// ----------------------------------------------------------------------------
// Read Models
// ----------------------------------------------------------------------------

/// Hit statistics for one route of a category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStat {
    pub route: String,
    pub hits: u64,
    #[serde(serialize_with = "crate::snapshot::serialize_timestamp")]
    pub last_hit_at: DateTime<Utc>,
}

/// Aggregated hits for one category, with its busiest routes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCounter {
    pub category: Arc<str>,
    pub total_hits: u64,
    pub per_second_rate: u64,
    #[serde(serialize_with = "crate::snapshot::serialize_timestamp")]
    pub last_hit_at: DateTime<Utc>,
    pub top_routes: Vec<RouteStat>,
}

/// The last completed measurement interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateReading {
    /// Raw hit count of the interval
    pub per_second_rate: u64,
    /// Count divided by the interval's actual length in seconds
    pub normalized_rate: f64,
    pub interval_ms: u64,
}

/// Request-level figures for the traffic section of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficSummary {
    pub total_requests: u64,
    pub per_second_rate: u64,
    pub normalized_rate: f64,
    pub interval_ms: u64,
    pub average_latency_ms: Option<f64>,
    pub active_connections: u64,
    pub latency_history: Vec<f64>,
}

// ----------------------------------------------------------------------------
// Registry Options
// ----------------------------------------------------------------------------

/// Sizing and timing for a registry.
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    pub rollover_interval: Duration,
    pub window_horizon: Duration,
    pub window_hard_cap: usize,
    pub latency_capacity: usize,
    pub top_routes: usize,
    pub default_recent: usize,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            rollover_interval: Duration::from_millis(DEFAULT_ROLLOVER_INTERVAL_MS),
            window_horizon: Duration::from_millis(DEFAULT_WINDOW_HORIZON_MS),
            window_hard_cap: DEFAULT_WINDOW_HARD_CAP,
            latency_capacity: DEFAULT_LATENCY_CAPACITY,
            top_routes: DEFAULT_TOP_ROUTES,
            default_recent: DEFAULT_RECENT_EVENTS,
        }
    }
}

// ----------------------------------------------------------------------------
// Internal State
// ----------------------------------------------------------------------------

#[derive(Debug)]
struct RouteState {
    hits: u64,
    last_hit_at: DateTime<Utc>,
}

#[derive(Debug)]
struct CategoryState {
    total: u64,
    interval_count: u64,
    per_second: u64,
    last_hit_at: DateTime<Utc>,
    routes: AHashMap<String, RouteState>,
}

impl CategoryState {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            total: 0,
            interval_count: 0,
            per_second: 0,
            last_hit_at: now,
            routes: AHashMap::new(),
        }
    }
}

#[derive(Debug)]
struct TrafficState {
    categories: AHashMap<Arc<str>, CategoryState>,
    window: SlidingEventWindow,
    latencies: HistorySeries,
    interval_started: Instant,
    interval_count: u64,
    published: RateReading,
}

impl TrafficState {
    /// Publish the current interval if it has run for at least `period`.
    fn roll_over(&mut self, now: Instant, period: Duration) -> bool {
        let elapsed = now.saturating_duration_since(self.interval_started);
        if elapsed < period {
            return false;
        }

        let secs = elapsed.as_secs_f64();
        self.published = RateReading {
            per_second_rate: self.interval_count,
            normalized_rate: if secs > 0.0 { self.interval_count as f64 / secs } else { 0.0 },
            interval_ms: elapsed.as_millis() as u64,
        };
        for category in self.categories.values_mut() {
            category.per_second = category.interval_count;
            category.interval_count = 0;
        }
        self.interval_count = 0;
        self.interval_started = now;
        true
    }
}

// ----------------------------------------------------------------------------
// Hit Counter Registry
// ----------------------------------------------------------------------------

/// Concurrent registry of API hits.
#[derive(Debug)]
pub struct HitCounterRegistry {
    classifier: RouteClassifier,
    clock: Clock,
    options: RegistryOptions,
    state: Mutex<TrafficState>,
    total: AtomicU64,
    active_connections: AtomicU64,
}

impl HitCounterRegistry {
    pub fn new(classifier: RouteClassifier, clock: Clock, options: RegistryOptions) -> Self {
        let state = TrafficState {
            categories: AHashMap::new(),
            window: SlidingEventWindow::new(options.window_horizon, options.window_hard_cap),
            latencies: HistorySeries::new(options.latency_capacity),
            interval_started: clock.now(),
            interval_count: 0,
            published: RateReading::default(),
        };

        Self {
            classifier,
            clock,
            options,
            state: Mutex::new(state),
            total: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
        }
    }

    pub fn classifier(&self) -> &RouteClassifier {
        &self.classifier
    }

    /// Count one request. Safe to call from any number of threads.
    pub fn record_hit(&self, route: &str, method: &str, latency_ms: Option<f64>) {
        let category = Arc::clone(self.classifier.classify_shared(route, method));
        let key = route_key(route, method);
        let path = normalize_path(route).to_string();
        let method = method.to_ascii_uppercase();
        let latency_ms = latency_ms.filter(|l| l.is_finite() && *l >= 0.0);
        let wall = Utc::now();

        {
            let mut state = self.state.lock();
            let now = self.clock.now();

            let counter = state
                .categories
                .entry(Arc::clone(&category))
                .or_insert_with(|| CategoryState::new(wall));
            counter.total += 1;
            counter.interval_count += 1;
            counter.last_hit_at = wall;

            let route_state = counter
                .routes
                .entry(key)
                .or_insert(RouteState { hits: 0, last_hit_at: wall });
            route_state.hits += 1;
            route_state.last_hit_at = wall;

            state.interval_count += 1;

            let event = RecentEvent::new(path, method, Arc::clone(&category), latency_ms, wall, now);
            state.window.append(event);

            if let Some(latency) = latency_ms {
                state.latencies.append(latency);
            }

            state.roll_over(now, self.options.rollover_interval);
        }

        self.total.fetch_add(1, AtomicOrdering::Relaxed);
        trace!(target: "pulse::hits", category = %category, "Hit recorded");
    }

    /// Roll the measurement interval over if it is due.
    pub fn tick(&self) -> bool {
        let mut state = self.state.lock();
        let now = self.clock.now();
        state.roll_over(now, self.options.rollover_interval)
    }

    /// The last completed interval, rolling over first if one is due.
    pub fn rate(&self) -> RateReading {
        let mut state = self.state.lock();
        let now = self.clock.now();
        state.roll_over(now, self.options.rollover_interval);
        state.published
    }

    /// Raw hit count of the last completed interval.
    pub fn per_second_rate(&self) -> u64 {
        self.rate().per_second_rate
    }

    /// Lifetime number of recorded hits.
    pub fn total_hits(&self) -> u64 {
        self.total.load(AtomicOrdering::Relaxed)
    }

    /// Categories by total hits (descending), each with its busiest routes.
    pub fn snapshot_categories(&self) -> Vec<CategoryCounter> {
        let top = self.options.top_routes;
        let mut categories: Vec<CategoryCounter> = {
            let mut state = self.state.lock();
            let now = self.clock.now();
            state.roll_over(now, self.options.rollover_interval);

            state
                .categories
                .iter()
                .map(|(name, counter)| {
                    let mut routes: Vec<RouteStat> = counter
                        .routes
                        .iter()
                        .map(|(key, route)| RouteStat {
                            route: key.clone(),
                            hits: route.hits,
                            last_hit_at: route.last_hit_at,
                        })
                        .collect();
                    routes.sort_by(|a, b| b.hits.cmp(&a.hits).then_with(|| a.route.cmp(&b.route)));
                    routes.truncate(top);

                    CategoryCounter {
                        category: Arc::clone(name),
                        total_hits: counter.total,
                        per_second_rate: counter.per_second,
                        last_hit_at: counter.last_hit_at,
                        top_routes: routes,
                    }
                })
                .collect()
        };

        categories.sort_by(|a, b| {
            b.total_hits
                .cmp(&a.total_hits)
                .then_with(|| a.category.cmp(&b.category))
        });
        categories
    }

    /// The `n` most recent requests inside the window, most recent first.
    pub fn recent_events(&self, n: usize) -> Vec<RecentEvent> {
        let mut state = self.state.lock();
        let now = self.clock.now();
        state.window.recent(n, now)
    }

    /// Recent requests using the configured default count.
    pub fn recent_events_default(&self) -> Vec<RecentEvent> {
        self.recent_events(self.options.default_recent)
    }

    pub fn window_hard_cap(&self) -> usize {
        self.options.window_hard_cap
    }

    /// Moving average over the latency history.
    pub fn average_latency_ms(&self) -> Option<f64> {
        self.state.lock().latencies.mean()
    }

    pub fn latency_history(&self) -> Vec<f64> {
        self.state.lock().latencies.values()
    }

    // ---- Active connections ----

    pub fn increment_active_connections(&self) {
        self.active_connections.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Saturates at zero.
    pub fn decrement_active_connections(&self) {
        let _ = self
            .active_connections
            .fetch_update(AtomicOrdering::Relaxed, AtomicOrdering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(AtomicOrdering::Relaxed)
    }

    /// Count a connection as active until the guard is dropped.
    pub fn track_connection(&self) -> ConnectionGuard<'_> {
        self.increment_active_connections();
        ConnectionGuard { registry: self }
    }

    /// Request totals, rate, latency and connections in one read.
    pub fn traffic_summary(&self) -> TrafficSummary {
        let (rate, average, history) = {
            let mut state = self.state.lock();
            let now = self.clock.now();
            state.roll_over(now, self.options.rollover_interval);
            (state.published, state.latencies.mean(), state.latencies.values())
        };

        TrafficSummary {
            total_requests: self.total_hits(),
            per_second_rate: rate.per_second_rate,
            normalized_rate: rate.normalized_rate,
            interval_ms: rate.interval_ms,
            average_latency_ms: average,
            active_connections: self.active_connections(),
            latency_history: history,
        }
    }
}

/// Decrements the active-connection gauge on drop.
#[derive(Debug)]
pub struct ConnectionGuard<'a> {
    registry: &'a HitCounterRegistry,
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.registry.decrement_active_connections();
    }
}
