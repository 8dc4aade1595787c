//! Time-bounded log of recent requests for the "recent activity" view.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use quanta::Instant;
use serde::Serialize;

/// One observed request. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentEvent {
    #[serde(serialize_with = "crate::snapshot::serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub route: String,
    pub method: String,
    pub category: Arc<str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    /// Monotonic instant used for eviction
    #[serde(skip)]
    pub(crate) observed_at: Instant,
}

impl RecentEvent {
    pub fn new(
        route: impl Into<String>,
        method: impl Into<String>,
        category: Arc<str>,
        latency_ms: Option<f64>,
        timestamp: DateTime<Utc>,
        observed_at: Instant,
    ) -> Self {
        Self {
            timestamp,
            route: route.into(),
            method: method.into(),
            category,
            latency_ms,
            observed_at,
        }
    }

    pub fn observed_at(&self) -> Instant {
        self.observed_at
    }
}

/// Events younger than `horizon`, oldest at the front.
///
/// Eviction is by age, plus a hard cap on the entry count so a burst between
/// prunes cannot grow the window without bound.
#[derive(Debug)]
pub struct SlidingEventWindow {
    events: VecDeque<RecentEvent>,
    horizon: Duration,
    hard_cap: usize,
}

impl SlidingEventWindow {
    pub fn new(horizon: Duration, hard_cap: usize) -> Self {
        Self {
            events: VecDeque::new(),
            horizon,
            hard_cap: hard_cap.max(1),
        }
    }

    /// Insert an event, then prune relative to the event's own instant.
    pub fn append(&mut self, event: RecentEvent) {
        let at = event.observed_at;
        self.events.push_back(event);
        self.evict_expired(at);

        while self.events.len() > self.hard_cap {
            self.events.pop_front();
        }
    }

    /// Drop every event whose age at `now` is at least the horizon.
    pub fn evict_expired(&mut self, now: Instant) {
        while let Some(front) = self.events.front() {
            if now.saturating_duration_since(front.observed_at) >= self.horizon {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }

    /// The `n` most recent live events, most recent first.
    pub fn recent(&mut self, n: usize, now: Instant) -> Vec<RecentEvent> {
        self.evict_expired(now);
        self.events.iter().rev().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn hard_cap(&self) -> usize {
        self.hard_cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quanta::Clock;

    fn event(route: &str, at: Instant) -> RecentEvent {
        RecentEvent::new(route, "GET", Arc::from("users"), None, Utc::now(), at)
    }

    #[test]
    fn test_event_expires_after_horizon() {
        let (clock, mock) = Clock::mock();
        let mut window = SlidingEventWindow::new(Duration::from_millis(60_000), 10_000);

        window.append(event("/api/v1/users", clock.now()));

        mock.increment(Duration::from_millis(59_000));
        assert_eq!(window.recent(20, clock.now()).len(), 1);

        mock.increment(Duration::from_millis(2_000));
        assert!(window.recent(20, clock.now()).is_empty());
        assert!(window.is_empty());
    }

    #[test]
    fn test_exactly_horizon_old_is_evicted() {
        let (clock, mock) = Clock::mock();
        let mut window = SlidingEventWindow::new(Duration::from_millis(60_000), 10_000);

        window.append(event("/a", clock.now()));
        mock.increment(Duration::from_millis(60_000));
        assert!(window.recent(20, clock.now()).is_empty());
    }

    #[test]
    fn test_append_prunes_relative_to_new_event() {
        let (clock, mock) = Clock::mock();
        let mut window = SlidingEventWindow::new(Duration::from_millis(1_000), 100);

        window.append(event("/old", clock.now()));
        mock.increment(Duration::from_millis(1_500));
        window.append(event("/new", clock.now()));

        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_recent_is_most_recent_first_and_limited() {
        let (clock, mock) = Clock::mock();
        let mut window = SlidingEventWindow::new(Duration::from_secs(60), 100);

        for i in 0..5 {
            window.append(event(&format!("/r{}", i), clock.now()));
            mock.increment(Duration::from_millis(10));
        }

        let recent = window.recent(3, clock.now());
        let routes: Vec<&str> = recent.iter().map(|e| e.route.as_str()).collect();
        assert_eq!(routes, vec!["/r4", "/r3", "/r2"]);
    }

    #[test]
    fn test_hard_cap_evicts_oldest() {
        let (clock, _mock) = Clock::mock();
        let mut window = SlidingEventWindow::new(Duration::from_secs(60), 3);

        for i in 0..5 {
            window.append(event(&format!("/r{}", i), clock.now()));
        }

        assert_eq!(window.len(), 3);
        let recent = window.recent(10, clock.now());
        assert_eq!(recent.last().map(|e| e.route.as_str()), Some("/r2"));
    }
}
