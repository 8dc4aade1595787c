//! # pulse-engine
//!
//! Real-time metrics aggregation and health scoring for the admin dashboard's
//! System Health views.
//!
//! The serving process builds one [`MonitorEngine`] at startup, shares it by
//! `Arc`, and:
//!
//! - reports every inbound request through [`MonitorEngine::record_hit`] (or the
//!   [`http::track_hits`] middleware);
//! - optionally starts [`MonitorEngine::spawn_background`] for timer-driven rate
//!   rollover and periodic resource sampling;
//! - answers dashboard polls from [`MonitorEngine::full_snapshot`],
//!   [`MonitorEngine::realtime_snapshot`] and the category/recent/traffic reads,
//!   directly or through [`http::router`].
//!
//! All state is in memory and lives as long as the engine.

pub mod logging;

pub mod classifier;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod health;
pub mod hits;
pub mod http;
pub mod sampler;
pub mod series;
pub mod snapshot;
pub mod window;

pub use classifier::{MatchKind, RouteClassifier, RuleConfig};
pub use config::{EngineConfig, LoggingConfig};
pub use engine::{BackgroundHandle, MonitorEngine, Reading, SampleReport};
pub use error::{ConfigError, PulseError, PulseResult, SampleError, SampleResult};
pub use health::{efficiency_label, score, HealthStatus, HealthVerdict};
pub use hits::{
    CategoryCounter, ConnectionGuard, HitCounterRegistry, RateReading, RegistryOptions, RouteStat, TrafficSummary,
};
pub use logging::init_logging;
pub use sampler::{HostSampler, ResourceSampler};
pub use series::HistorySeries;
pub use snapshot::HealthSnapshot;
pub use window::{RecentEvent, SlidingEventWindow};
