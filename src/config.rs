//! Engine configuration.
//!
//! Loaded from a TOML file with `PULSE_`-prefixed environment overrides
//! (`PULSE_WINDOW__HARD_CAP=5000` sets `window.hard_cap`). Every field has a
//! default, so an empty file is a valid configuration.

use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::classifier::{default_rules, RouteClassifier, RuleConfig};
use crate::constants::*;
use crate::error::ConfigError;
use crate::hits::RegistryOptions;

// ----------------------------------------------------------------------------
// Root Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub engine: GeneralConfig,

    #[serde(default)]
    pub sampler: SamplerConfig,

    #[serde(default)]
    pub window: WindowConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load configuration from file with environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let figment = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("PULSE_").split("__"));

        let config: Self = figment.extract().map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.rollover_interval_ms < MIN_ROLLOVER_INTERVAL_MS {
            return Err(ConfigError::invalid_value(
                "engine.rollover_interval_ms",
                format!("Rollover interval must be at least {}ms", MIN_ROLLOVER_INTERVAL_MS),
            ));
        }

        if self.engine.sample_interval_ms < self.sampler.cpu_sample_window_ms {
            return Err(ConfigError::invalid_value(
                "engine.sample_interval_ms",
                format!(
                    "Sample interval ({}ms) cannot be shorter than the CPU sample window ({}ms)",
                    self.engine.sample_interval_ms, self.sampler.cpu_sample_window_ms
                ),
            ));
        }

        if self.sampler.disk_path.trim().is_empty() {
            return Err(ConfigError::invalid_value("sampler.disk_path", "must not be empty"));
        }

        let positive = [
            ("sampler.link_capacity_mbps", self.sampler.link_capacity_mbps as u128),
            ("window.horizon_ms", self.window.horizon_ms as u128),
            ("window.hard_cap", self.window.hard_cap as u128),
            ("window.default_recent", self.window.default_recent as u128),
            ("history.capacity", self.history.capacity as u128),
            ("history.latency_capacity", self.history.latency_capacity as u128),
            ("history.top_routes", self.history.top_routes as u128),
        ];
        if let Some((field, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::invalid_value(*field, "must be greater than zero"));
        }

        if self.classifier.fallback_category.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "classifier.fallback_category",
                "category must not be empty",
            ));
        }

        // Compiling catches empty categories and bad patterns with the rule index.
        self.classifier.build()?;

        Ok(())
    }

    /// Render the default configuration as TOML.
    pub fn generate_default_config() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    pub fn rollover_interval(&self) -> Duration {
        Duration::from_millis(self.engine.rollover_interval_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.engine.sample_interval_ms)
    }

    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            rollover_interval: self.rollover_interval(),
            window_horizon: Duration::from_millis(self.window.horizon_ms),
            window_hard_cap: self.window.hard_cap,
            latency_capacity: self.history.latency_capacity,
            top_routes: self.history.top_routes,
            default_recent: self.window.default_recent,
        }
    }
}

// ----------------------------------------------------------------------------
// General
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Instance name, attached to startup logs
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    #[serde(default = "default_environment")]
    pub environment: String,

    /// Length of one hit-rate interval
    #[serde(default = "default_rollover_interval")]
    pub rollover_interval_ms: u64,

    /// Period of background resource sampling
    #[serde(default = "default_sample_interval")]
    pub sample_interval_ms: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            environment: default_environment(),
            rollover_interval_ms: DEFAULT_ROLLOVER_INTERVAL_MS,
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
        }
    }
}

fn default_instance_name() -> String {
    sysinfo::System::host_name().unwrap_or_else(|| ENGINE_NAME.into())
}

fn default_environment() -> String {
    "production".into()
}

fn default_rollover_interval() -> u64 {
    DEFAULT_ROLLOVER_INTERVAL_MS
}

fn default_sample_interval() -> u64 {
    DEFAULT_SAMPLE_INTERVAL_MS
}

// ----------------------------------------------------------------------------
// Sampler
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Sleep between the two CPU tick readings
    #[serde(default = "default_cpu_window")]
    pub cpu_sample_window_ms: u64,

    /// Filesystem path whose usage is reported
    #[serde(default = "default_disk_path")]
    pub disk_path: String,

    /// Assumed link capacity when interfaces don't report a speed
    #[serde(default = "default_link_capacity")]
    pub link_capacity_mbps: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            cpu_sample_window_ms: DEFAULT_CPU_SAMPLE_WINDOW_MS,
            disk_path: default_disk_path(),
            link_capacity_mbps: DEFAULT_LINK_CAPACITY_MBPS,
        }
    }
}

fn default_cpu_window() -> u64 {
    DEFAULT_CPU_SAMPLE_WINDOW_MS
}

fn default_disk_path() -> String {
    DEFAULT_DISK_PATH.into()
}

fn default_link_capacity() -> u64 {
    DEFAULT_LINK_CAPACITY_MBPS
}

// ----------------------------------------------------------------------------
// Recent-Activity Window
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_horizon")]
    pub horizon_ms: u64,

    #[serde(default = "default_hard_cap")]
    pub hard_cap: usize,

    #[serde(default = "default_recent")]
    pub default_recent: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            horizon_ms: DEFAULT_WINDOW_HORIZON_MS,
            hard_cap: DEFAULT_WINDOW_HARD_CAP,
            default_recent: DEFAULT_RECENT_EVENTS,
        }
    }
}

fn default_horizon() -> u64 {
    DEFAULT_WINDOW_HORIZON_MS
}

fn default_hard_cap() -> usize {
    DEFAULT_WINDOW_HARD_CAP
}

fn default_recent() -> usize {
    DEFAULT_RECENT_EVENTS
}

// ----------------------------------------------------------------------------
// Histories
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Samples kept per resource history
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,

    #[serde(default = "default_latency_capacity")]
    pub latency_capacity: usize,

    /// Routes listed per category
    #[serde(default = "default_top_routes")]
    pub top_routes: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_HISTORY_CAPACITY,
            latency_capacity: DEFAULT_LATENCY_CAPACITY,
            top_routes: DEFAULT_TOP_ROUTES,
        }
    }
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_latency_capacity() -> usize {
    DEFAULT_LATENCY_CAPACITY
}

fn default_top_routes() -> usize {
    DEFAULT_TOP_ROUTES
}

// ----------------------------------------------------------------------------
// Classifier
// ----------------------------------------------------------------------------

/// Ordered rule table. Rules listed here replace the built-in table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_fallback")]
    pub fallback_category: String,

    #[serde(default = "default_rules")]
    pub rules: Vec<RuleConfig>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            fallback_category: default_fallback(),
            rules: default_rules(),
        }
    }
}

impl ClassifierConfig {
    pub fn build(&self) -> Result<RouteClassifier, ConfigError> {
        RouteClassifier::from_rules(&self.rules, &self.fallback_category)
    }
}

fn default_fallback() -> String {
    FALLBACK_CATEGORY.into()
}

// ----------------------------------------------------------------------------
// Logging
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format (json, pretty, compact)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Enable ANSI colors
    #[serde(default = "default_true")]
    pub colors: bool,

    /// Include source location
    #[serde(default)]
    pub source_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            colors: true,
            source_location: false,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

fn default_true() -> bool {
    true
}
