//! The JSON contract dashboards poll.
//!
//! Every type here is a plain owned copy of engine state, built after the
//! engine's locks are released. Field names are camelCase on the wire.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

use crate::constants::COLOR_UNKNOWN;
use crate::health::HealthVerdict;
use crate::hits::TrafficSummary;
use crate::sampler::{InterfaceDetail, LoadAverage, ProcessMemory, SystemInfo};

/// Timestamps in snapshots are RFC 3339, UTC, millisecond precision.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn serialize_timestamp<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(at))
}

pub(crate) fn serialize_optional_timestamp<S: Serializer>(
    at: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match at {
        Some(at) => serializer.serialize_str(&format_timestamp(at)),
        None => serializer.serialize_none(),
    }
}

// ----------------------------------------------------------------------------
// Sections
// ----------------------------------------------------------------------------

/// How fresh a section's figures are.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    /// False when the most recent measurement failed; figures are then the
    /// last good ones (or zero if there never was one)
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(serialize_with = "serialize_optional_timestamp")]
    pub sampled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuSection {
    pub cores: usize,
    pub usage_percent: f64,
    pub model: String,
    #[serde(rename = "speedMHz")]
    pub speed_mhz: u64,
    pub load_average: LoadAverage,
    pub history: Vec<f64>,
    #[serde(flatten)]
    pub availability: Availability,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySection {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub usage_percent: f64,
    pub history: Vec<f64>,
    pub process: ProcessMemory,
    #[serde(flatten)]
    pub availability: Availability,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskSection {
    pub mount_point: String,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub usage_percent: f64,
    #[serde(flatten)]
    pub availability: Availability,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSection {
    pub interface_count: usize,
    pub interface_details: Vec<InterfaceDetail>,
    pub rx_bytes_per_sec: f64,
    pub tx_bytes_per_sec: f64,
    pub usage_percent: f64,
    pub history: Vec<f64>,
    #[serde(flatten)]
    pub availability: Availability,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallHealth {
    pub status: String,
    pub score: u8,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSection {
    /// False until both CPU and memory have a good reading to score
    pub available: bool,
    pub cpu_efficiency_label: &'static str,
    pub memory_efficiency_label: &'static str,
    pub overall_health: OverallHealth,
    pub verdict: Option<HealthVerdict>,
}

impl PerformanceSection {
    pub fn new(cpu_percent: f64, memory_percent: f64, verdict: HealthVerdict) -> Self {
        Self {
            available: true,
            cpu_efficiency_label: crate::health::efficiency_label(cpu_percent),
            memory_efficiency_label: crate::health::efficiency_label(memory_percent),
            overall_health: OverallHealth {
                status: verdict.status.to_string(),
                score: verdict.overall,
                color: verdict.color,
            },
            verdict: Some(verdict),
        }
    }

    /// Nothing to score yet.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            cpu_efficiency_label: "Unknown",
            memory_efficiency_label: "Unknown",
            overall_health: OverallHealth {
                status: "Unknown".to_string(),
                score: 0,
                color: COLOR_UNKNOWN,
            },
            verdict: None,
        }
    }
}

// ----------------------------------------------------------------------------
// Snapshot
// ----------------------------------------------------------------------------

/// Everything the System Health view shows, as of `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub system: SystemInfo,
    pub cpu: CpuSection,
    pub memory: MemorySection,
    pub disk: DiskSection,
    pub network: NetworkSection,
    pub performance: PerformanceSection,
    pub traffic: TrafficSummary,
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}
