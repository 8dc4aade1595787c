//! Health scoring.
//!
//! Each live signal is bucketed into a score of 100, 80, 60 or 30 and the
//! verdict is the mean of the three. The scorer is pure: same inputs, same
//! verdict.

use std::fmt;

use serde::Serialize;

use crate::constants::{COLOR_EXCELLENT, COLOR_FAIR, COLOR_GOOD, COLOR_POOR};

// ----------------------------------------------------------------------------
// Buckets
// ----------------------------------------------------------------------------

/// Upper bounds (exclusive) for percent signals and their scores.
const PERCENT_BUCKETS: [(f64, u8); 3] = [(50.0, 100), (70.0, 80), (85.0, 60)];

/// Upper bounds (exclusive) for the 1-minute load average.
const LOAD_BUCKETS: [(f64, u8); 3] = [(1.0, 100), (2.0, 80), (3.0, 60)];

const FLOOR_SCORE: u8 = 30;

/// NaN compares false against every bound, so it lands on the floor.
fn bucket(value: f64, buckets: &[(f64, u8)]) -> u8 {
    buckets
        .iter()
        .find(|(bound, _)| value < *bound)
        .map(|(_, score)| *score)
        .unwrap_or(FLOOR_SCORE)
}

pub fn percent_score(percent: f64) -> u8 {
    bucket(percent, &PERCENT_BUCKETS)
}

pub fn load_score(load_1min: f64) -> u8 {
    bucket(load_1min, &LOAD_BUCKETS)
}

// ----------------------------------------------------------------------------
// Verdict
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HealthStatus {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl HealthStatus {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            HealthStatus::Excellent
        } else if score >= 60.0 {
            HealthStatus::Good
        } else if score >= 40.0 {
            HealthStatus::Fair
        } else {
            HealthStatus::Poor
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            HealthStatus::Excellent => COLOR_EXCELLENT,
            HealthStatus::Good => COLOR_GOOD,
            HealthStatus::Fair => COLOR_FAIR,
            HealthStatus::Poor => COLOR_POOR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Excellent => "Excellent",
            HealthStatus::Good => "Good",
            HealthStatus::Fair => "Fair",
            HealthStatus::Poor => "Poor",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health of the host at one instant. Recomputed on every read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthVerdict {
    pub cpu_score: u8,
    pub memory_score: u8,
    pub load_score: u8,
    /// Mean of the three scores, rounded
    pub overall: u8,
    pub status: HealthStatus,
    pub color: &'static str,
}

/// Score CPU %, memory % and the 1-minute load average.
///
/// The status is taken from the unrounded mean.
pub fn score(cpu_percent: f64, memory_percent: f64, load_1min: f64) -> HealthVerdict {
    let cpu_score = percent_score(cpu_percent);
    let memory_score = percent_score(memory_percent);
    let load_score = load_score(load_1min);

    let mean = (cpu_score as f64 + memory_score as f64 + load_score as f64) / 3.0;
    let status = HealthStatus::from_score(mean);

    HealthVerdict {
        cpu_score,
        memory_score,
        load_score,
        overall: mean.round() as u8,
        status,
        color: status.color(),
    }
}

/// Dashboard label for a utilization percentage, on the same buckets as the
/// score.
pub fn efficiency_label(percent: f64) -> &'static str {
    match percent_score(percent) {
        100 => "Optimal",
        80 => "Moderate",
        60 => "High",
        _ => "Critical",
    }
}
