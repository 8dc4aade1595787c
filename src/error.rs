//! Error types for every subsystem of the engine.
//!
//! Sampling errors are absorbed by the engine (they degrade a reading instead of
//! propagating), so [`PulseError`] only carries what can fail at startup.

use std::path::PathBuf;

use thiserror::Error;

// ----------------------------------------------------------------------------
// Core Engine Errors
// ----------------------------------------------------------------------------

/// Errors from building the engine or installing logging.
#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type PulseResult<T> = Result<T, PulseError>;

// ----------------------------------------------------------------------------
// Configuration Errors
// ----------------------------------------------------------------------------

/// Errors related to configuration loading and validation
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to parse configuration: {message}")]
    ParseError { message: String },

    #[error("Invalid configuration value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Sampling Errors
// ----------------------------------------------------------------------------

/// Errors from resource samplers.
#[derive(Error, Debug)]
pub enum SampleError {
    #[error("{metric} measurement unavailable: {message}")]
    Unavailable { metric: &'static str, message: String },

    #[error("Failed to read '{source_path}': {error}")]
    Read {
        source_path: String,
        #[source]
        error: std::io::Error,
    },

    #[error("Malformed data from '{source_path}': {message}")]
    Malformed { source_path: String, message: String },

    /// Delta-based metric with only a baseline so far.
    #[error("{metric} measurement not ready: baseline only")]
    NotReady { metric: &'static str },
}

impl SampleError {
    pub fn unavailable(metric: &'static str, message: impl Into<String>) -> Self {
        SampleError::Unavailable {
            metric,
            message: message.into(),
        }
    }

    pub fn not_ready(metric: &'static str) -> Self {
        SampleError::NotReady { metric }
    }

    pub fn is_not_ready(&self) -> bool {
        matches!(self, SampleError::NotReady { .. })
    }

    pub fn malformed(source_path: impl Into<String>, message: impl Into<String>) -> Self {
        SampleError::Malformed {
            source_path: source_path.into(),
            message: message.into(),
        }
    }
}

pub type SampleResult<T> = Result<T, SampleError>;
