//! Logging bootstrap and structured log macros.

use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{PulseError, PulseResult};

// ----------------------------------------------------------------------------
// Logger Initialization
// ----------------------------------------------------------------------------

/// Parse a level name, falling back to INFO.
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" | "warning" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        "off" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

/// Install the global subscriber. `RUST_LOG` directives take precedence over
/// the configured level.
///
/// Fails if a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> PulseResult<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(parse_level(&config.level).into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = match config.format.as_str() {
        "json" => tracing::subscriber::set_global_default(
            registry.with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_file(config.source_location)
                    .with_line_number(config.source_location)
                    .with_thread_names(true),
            ),
        ),
        "compact" => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().compact().with_ansi(config.colors).with_target(true)),
        ),
        _ => tracing::subscriber::set_global_default(
            registry.with(
                fmt::layer()
                    .pretty()
                    .with_ansi(config.colors)
                    .with_target(true)
                    .with_file(config.source_location)
                    .with_line_number(config.source_location),
            ),
        ),
    };
    installed.map_err(|e| PulseError::Internal(format!("Failed to set logger: {}", e)))?;

    info!(
        target: "pulse::init",
        level = %config.level,
        format = %config.format,
        "Logging initialized"
    );

    Ok(())
}

// ----------------------------------------------------------------------------
// Logging Macros
// ----------------------------------------------------------------------------

/// Log a resource sampler event
#[macro_export]
macro_rules! log_sample {
    ($metric:expr, $event:expr) => {
        tracing::debug!(
            target: "pulse::sampler",
            metric = $metric,
            event = $event,
            "Sampler event"
        )
    };
    ($metric:expr, $event:expr, $($field:tt)*) => {
        tracing::debug!(
            target: "pulse::sampler",
            metric = $metric,
            event = $event,
            $($field)*,
            "Sampler event"
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), LevelFilter::DEBUG);
        assert_eq!(parse_level("warning"), LevelFilter::WARN);
        assert_eq!(parse_level("verbose"), LevelFilter::INFO);
    }

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig {
            format: "compact".into(),
            colors: false,
            ..LoggingConfig::default()
        };
        // Whichever call loses the race to install the global subscriber errors.
        let first = init_logging(&config);
        let second = init_logging(&config);
        assert!(first.is_err() || second.is_err());
        if let Err(err) = second {
            assert!(matches!(err, PulseError::Internal(_)));
        }
    }
}
