//! Host identity, uptime and load average.

use serde::Serialize;
use sysinfo::{Pid, System};

use crate::constants::{ENGINE_NAME, ENGINE_VERSION};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub platform: String,
    pub architecture: String,
    pub hostname: String,
    pub runtime_version: String,
    pub uptime_seconds: u64,
    pub process_uptime_seconds: u64,
}

/// Run-queue load averages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LoadAverage {
    #[serde(rename = "1min")]
    pub one: f64,
    #[serde(rename = "5min")]
    pub five: f64,
    #[serde(rename = "15min")]
    pub fifteen: f64,
}

pub(crate) fn read_load_average() -> LoadAverage {
    let load = System::load_average();
    LoadAverage {
        one: load.one,
        five: load.five,
        fifteen: load.fifteen,
    }
}

/// Seconds since the process started, or 0 when the process is not visible.
pub(crate) fn process_run_time(sys: &mut System, pid: Option<Pid>) -> u64 {
    pid.filter(|pid| sys.refresh_process(*pid))
        .and_then(|pid| sys.process(pid))
        .map(|p| p.run_time())
        .unwrap_or(0)
}

pub(crate) fn read_system_info(process_uptime_seconds: u64) -> SystemInfo {
    let platform = System::long_os_version()
        .or_else(System::name)
        .unwrap_or_else(|| std::env::consts::OS.to_string());

    SystemInfo {
        platform,
        architecture: std::env::consts::ARCH.to_string(),
        hostname: System::host_name().unwrap_or_else(|| "unknown".into()),
        runtime_version: format!("{} {}", ENGINE_NAME, ENGINE_VERSION),
        uptime_seconds: System::uptime(),
        process_uptime_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_average_field_names() {
        let load = LoadAverage { one: 0.5, five: 1.0, fifteen: 1.5 };
        let json = serde_json::to_value(load).unwrap();
        assert_eq!(json["1min"], 0.5);
        assert_eq!(json["5min"], 1.0);
        assert_eq!(json["15min"], 1.5);
    }

    #[test]
    fn test_system_info_reports_engine_version() {
        let info = read_system_info(42);
        assert_eq!(info.process_uptime_seconds, 42);
        assert_eq!(info.runtime_version, format!("pulse-engine {}", ENGINE_VERSION));
        assert!(!info.architecture.is_empty());
        assert!(!info.hostname.is_empty());
    }

    #[test]
    fn test_process_run_time_without_pid() {
        assert_eq!(process_run_time(&mut System::new(), None), 0);
    }
}
