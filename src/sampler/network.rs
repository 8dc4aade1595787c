//! Network throughput by two-point delta of interface byte counters.

use std::fs;
use std::time::Duration;

use serde::Serialize;
use sysinfo::Networks;

// ----------------------------------------------------------------------------
// Interface Counters
// ----------------------------------------------------------------------------

/// Cumulative counters of one interface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceDetail {
    pub name: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_speed_mbps: Option<u64>,
}

/// Summed byte counters across all non-loopback interfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkCounters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

impl NetworkCounters {
    pub fn sum(interfaces: &[InterfaceDetail]) -> Self {
        interfaces.iter().fold(Self::default(), |acc, iface| Self {
            rx_bytes: acc.rx_bytes.saturating_add(iface.rx_bytes),
            tx_bytes: acc.tx_bytes.saturating_add(iface.tx_bytes),
        })
    }
}

/// Throughput between two readings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Throughput {
    pub rx_bytes_per_sec: f64,
    pub tx_bytes_per_sec: f64,
    pub usage_percent: f64,
}

/// Bytes per second in each direction and the share of link capacity used by
/// the busier direction. Counter resets produce 0 rather than a negative rate.
pub fn throughput(
    before: NetworkCounters,
    after: NetworkCounters,
    elapsed: Duration,
    capacity_bits_per_sec: f64,
) -> Throughput {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return Throughput::default();
    }

    let rx = after.rx_bytes.saturating_sub(before.rx_bytes) as f64 / secs;
    let tx = after.tx_bytes.saturating_sub(before.tx_bytes) as f64 / secs;
    let usage = if capacity_bits_per_sec > 0.0 {
        (rx.max(tx) * 8.0 / capacity_bits_per_sec * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    Throughput {
        rx_bytes_per_sec: rx,
        tx_bytes_per_sec: tx,
        usage_percent: usage,
    }
}

/// Link capacity in bits/s: the sum of reported interface speeds, or the
/// fallback when no interface reports one.
pub fn link_capacity_bits(interfaces: &[InterfaceDetail], fallback_mbps: u64) -> f64 {
    let reported: u64 = interfaces.iter().filter_map(|i| i.link_speed_mbps).sum();
    let mbps = if reported > 0 { reported } else { fallback_mbps };
    mbps as f64 * 1_000_000.0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSample {
    pub interface_count: usize,
    pub interface_details: Vec<InterfaceDetail>,
    pub rx_bytes_per_sec: f64,
    pub tx_bytes_per_sec: f64,
    pub usage_percent: f64,
}

// ----------------------------------------------------------------------------
// OS Readers
// ----------------------------------------------------------------------------

fn is_loopback(name: &str) -> bool {
    name == "lo" || name.starts_with("lo0") || name.eq_ignore_ascii_case("loopback")
}

/// Speed in Mbit/s from /sys/class/net; absent or negative means unknown.
fn read_link_speed(name: &str) -> Option<u64> {
    let raw = fs::read_to_string(format!("/sys/class/net/{}/speed", name)).ok()?;
    raw.trim().parse::<i64>().ok().filter(|s| *s > 0).map(|s| s as u64)
}

/// Refresh and list interface counters, loopback excluded, sorted by name.
pub(crate) fn read_interfaces(networks: &mut Networks) -> Vec<InterfaceDetail> {
    networks.refresh();
    let mut interfaces: Vec<InterfaceDetail> = networks
        .list()
        .iter()
        .filter(|(name, _)| !is_loopback(name))
        .map(|(name, data)| InterfaceDetail {
            name: name.clone(),
            rx_bytes: data.total_received(),
            tx_bytes: data.total_transmitted(),
            link_speed_mbps: read_link_speed(name),
        })
        .collect();
    interfaces.sort_by(|a, b| a.name.cmp(&b.name));
    interfaces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(name: &str, rx: u64, tx: u64, speed: Option<u64>) -> InterfaceDetail {
        InterfaceDetail {
            name: name.into(),
            rx_bytes: rx,
            tx_bytes: tx,
            link_speed_mbps: speed,
        }
    }

    #[test]
    fn test_throughput_two_point_delta() {
        let before = NetworkCounters { rx_bytes: 1_000, tx_bytes: 500 };
        let after = NetworkCounters { rx_bytes: 126_000, tx_bytes: 63_000 };
        // 125_000 B over 1 s = 1 Mbit/s on a 10 Mbit/s link
        let t = throughput(before, after, Duration::from_secs(1), 10_000_000.0);
        assert_eq!(t.rx_bytes_per_sec, 125_000.0);
        assert_eq!(t.tx_bytes_per_sec, 62_500.0);
        assert!((t.usage_percent - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_throughput_edge_cases() {
        let a = NetworkCounters { rx_bytes: 10, tx_bytes: 10 };
        let b = NetworkCounters { rx_bytes: 5, tx_bytes: 5 };
        assert_eq!(throughput(a, b, Duration::from_secs(1), 1e6), Throughput::default());
        assert_eq!(throughput(b, a, Duration::ZERO, 1e6), Throughput::default());

        let huge = NetworkCounters { rx_bytes: u64::MAX / 2, tx_bytes: 0 };
        assert_eq!(throughput(NetworkCounters::default(), huge, Duration::from_secs(1), 1e6).usage_percent, 100.0);
    }

    #[test]
    fn test_link_capacity() {
        let known = vec![iface("eth0", 0, 0, Some(1_000)), iface("eth1", 0, 0, Some(100)), iface("wg0", 0, 0, None)];
        assert_eq!(link_capacity_bits(&known, 50), 1_100_000_000.0);

        let unknown = vec![iface("wg0", 0, 0, None)];
        assert_eq!(link_capacity_bits(&unknown, 50), 50_000_000.0);
    }

    #[test]
    fn test_counter_sum() {
        let interfaces = vec![iface("eth0", 100, 10, None), iface("eth1", 50, 5, None)];
        assert_eq!(NetworkCounters::sum(&interfaces), NetworkCounters { rx_bytes: 150, tx_bytes: 15 });
    }

    #[test]
    fn test_loopback_detection() {
        assert!(is_loopback("lo"));
        assert!(is_loopback("lo0"));
        assert!(!is_loopback("eth0"));
        assert!(!is_loopback("wlo1"));
    }
}
