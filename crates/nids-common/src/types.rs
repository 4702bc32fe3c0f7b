//! Shared domain types that cross component boundaries: packet events,
//! protocol/direction classification, metric vectors and severity.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// L4 protocol observed on a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    Other,
}

impl Protocol {
    /// Parse a protocol name case-insensitively, defaulting unknown values
    /// to `Other` rather than erroring -- the capture source should never
    /// abort a packet over an unrecognized protocol string.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "TCP" => Protocol::Tcp,
            "UDP" => Protocol::Udp,
            "ICMP" => Protocol::Icmp,
            _ => Protocol::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Icmp => "ICMP",
            Protocol::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Traffic direction relative to the RFC1918 + loopback "local" address
/// space. Computed from (src, dst) membership, never taken from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Both endpoints local.
    Internal,
    /// Local source, external destination.
    Out,
    /// External source, local destination.
    In,
    /// Both endpoints external.
    External,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Internal => "internal",
            Direction::Out => "out",
            Direction::In => "in",
            Direction::External => "external",
        }
    }

    /// Classify direction from source/destination IPv4 addresses using the
    /// RFC1918 private ranges plus loopback as "local".
    pub fn classify(src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        match (is_local(src), is_local(dst)) {
            (true, true) => Direction::Internal,
            (true, false) => Direction::Out,
            (false, true) => Direction::In,
            (false, false) => Direction::External,
        }
    }
}

/// True if `addr` falls in 10/8, 172.16/12, 192.168/16, or 127/8.
pub fn is_local(addr: Ipv4Addr) -> bool {
    let o = addr.octets();
    o[0] == 10
        || (o[0] == 172 && (16..=31).contains(&o[1]))
        || (o[0] == 192 && o[1] == 168)
        || o[0] == 127
}

/// One observed L3/L4 frame, decoded from a raw capture. Immutable once
/// constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketEvent {
    /// Monotonic capture timestamp, seconds since epoch.
    pub timestamp: f64,
    pub src_ip: String,
    pub dst_ip: String,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
    pub protocol: Protocol,
    pub packet_size: u64,
    pub direction: Direction,
}

/// Fixed, ordered list of the five metrics computed per window. The order
/// is load-bearing: the ML feature vector and baseline rows both key off
/// this exact sequence.
pub const FEATURE_NAMES: [&str; 5] = [
    "connections_count",
    "unique_ports",
    "unique_dst_ips",
    "total_bytes",
    "avg_packet_size",
];

/// The five scalar metrics computed for one closed window.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MetricVector {
    pub connections_count: f64,
    pub unique_ports: f64,
    pub unique_dst_ips: f64,
    pub total_bytes: f64,
    pub avg_packet_size: f64,
}

impl MetricVector {
    /// Values in `FEATURE_NAMES` order, the layout the ML and stat layers
    /// both expect.
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.connections_count,
            self.unique_ports,
            self.unique_dst_ips,
            self.total_bytes,
            self.avg_packet_size,
        ]
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "connections_count" => Some(self.connections_count),
            "unique_ports" => Some(self.unique_ports),
            "unique_dst_ips" => Some(self.unique_dst_ips),
            "total_bytes" => Some(self.total_bytes),
            "avg_packet_size" => Some(self.avg_packet_size),
            _ => None,
        }
    }
}

/// Severity tier shared by all three alert layers. Ordered low < medium
/// < high < critical so thresholds can be compared directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// MIN_STD floor applied to every baseline standard deviation so z-scores
/// never divide by (near-)zero.
pub const MIN_STD: f64 = 1e-2;

/// Default z-score threshold past which a metric is considered anomalous.
pub const Z_THRESHOLD: f64 = 3.0;

/// Current wall-clock time in fractional seconds since the epoch.
pub fn now_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_classification() {
        let local = "192.168.1.10".parse().unwrap();
        let ext = "8.8.8.8".parse().unwrap();
        assert_eq!(Direction::classify(local, ext), Direction::Out);
        assert_eq!(Direction::classify(ext, local), Direction::In);
        assert_eq!(Direction::classify(local, local), Direction::Internal);
        assert_eq!(Direction::classify(ext, ext), Direction::External);
    }

    #[test]
    fn loopback_is_local() {
        assert!(is_local("127.0.0.1".parse().unwrap()));
    }

    #[test]
    fn rfc1918_ranges() {
        assert!(is_local("10.0.0.1".parse().unwrap()));
        assert!(is_local("172.16.0.1".parse().unwrap()));
        assert!(is_local("172.31.255.255".parse().unwrap()));
        assert!(!is_local("172.32.0.1".parse().unwrap()));
        assert!(is_local("192.168.0.1".parse().unwrap()));
        assert!(!is_local("1.1.1.1".parse().unwrap()));
    }

    #[test]
    fn metric_vector_array_order_matches_feature_names() {
        let mv = MetricVector {
            connections_count: 1.0,
            unique_ports: 2.0,
            unique_dst_ips: 3.0,
            total_bytes: 4.0,
            avg_packet_size: 5.0,
        };
        assert_eq!(mv.as_array(), [1.0, 2.0, 3.0, 4.0, 5.0]);
        for name in FEATURE_NAMES {
            assert!(mv.get(name).is_some());
        }
    }
}
