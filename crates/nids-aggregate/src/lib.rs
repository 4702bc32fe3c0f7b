//! Tumbling-window aggregator (C3).
//!
//! Owned exclusively by the ingestion worker: its in-memory window map is
//! never shared with the cycle worker. Completed windows are written to
//! the store and dropped from the map; there is no grace period beyond
//! the natural tumbling boundary.

use nids_common::{MetricVector, NidsResult};
use nids_store::Store;
use std::collections::{HashMap, HashSet};

/// Default window width in seconds. The rest of the pipeline assumes
/// reactive (1-minute) detection; the standalone aggregator CLI may be
/// pointed at a longer window via configuration.
pub const DEFAULT_WINDOW_SECS: f64 = 60.0;

#[derive(Debug, Default)]
struct WindowAcc {
    connections: u64,
    ports: HashSet<u16>,
    dst_ips: HashSet<String>,
    total_bytes: u64,
    window_end: f64,
}

impl WindowAcc {
    fn metrics(&self) -> MetricVector {
        let connections_count = self.connections as f64;
        let avg_packet_size = if self.connections > 0 {
            self.total_bytes as f64 / self.connections as f64
        } else {
            0.0
        };
        MetricVector {
            connections_count,
            unique_ports: self.ports.len() as f64,
            unique_dst_ips: self.dst_ips.len() as f64,
            total_bytes: self.total_bytes as f64,
            avg_packet_size,
        }
    }
}

/// Key identifying one open window: `(window_start, src_ip)`.
type WindowKey = (i64, String);

/// Maintains the open-window map for every source IP and flushes closed
/// windows to the store as the wall clock advances.
pub struct Aggregator {
    window_secs: f64,
    windows: HashMap<WindowKey, WindowAcc>,
    max_timestamp_seen: f64,
}

impl Aggregator {
    pub fn new(window_secs: f64) -> Self {
        Self {
            window_secs,
            windows: HashMap::new(),
            max_timestamp_seen: 0.0,
        }
    }

    fn window_start(&self, timestamp: f64) -> i64 {
        ((timestamp / self.window_secs).floor() * self.window_secs) as i64
    }

    /// Append one event to its window's running counters, then flush any
    /// window whose end has passed relative to this event's timestamp.
    pub fn ingest(&mut self, event: &nids_common::PacketEvent, store: &Store) -> NidsResult<()> {
        let window_start = self.window_start(event.timestamp);
        let window_end = window_start as f64 + self.window_secs;
        let key = (window_start, event.src_ip.clone());

        let acc = self.windows.entry(key).or_insert_with(|| WindowAcc {
            window_end,
            ..Default::default()
        });
        acc.connections += 1;
        if let Some(p) = event.dst_port {
            acc.ports.insert(p);
        }
        acc.dst_ips.insert(event.dst_ip.clone());
        acc.total_bytes += event.packet_size;

        self.max_timestamp_seen = self.max_timestamp_seen.max(event.timestamp);
        self.flush_closed(event.timestamp, store)
    }

    /// Flush every window whose `window_start + W <= at`, writing its
    /// metrics to the store and removing it from the open set.
    fn flush_closed(&mut self, at: f64, store: &Store) -> NidsResult<()> {
        let closed: Vec<WindowKey> = self
            .windows
            .iter()
            .filter(|(_, acc)| acc.window_end <= at)
            .map(|(k, _)| k.clone())
            .collect();
        for key in closed {
            if let Some(acc) = self.windows.remove(&key) {
                let (window_start, src_ip) = key;
                let metrics = acc.metrics();
                tracing::debug!(src_ip = %src_ip, window_start, connections = metrics.connections_count, "flushing closed window");
                store.write_window(&src_ip, window_start as f64, acc.window_end, metrics)?;
            }
        }
        Ok(())
    }

    /// Flush all open windows unconditionally. Used on shutdown and by
    /// the orchestrator's cancellation path.
    pub fn flush_all(&mut self, store: &Store) -> NidsResult<()> {
        let keys: Vec<WindowKey> = self.windows.keys().cloned().collect();
        tracing::info!(count = keys.len(), "flushing all open windows");
        for key in keys {
            if let Some(acc) = self.windows.remove(&key) {
                let (window_start, src_ip) = key;
                store.write_window(&src_ip, window_start as f64, acc.window_end, acc.metrics())?;
            }
        }
        Ok(())
    }

    /// Number of windows currently open, bounded by the distinct
    /// `(src_ip, window)` pairs active within one `W`.
    pub fn open_window_count(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nids_common::{Direction, PacketEvent, Protocol};

    fn event(ts: f64, src: &str, dst_port: u16) -> PacketEvent {
        PacketEvent {
            timestamp: ts,
            src_ip: src.into(),
            dst_ip: "127.0.0.1".into(),
            src_port: Some(1234),
            dst_port: Some(dst_port),
            protocol: Protocol::Tcp,
            packet_size: 100,
            direction: Direction::In,
        }
    }

    #[test]
    fn window_flushes_on_clock_advance() {
        let store = Store::open_in_memory().unwrap();
        let mut agg = Aggregator::new(60.0);
        for port in 1..=5u16 {
            agg.ingest(&event(10.0, "1.2.3.4", port), &store).unwrap();
        }
        assert_eq!(agg.open_window_count(), 1);

        // Advance the clock past window_start(10)+60 = 60.
        agg.ingest(&event(65.0, "1.2.3.4", 6), &store).unwrap();

        let (window_start, metrics) = store.latest_window_metrics("1.2.3.4").unwrap().unwrap();
        assert_eq!(window_start, 0.0);
        assert_eq!(metrics.connections_count, 5.0);
        assert_eq!(metrics.unique_ports, 5.0);
    }

    #[test]
    fn invariants_hold_for_closed_window() {
        let store = Store::open_in_memory().unwrap();
        let mut agg = Aggregator::new(60.0);
        for port in [10u16, 10, 20] {
            agg.ingest(&event(5.0, "9.9.9.9", port), &store).unwrap();
        }
        agg.flush_all(&store).unwrap();
        let (_, m) = store.latest_window_metrics("9.9.9.9").unwrap().unwrap();
        assert!(m.connections_count >= m.unique_ports);
        assert_eq!(m.avg_packet_size * m.connections_count, m.total_bytes);
    }

    #[test]
    fn flush_all_persists_open_windows_on_shutdown() {
        let store = Store::open_in_memory().unwrap();
        let mut agg = Aggregator::new(60.0);
        agg.ingest(&event(5.0, "1.1.1.1", 80), &store).unwrap();
        assert_eq!(agg.open_window_count(), 1);
        agg.flush_all(&store).unwrap();
        assert_eq!(agg.open_window_count(), 0);
        assert!(store.latest_window_metrics("1.1.1.1").unwrap().is_some());
    }

    #[test]
    fn late_event_opens_its_own_window_without_grace_period() {
        let store = Store::open_in_memory().unwrap();
        let mut agg = Aggregator::new(60.0);
        agg.ingest(&event(200.0, "2.2.2.2", 80), &store).unwrap();
        agg.ingest(&event(10.0, "2.2.2.2", 81), &store).unwrap();
        // The late (earlier-timestamp) event gets its own window_start=0
        // bucket rather than being merged into window_start=180.
        assert_eq!(agg.open_window_count(), 2);
    }

    #[test]
    fn idempotence_holds_per_row() {
        let store = Store::open_in_memory().unwrap();
        let mut agg = Aggregator::new(60.0);
        let e = event(5.0, "3.3.3.3", 80);
        agg.ingest(&e, &store).unwrap();
        agg.ingest(&e, &store).unwrap();
        agg.flush_all(&store).unwrap();
        let (_, m) = store.latest_window_metrics("3.3.3.3").unwrap().unwrap();
        assert_eq!(m.connections_count, 2.0);
    }
}
