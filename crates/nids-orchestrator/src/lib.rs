//! Orchestrator (C8): wires the packet-driven ingestion path (C1→C3,
//! C1→C4) and the periodic cycle path (C5→C6→C7).
//!
//! Two logical workers, communicating only through the Store: the
//! ingestion worker owns the Aggregator's window map exclusively and
//! never shares it; the cycle worker only reads/writes through `Store`.
//! Both are plain blocking loops run on dedicated OS threads -- nothing
//! here requires cooperative yielding, so the same code works whether
//! the host process is single- or multi-threaded.

#![warn(missing_docs)]

use nids_aggregate::Aggregator;
use nids_capture::PacketSource;
use nids_common::{now_secs, NidsResult};
use nids_ml::MlDetector;
use nids_rules::RuleMatcher;
use nids_scorer::HybridScorer;
use nids_stat::StatDetector;
use nids_store::Store;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Tunables for one orchestrator run, mirroring the CLI surface's
/// `--window`, `--threshold`, `--interval` flags.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub window_secs: f64,
    pub z_threshold: f64,
    pub cycle_interval: Duration,
    /// Attempt an ML auto-train every Nth cycle.
    pub auto_train_every: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            window_secs: nids_aggregate::DEFAULT_WINDOW_SECS,
            z_threshold: nids_stat::Z_THRESHOLD,
            cycle_interval: Duration::from_secs(60),
            auto_train_every: 10,
        }
    }
}

/// Runs the ingestion worker until the source is exhausted or `shutdown`
/// fires, feeding every event to the aggregator and rule matcher and
/// flushing all open windows on exit.
pub fn run_ingestion(
    store: Arc<Store>,
    matcher: Arc<RuleMatcher>,
    mut source: impl PacketSource,
    window_secs: f64,
    mut shutdown: watch::Receiver<bool>,
) -> NidsResult<()> {
    let mut aggregator = Aggregator::new(window_secs);
    loop {
        if *shutdown.borrow() {
            break;
        }
        match source.next_event()? {
            None => break,
            Some(event) => {
                aggregator.ingest(&event, &store)?;
                for alert in matcher.match_packet(&event) {
                    store.insert_signature_alert(&alert)?;
                }
            }
        }
    }
    aggregator.flush_all(&store)
}

/// Runs one C5 → C6 → C7 detection cycle over every host with a window
/// observed in the last 300 s.
fn run_one_cycle(store: &Store, stat: &StatDetector, ml: &RwLock<MlDetector>, cycle_index: u64, auto_train_every: u64) {
    let now = now_secs();
    let hosts = match store.hosts_with_recent_window(now, nids_scorer::HOST_RECENCY_SECS) {
        Ok(h) => h,
        Err(e) => {
            tracing::warn!(error = %e, "failed to list recent hosts; skipping cycle");
            return;
        }
    };

    for host in &hosts {
        let is_anomalous = store
            .has_signature_alert_in_window(host, now - nids_aggregate::DEFAULT_WINDOW_SECS, nids_aggregate::DEFAULT_WINDOW_SECS)
            .unwrap_or(false);
        if let Err(e) = stat.process_host(store, host, is_anomalous) {
            tracing::warn!(src_ip = %host, error = %e, "stat detector failed for host");
        }
    }

    if cycle_index > 0 && cycle_index % auto_train_every == 0 {
        match ml.write().train(store, false) {
            Ok(outcome) => tracing::info!(?outcome, "ml auto-train attempt"),
            Err(e) => tracing::warn!(error = %e, "ml auto-train failed"),
        }
    }

    let detector = ml.read();
    for host in &hosts {
        if let Err(e) = detector.apply_to_host(store, host) {
            tracing::warn!(src_ip = %host, error = %e, "ml detector failed for host");
        }
    }

    if let Err(e) = HybridScorer::run_cycle(store, &detector) {
        tracing::warn!(error = %e, "hybrid scorer cycle failed");
    }
}

/// Runs the periodic cycle worker until `shutdown` fires. Each cycle's
/// fault is caught and logged so a single bad cycle never stops the
/// next one; a slow cycle simply delays the following tick rather than
/// queueing missed ticks (`tokio::time::interval`'s default behavior).
pub async fn run_cycles(
    store: Arc<Store>,
    stat: StatDetector,
    ml: Arc<RwLock<MlDetector>>,
    config: OrchestratorConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(config.cycle_interval);
    let mut cycle_index = 0u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_one_cycle(&store, &stat, &ml, cycle_index, config.auto_train_every);
                cycle_index += 1;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// A shutdown handle: drop or call [`Shutdown::signal`] to stop both
/// workers cleanly.
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, rx)
    }

    /// Signal both workers to stop at their next suspension point.
    pub fn signal(&self) {
        let _ = self.tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nids_common::{Direction, PacketEvent, Protocol};
    use nids_rules::DEFAULT_RULES;
    use std::sync::Mutex;

    struct VecSource {
        events: Mutex<Vec<PacketEvent>>,
    }

    impl PacketSource for VecSource {
        fn next_event(&mut self) -> NidsResult<Option<PacketEvent>> {
            Ok(self.events.lock().unwrap().pop())
        }
    }

    #[test]
    fn ingestion_flushes_open_windows_on_exhaustion() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let matcher = Arc::new(RuleMatcher::new());
        matcher.load_from_text(DEFAULT_RULES).unwrap();

        let event = PacketEvent {
            timestamp: 5.0,
            src_ip: "1.2.3.4".into(),
            dst_ip: "127.0.0.1".into(),
            src_port: Some(4444),
            dst_port: Some(22),
            protocol: Protocol::Tcp,
            packet_size: 64,
            direction: Direction::Out,
        };
        let source = VecSource {
            events: Mutex::new(vec![event]),
        };
        let (_shutdown, rx) = Shutdown::new();
        run_ingestion(store.clone(), matcher, source, 60.0, rx).unwrap();

        let (_, metrics) = store.latest_window_metrics("1.2.3.4").unwrap().unwrap();
        assert_eq!(metrics.connections_count, 1.0);
        let sigs = store.recent_signature_alerts("1.2.3.4", now_secs() + 10.0, 1000.0).unwrap();
        assert!(!sigs.is_empty());
    }
}
