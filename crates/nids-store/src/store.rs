//! SQLite-backed implementation of the pipeline's persistent store.
//!
//! A single connection behind a `Mutex` serializes all writes; the
//! concurrency design accepts this because detection cycles are not
//! latency sensitive and the ingestion path only blocks briefly per
//! packet. Window writes use an explicit transaction so a window's five
//! metric rows become visible atomically -- never partially written.

use crate::rows::*;
use crate::schema::SCHEMA;
use nids_common::{MetricVector, NidsError, NidsResult, PacketEvent, Severity, FEATURE_NAMES};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

fn severity_to_str(s: Severity) -> &'static str {
    s.as_str()
}

fn severity_from_str(s: &str) -> Severity {
    match s {
        "critical" => Severity::Critical,
        "high" => Severity::High,
        "medium" => Severity::Medium,
        _ => Severity::Low,
    }
}

/// Persistent store for the detection pipeline.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (creating if absent) a SQLite database at `path` and ensure
    /// the schema exists.
    pub fn open(path: impl AsRef<Path>) -> NidsResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| NidsError::StoreError(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| NidsError::StoreError(e.to_string()))?;
        tracing::info!(path = %path.display(), "store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests and the standalone CLI demos.
    pub fn open_in_memory() -> NidsResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| NidsError::StoreError(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| NidsError::StoreError(e.to_string()))?;
        tracing::debug!("in-memory store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // -- Aggregated metrics / windows ------------------------------------

    /// Atomically persist all five metric rows for one closed window.
    pub fn write_window(
        &self,
        src_ip: &str,
        window_start: f64,
        window_end: f64,
        metrics: MetricVector,
    ) -> NidsResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(store_err)?;
        for (name, value) in FEATURE_NAMES.iter().zip(metrics.as_array()) {
            tx.execute(
                "INSERT INTO aggregated_metrics (timestamp, src_ip, metric_name, metric_value, window_start, window_end)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![window_start, src_ip, name, value, window_start, window_end],
            )
            .map_err(store_err)?;
        }
        tx.commit().map_err(store_err)
    }

    pub fn insert_raw_event(&self, event: &PacketEvent) -> NidsResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO raw_events (timestamp, src_ip, dst_ip, src_port, dst_port, protocol, packet_size, direction)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.timestamp,
                event.src_ip,
                event.dst_ip,
                event.src_port,
                event.dst_port,
                event.protocol.as_str(),
                event.packet_size,
                event.direction.as_str(),
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    /// The last `limit` historical values for `(src_ip, metric_name)`,
    /// most recent first.
    pub fn recent_metric_values(
        &self,
        src_ip: &str,
        metric_name: &str,
        limit: usize,
    ) -> NidsResult<Vec<f64>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT metric_value FROM aggregated_metrics
                 WHERE src_ip = ?1 AND metric_name = ?2
                 ORDER BY window_start DESC LIMIT ?3",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![src_ip, metric_name, limit as i64], |r| r.get::<_, f64>(0))
            .map_err(store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(store_err)
    }

    /// The most recent window's full metric vector for `src_ip`, if any.
    pub fn latest_window_metrics(&self, src_ip: &str) -> NidsResult<Option<(f64, MetricVector)>> {
        let conn = self.conn.lock();
        let window_start: Option<f64> = conn
            .query_row(
                "SELECT MAX(window_start) FROM aggregated_metrics WHERE src_ip = ?1",
                params![src_ip],
                |r| r.get(0),
            )
            .optional()
            .map_err(store_err)?
            .flatten();
        let Some(window_start) = window_start else {
            return Ok(None);
        };
        let mut stmt = conn
            .prepare(
                "SELECT metric_name, metric_value FROM aggregated_metrics
                 WHERE src_ip = ?1 AND window_start = ?2",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![src_ip, window_start], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, f64>(1)?))
            })
            .map_err(store_err)?;

        let mut mv = MetricVector::default();
        let mut n = 0;
        for row in rows {
            let (name, value) = row.map_err(store_err)?;
            match name.as_str() {
                "connections_count" => mv.connections_count = value,
                "unique_ports" => mv.unique_ports = value,
                "unique_dst_ips" => mv.unique_dst_ips = value,
                "total_bytes" => mv.total_bytes = value,
                "avg_packet_size" => mv.avg_packet_size = value,
                _ => {}
            }
            n += 1;
        }
        if n < FEATURE_NAMES.len() {
            return Ok(None);
        }
        Ok(Some((window_start, mv)))
    }

    /// Distinct source IPs with a window observed within the last
    /// `since_secs` seconds of `now`.
    pub fn hosts_with_recent_window(&self, now: f64, since_secs: f64) -> NidsResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT DISTINCT src_ip FROM aggregated_metrics WHERE timestamp > ?1")
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![now - since_secs], |r| r.get::<_, String>(0))
            .map_err(store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(store_err)
    }

    // -- Host baselines ---------------------------------------------------

    pub fn get_baseline(&self, src_ip: &str, metric_name: &str) -> NidsResult<Option<HostBaselineRow>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT src_ip, metric_name, mean, std, sample_count, min, max, last_updated, is_learning
             FROM host_baselines WHERE src_ip = ?1 AND metric_name = ?2",
            params![src_ip, metric_name],
            |r| {
                Ok(HostBaselineRow {
                    src_ip: r.get(0)?,
                    metric_name: r.get(1)?,
                    mean: r.get(2)?,
                    std: r.get(3)?,
                    sample_count: r.get::<_, i64>(4)? as u64,
                    min: r.get(5)?,
                    max: r.get(6)?,
                    last_updated: r.get(7)?,
                    is_learning: r.get::<_, i64>(8)? != 0,
                })
            },
        )
        .optional()
        .map_err(store_err)
    }

    pub fn upsert_baseline(&self, row: &HostBaselineRow) -> NidsResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO host_baselines (src_ip, metric_name, mean, std, sample_count, min, max, last_updated, is_learning)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(src_ip, metric_name) DO UPDATE SET
                mean=excluded.mean, std=excluded.std, sample_count=excluded.sample_count,
                min=excluded.min, max=excluded.max, last_updated=excluded.last_updated,
                is_learning=excluded.is_learning",
            params![
                row.src_ip,
                row.metric_name,
                row.mean,
                row.std,
                row.sample_count as i64,
                row.min,
                row.max,
                row.last_updated,
                row.is_learning as i64
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    // -- Signature alerts --------------------------------------------------

    pub fn insert_signature_alert(&self, alert: &nids_rules::SignatureAlert) -> NidsResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO signature_alerts (timestamp, sid, src_ip, dst_ip, src_port, dst_port, protocol, msg, severity)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                alert.timestamp,
                alert.sid,
                alert.src_ip,
                alert.dst_ip,
                alert.src_port,
                alert.dst_port,
                alert.protocol,
                alert.msg,
                severity_to_str(alert.severity)
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    /// Signature alerts for `src_ip` in the trailing `window_secs` seconds
    /// before `now`, most recent first, capped at 20 rows (matches the
    /// sig-score layer's bounded lookback).
    pub fn recent_signature_alerts(
        &self,
        src_ip: &str,
        now: f64,
        window_secs: f64,
    ) -> NidsResult<Vec<(f64, Severity)>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT timestamp, severity FROM signature_alerts
                 WHERE src_ip = ?1 AND timestamp > ?2
                 ORDER BY timestamp DESC LIMIT 20",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![src_ip, now - window_secs], |r| {
                Ok((r.get::<_, f64>(0)?, severity_from_str(&r.get::<_, String>(1)?)))
            })
            .map_err(store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(store_err)
    }

    pub fn recent_signature_messages(
        &self,
        src_ip: &str,
        now: f64,
        window_secs: f64,
    ) -> NidsResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT msg FROM signature_alerts WHERE src_ip = ?1 AND timestamp > ?2
                 ORDER BY timestamp DESC LIMIT 20",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![src_ip, now - window_secs], |r| r.get::<_, String>(0))
            .map_err(store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(store_err)
    }

    /// Whether an enabled signature alert landed for `src_ip` within the
    /// window `[window_start, window_start + w)` -- used by the stat
    /// detector's training-on-attack guard.
    pub fn has_signature_alert_in_window(
        &self,
        src_ip: &str,
        window_start: f64,
        window_len: f64,
    ) -> NidsResult<bool> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM signature_alerts WHERE src_ip = ?1 AND timestamp >= ?2 AND timestamp < ?3",
                params![src_ip, window_start, window_start + window_len],
                |r| r.get(0),
            )
            .map_err(store_err)?;
        Ok(count > 0)
    }

    // -- Stat alerts --------------------------------------------------------

    pub fn insert_stat_alert(&self, row: &StatAlertRow) -> NidsResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO stat_alerts (timestamp, src_ip, metric_name, current, mean, std, z_score, severity, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                row.timestamp,
                row.src_ip,
                row.metric_name,
                row.current,
                row.mean,
                row.std,
                row.z_score,
                severity_to_str(row.severity),
                row.description
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    // -- ML training data / model metrics -----------------------------------

    pub fn insert_training_sample(&self, row: &TrainingSampleRow) -> NidsResult<()> {
        let conn = self.conn.lock();
        let m = row.metrics;
        conn.execute(
            "INSERT INTO ml_training_data
                (src_ip, window_start, connections_count, unique_ports, unique_dst_ips, total_bytes, avg_packet_size, is_normal)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.src_ip,
                row.window_start as f64,
                m.connections_count,
                m.unique_ports,
                m.unique_dst_ips,
                m.total_bytes,
                m.avg_packet_size,
                row.is_normal as i64
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    pub fn training_sample_count(&self) -> NidsResult<u64> {
        let conn = self.conn.lock();
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM ml_training_data WHERE is_normal = 1",
                [],
                |r| r.get(0),
            )
            .map_err(store_err)?;
        Ok(n as u64)
    }

    pub fn all_training_samples(&self) -> NidsResult<Vec<MetricVector>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT connections_count, unique_ports, unique_dst_ips, total_bytes, avg_packet_size
                 FROM ml_training_data WHERE is_normal = 1",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map([], |r| {
                Ok(MetricVector {
                    connections_count: r.get(0)?,
                    unique_ports: r.get(1)?,
                    unique_dst_ips: r.get(2)?,
                    total_bytes: r.get(3)?,
                    avg_packet_size: r.get(4)?,
                })
            })
            .map_err(store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(store_err)
    }

    /// Copy any `(src_ip, window_start)` windows not yet represented in
    /// the training table into it, deduped by a 1-second timestamp match.
    pub fn collect_untrained_windows(&self) -> NidsResult<u64> {
        let conn = self.conn.lock();
        let mut select = conn
            .prepare(
                "SELECT DISTINCT src_ip, window_start FROM aggregated_metrics am
                 WHERE NOT EXISTS (
                    SELECT 1 FROM ml_training_data td
                    WHERE td.src_ip = am.src_ip AND ABS(td.window_start - am.window_start) < 1
                 )",
            )
            .map_err(store_err)?;
        let candidates: Vec<(String, f64)> = select
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, f64>(1)?)))
            .map_err(store_err)?
            .collect::<Result<_, _>>()
            .map_err(store_err)?;
        drop(select);

        let mut inserted = 0u64;
        for (src_ip, window_start) in candidates {
            let mut metrics_stmt = conn
                .prepare("SELECT metric_name, metric_value FROM aggregated_metrics WHERE src_ip = ?1 AND window_start = ?2")
                .map_err(store_err)?;
            let rows: Vec<(String, f64)> = metrics_stmt
                .query_map(params![src_ip, window_start], |r| {
                    Ok((r.get::<_, String>(0)?, r.get::<_, f64>(1)?))
                })
                .map_err(store_err)?
                .collect::<Result<_, _>>()
                .map_err(store_err)?;
            if rows.len() < 3 {
                continue;
            }
            let mut mv = MetricVector::default();
            for (name, value) in rows {
                match name.as_str() {
                    "connections_count" => mv.connections_count = value,
                    "unique_ports" => mv.unique_ports = value,
                    "unique_dst_ips" => mv.unique_dst_ips = value,
                    "total_bytes" => mv.total_bytes = value,
                    "avg_packet_size" => mv.avg_packet_size = value,
                    _ => {}
                }
            }
            conn.execute(
                "INSERT INTO ml_training_data
                    (src_ip, window_start, connections_count, unique_ports, unique_dst_ips, total_bytes, avg_packet_size, is_normal)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)",
                params![
                    src_ip,
                    window_start,
                    mv.connections_count,
                    mv.unique_ports,
                    mv.unique_dst_ips,
                    mv.total_bytes,
                    mv.avg_packet_size
                ],
            )
            .map_err(store_err)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    pub fn record_model_training(
        &self,
        trained_at: f64,
        n_samples: u64,
        n_features: u64,
        contamination: f64,
        notes: &str,
    ) -> NidsResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO ml_model_metrics (trained_at, n_samples, n_features, contamination, notes)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![trained_at, n_samples as i64, n_features as i64, contamination, notes],
        )
        .map_err(store_err)?;
        Ok(())
    }

    pub fn training_history(&self, limit: usize) -> NidsResult<Vec<(f64, u64, String)>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT trained_at, n_samples, notes FROM ml_model_metrics ORDER BY trained_at DESC LIMIT ?1")
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![limit as i64], |r| {
                Ok((
                    r.get::<_, f64>(0)?,
                    r.get::<_, i64>(1)? as u64,
                    r.get::<_, Option<String>>(2)?.unwrap_or_default(),
                ))
            })
            .map_err(store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(store_err)
    }

    // -- ML alerts --------------------------------------------------------

    pub fn insert_ml_alert(&self, row: &MlAlertRow) -> NidsResult<()> {
        let conn = self.conn.lock();
        let top_features = serde_json::to_string(&row.top_features).map_err(|e| NidsError::StoreError(e.to_string()))?;
        conn.execute(
            "INSERT INTO ml_alerts (timestamp, src_ip, ml_score, stat_score, combined_score, severity, description, top_features)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.timestamp,
                row.src_ip,
                row.ml_score,
                row.stat_score,
                row.combined_score,
                severity_to_str(row.severity),
                row.description,
                top_features
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    pub fn recent_ml_alerts(&self, limit: usize) -> NidsResult<Vec<MlAlertRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT timestamp, src_ip, ml_score, stat_score, combined_score, severity, description, top_features
                 FROM ml_alerts ORDER BY timestamp DESC LIMIT ?1",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![limit as i64], |r| {
                let top_features_json: String = r.get(7)?;
                Ok((r, top_features_json))
            })
            .map_err(store_err)?;
        let mut out = Vec::new();
        for row in rows {
            let (r, top_features_json) = row.map_err(store_err)?;
            let top_features: Vec<FeatureContribution> =
                serde_json::from_str(&top_features_json).unwrap_or_default();
            out.push(MlAlertRow {
                timestamp: r.get(0).map_err(store_err)?,
                src_ip: r.get(1).map_err(store_err)?,
                ml_score: r.get(2).map_err(store_err)?,
                stat_score: r.get(3).map_err(store_err)?,
                combined_score: r.get(4).map_err(store_err)?,
                severity: severity_from_str(&r.get::<_, String>(5).map_err(store_err)?),
                description: r.get(6).map_err(store_err)?,
                top_features,
            });
        }
        Ok(out)
    }

    // -- Hybrid verdicts ----------------------------------------------------

    pub fn insert_verdict(&self, row: &HybridVerdictRow) -> NidsResult<()> {
        let conn = self.conn.lock();
        let details = serde_json::to_string(&row.details).map_err(|e| NidsError::StoreError(e.to_string()))?;
        conn.execute(
            "INSERT INTO hybrid_verdicts (timestamp, src_ip, sig_score, stat_score, ml_score, combined_score, severity, confidence, details_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                row.timestamp,
                row.src_ip,
                row.sig_score,
                row.stat_score,
                row.ml_score,
                row.combined_score,
                severity_to_str(row.severity),
                row.confidence.as_str(),
                details
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    pub fn recent_verdicts(&self, limit: usize) -> NidsResult<Vec<(f64, String, f64, Severity, String)>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT timestamp, src_ip, combined_score, severity, confidence
                 FROM hybrid_verdicts ORDER BY timestamp DESC LIMIT ?1",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![limit as i64], |r| {
                Ok((
                    r.get::<_, f64>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, f64>(2)?,
                    severity_from_str(&r.get::<_, String>(3)?),
                    r.get::<_, String>(4)?,
                ))
            })
            .map_err(store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(store_err)
    }

    // -- Rules --------------------------------------------------------------

    pub fn upsert_rule(&self, sid: u32, raw: &str, category: &str, enabled: bool) -> NidsResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO signature_rules (sid, raw, category, enabled) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(sid) DO UPDATE SET raw=excluded.raw, category=excluded.category, enabled=excluded.enabled",
            params![sid, raw, category, enabled as i64],
        )
        .map_err(store_err)?;
        Ok(())
    }

    pub fn all_rule_texts(&self) -> NidsResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT raw FROM signature_rules WHERE enabled = 1")
            .map_err(store_err)?;
        let rows = stmt
            .query_map([], |r| r.get::<_, String>(0))
            .map_err(store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(store_err)
    }
}

fn store_err(e: rusqlite::Error) -> NidsError {
    NidsError::StoreError(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nids_common::MetricVector;

    #[test]
    fn window_write_is_atomic_and_readable() {
        let store = Store::open_in_memory().unwrap();
        let mv = MetricVector {
            connections_count: 10.0,
            unique_ports: 5.0,
            unique_dst_ips: 2.0,
            total_bytes: 1000.0,
            avg_packet_size: 100.0,
        };
        store.write_window("1.2.3.4", 60.0, 120.0, mv).unwrap();
        let (window_start, got) = store.latest_window_metrics("1.2.3.4").unwrap().unwrap();
        assert_eq!(window_start, 60.0);
        assert_eq!(got.connections_count, 10.0);
    }

    #[test]
    fn baseline_upsert_then_get_roundtrips() {
        let store = Store::open_in_memory().unwrap();
        let row = HostBaselineRow {
            src_ip: "1.2.3.4".into(),
            metric_name: "connections_count".into(),
            mean: 10.0,
            std: 2.0,
            sample_count: 5,
            min: 1.0,
            max: 20.0,
            last_updated: 100.0,
            is_learning: true,
        };
        store.upsert_baseline(&row).unwrap();
        let got = store.get_baseline("1.2.3.4", "connections_count").unwrap().unwrap();
        assert_eq!(got.mean, 10.0);
        assert_eq!(got.sample_count, 5);
    }

    #[test]
    fn training_sample_count_only_counts_normal() {
        let store = Store::open_in_memory().unwrap();
        for i in 0..3 {
            store
                .insert_training_sample(&TrainingSampleRow {
                    src_ip: "1.2.3.4".into(),
                    window_start: i,
                    metrics: MetricVector::default(),
                    is_normal: true,
                })
                .unwrap();
        }
        store
            .insert_training_sample(&TrainingSampleRow {
                src_ip: "1.2.3.4".into(),
                window_start: 99,
                metrics: MetricVector::default(),
                is_normal: false,
            })
            .unwrap();
        assert_eq!(store.training_sample_count().unwrap(), 3);
    }
}
