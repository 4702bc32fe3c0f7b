//! DDL for the store's tables and indexes.

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS aggregated_metrics (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp   REAL NOT NULL,
    src_ip      TEXT NOT NULL,
    metric_name TEXT NOT NULL,
    metric_value REAL NOT NULL,
    window_start REAL NOT NULL,
    window_end   REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_agg_src_metric_window
    ON aggregated_metrics(src_ip, metric_name, window_start DESC);
CREATE INDEX IF NOT EXISTS idx_agg_timestamp ON aggregated_metrics(timestamp);

CREATE TABLE IF NOT EXISTS raw_events (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp   REAL NOT NULL,
    src_ip      TEXT NOT NULL,
    dst_ip      TEXT NOT NULL,
    src_port    INTEGER,
    dst_port    INTEGER,
    protocol    TEXT NOT NULL,
    packet_size INTEGER NOT NULL,
    direction   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS host_baselines (
    src_ip       TEXT NOT NULL,
    metric_name  TEXT NOT NULL,
    mean         REAL NOT NULL,
    std          REAL NOT NULL,
    sample_count INTEGER NOT NULL,
    min          REAL NOT NULL,
    max          REAL NOT NULL,
    last_updated REAL NOT NULL,
    is_learning  INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (src_ip, metric_name)
);

CREATE TABLE IF NOT EXISTS signature_rules (
    sid       INTEGER PRIMARY KEY,
    raw       TEXT NOT NULL,
    category  TEXT NOT NULL,
    enabled   INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS signature_alerts (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp REAL NOT NULL,
    sid       INTEGER NOT NULL,
    src_ip    TEXT NOT NULL,
    dst_ip    TEXT NOT NULL,
    src_port  INTEGER,
    dst_port  INTEGER,
    protocol  TEXT NOT NULL,
    msg       TEXT NOT NULL,
    severity  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sig_timestamp ON signature_alerts(timestamp);
CREATE INDEX IF NOT EXISTS idx_sig_src_ip ON signature_alerts(src_ip);
CREATE INDEX IF NOT EXISTS idx_sig_severity ON signature_alerts(severity);

CREATE TABLE IF NOT EXISTS stat_alerts (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp   REAL NOT NULL,
    src_ip      TEXT NOT NULL,
    metric_name TEXT NOT NULL,
    current     REAL NOT NULL,
    mean        REAL NOT NULL,
    std         REAL NOT NULL,
    z_score     REAL NOT NULL,
    severity    TEXT NOT NULL,
    description TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_stat_timestamp ON stat_alerts(timestamp);
CREATE INDEX IF NOT EXISTS idx_stat_src_ip ON stat_alerts(src_ip);
CREATE INDEX IF NOT EXISTS idx_stat_severity ON stat_alerts(severity);

CREATE TABLE IF NOT EXISTS ml_training_data (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    src_ip       TEXT NOT NULL,
    window_start REAL NOT NULL,
    connections_count REAL NOT NULL,
    unique_ports REAL NOT NULL,
    unique_dst_ips REAL NOT NULL,
    total_bytes REAL NOT NULL,
    avg_packet_size REAL NOT NULL,
    is_normal    INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS idx_train_window ON ml_training_data(src_ip, window_start);

CREATE TABLE IF NOT EXISTS ml_model_metrics (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    trained_at   REAL NOT NULL,
    n_samples    INTEGER NOT NULL,
    n_features   INTEGER NOT NULL,
    contamination REAL NOT NULL,
    notes        TEXT
);

CREATE TABLE IF NOT EXISTS ml_alerts (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp     REAL NOT NULL,
    src_ip        TEXT NOT NULL,
    ml_score      REAL NOT NULL,
    stat_score    REAL NOT NULL,
    combined_score REAL NOT NULL,
    severity      TEXT NOT NULL,
    description   TEXT NOT NULL,
    top_features  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ml_timestamp ON ml_alerts(timestamp);
CREATE INDEX IF NOT EXISTS idx_ml_src_ip ON ml_alerts(src_ip);

CREATE TABLE IF NOT EXISTS hybrid_verdicts (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp      REAL NOT NULL,
    src_ip         TEXT NOT NULL,
    sig_score      REAL NOT NULL,
    stat_score     REAL NOT NULL,
    ml_score       REAL NOT NULL,
    combined_score REAL NOT NULL,
    severity       TEXT NOT NULL,
    confidence     TEXT NOT NULL,
    details_json   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_verdict_timestamp ON hybrid_verdicts(timestamp);
CREATE INDEX IF NOT EXISTS idx_verdict_src_ip ON hybrid_verdicts(src_ip);
CREATE INDEX IF NOT EXISTS idx_verdict_severity ON hybrid_verdicts(severity);
"#;
