//! Standalone entry point: each detection subsystem can run alone,
//! piped from the next, or as the fully wired orchestrator.
//!
//! ```text
//! nids aggregate --db metrics.db --window 1   < packets.ndjson
//! nids match     --db metrics.db              < packets.ndjson
//! nids orchestrate --iface eth0 --db metrics.db --window 1 --threshold 3 --interval 60
//! nids train --db metrics.db --force
//! nids serve --db metrics.db --addr 0.0.0.0:8089
//! ```

use clap::{Parser, Subcommand};
use nids_aggregate::Aggregator;
use nids_api::state::ApiState;
use nids_capture::{NdjsonSource, PacketSource};
use nids_common::{NidsError, NidsResult};
use nids_ml::MlDetector;
use nids_orchestrator::{run_cycles, run_ingestion, OrchestratorConfig, Shutdown};
use nids_rules::{RuleMatcher, DEFAULT_RULES};
use nids_stat::StatDetector;
use nids_store::Store;
use parking_lot::RwLock;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "nids")]
#[command(about = "Host-deployed intrusion detection engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reads NDJSON PacketEvents on stdin, writes tumbling-window metrics (C1→C3).
    Aggregate {
        #[arg(long)]
        db: PathBuf,
        /// Window width in minutes.
        #[arg(long, default_value_t = 10.0)]
        window: f64,
    },
    /// Reads NDJSON PacketEvents on stdin, writes signature alerts (C1→C4).
    Match {
        #[arg(long)]
        db: PathBuf,
    },
    /// Runs the full pipeline: ingestion plus the periodic C5→C6→C7 cycle.
    Orchestrate {
        /// Capture interface; requires the `live` build feature.
        #[arg(long)]
        iface: Option<String>,
        #[arg(long)]
        db: PathBuf,
        #[arg(long, default_value_t = 1.0)]
        window: f64,
        #[arg(long, default_value_t = nids_stat::Z_THRESHOLD)]
        threshold: f64,
        #[arg(long, default_value_t = 60)]
        interval: u64,
    },
    /// Trains (or collects training samples for) the ML detector.
    Train {
        #[arg(long)]
        db: PathBuf,
        /// Accepted for CLI-surface parity; the model artifact stays
        /// in-process, its on-disk format is not part of this engine.
        #[arg(long)]
        model: Option<PathBuf>,
        #[arg(long)]
        force: bool,
        /// Only copy untrained windows into the training table, skip fitting.
        #[arg(long)]
        collect: bool,
    },
    /// Serves the read-only query API (C9).
    Serve {
        #[arg(long)]
        db: PathBuf,
        #[arg(long, default_value = "127.0.0.1:8089")]
        addr: SocketAddr,
    },
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Aggregate { db, window } => run_aggregate(db, window * 60.0),
        Commands::Match { db } => run_match(db),
        Commands::Orchestrate { iface, db, window, threshold, interval } => {
            run_orchestrate(iface, db, window * 60.0, threshold, interval)
        }
        Commands::Train { db, model, force, collect } => run_train(db, model, force, collect),
        Commands::Serve { db, addr } => run_serve(db, addr),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "fatal error");
        std::process::exit(1);
    }
}

fn stdin_source() -> NdjsonSource<BufReader<std::io::Stdin>> {
    NdjsonSource::new(BufReader::new(std::io::stdin()))
}

fn run_aggregate(db: PathBuf, window_secs: f64) -> NidsResult<()> {
    let store = Store::open(&db)?;
    let mut aggregator = Aggregator::new(window_secs);
    let mut source = stdin_source();
    while let Some(event) = source.next_event()? {
        aggregator.ingest(&event, &store)?;
    }
    aggregator.flush_all(&store)
}

fn run_match(db: PathBuf) -> NidsResult<()> {
    let store = Store::open(&db)?;
    let matcher = RuleMatcher::new();
    load_rules(&matcher, &store)?;
    let mut source = stdin_source();
    while let Some(event) = source.next_event()? {
        for alert in matcher.match_packet(&event) {
            store.insert_signature_alert(&alert)?;
        }
    }
    Ok(())
}

fn load_rules(matcher: &RuleMatcher, store: &Store) -> NidsResult<()> {
    let stored = store.all_rule_texts()?;
    if stored.is_empty() {
        matcher
            .load_from_text(DEFAULT_RULES)
            .map_err(|e| NidsError::ConfigError(e.to_string()))?;
    } else {
        for rule in &stored {
            matcher
                .load_from_text(rule)
                .map_err(|e| NidsError::ConfigError(e.to_string()))?;
        }
    }
    Ok(())
}

fn build_source(iface: Option<String>) -> NidsResult<Box<dyn PacketSource>> {
    match iface {
        None => Ok(Box::new(stdin_source())),
        #[cfg(feature = "live")]
        Some(name) => Ok(Box::new(nids_capture::LiveCaptureSource::open(Some(&name))?)),
        #[cfg(not(feature = "live"))]
        Some(_) => Err(NidsError::ConfigError(
            "live capture requested but this binary was built without the `live` feature".into(),
        )),
    }
}

fn run_orchestrate(
    iface: Option<String>,
    db: PathBuf,
    window_secs: f64,
    threshold: f64,
    interval_secs: u64,
) -> NidsResult<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| NidsError::ConfigError(e.to_string()))?;

    runtime.block_on(async move {
        let store = Arc::new(Store::open(&db)?);
        let matcher = Arc::new(RuleMatcher::new());
        load_rules(&matcher, &store)?;
        let source = build_source(iface)?;

        let (shutdown, rx) = Shutdown::new();
        let ingest_rx = rx.clone();
        let cycle_rx = rx;

        let ingest_store = store.clone();
        let ingest_matcher = matcher.clone();
        let ingestion = tokio::task::spawn_blocking(move || {
            run_ingestion(ingest_store, ingest_matcher, source, window_secs, ingest_rx)
        });

        let config = OrchestratorConfig {
            window_secs,
            z_threshold: threshold,
            cycle_interval: Duration::from_secs(interval_secs),
            auto_train_every: 10,
        };
        let stat = StatDetector::new(threshold);
        let ml = Arc::new(RwLock::new(MlDetector::new()));
        let cycles = tokio::spawn(run_cycles(store.clone(), stat, ml, config, cycle_rx));

        tokio::signal::ctrl_c()
            .await
            .map_err(|e| NidsError::ConfigError(e.to_string()))?;
        tracing::info!("shutdown signal received, flushing open windows");
        shutdown.signal();

        ingestion
            .await
            .map_err(|e| NidsError::StoreError(e.to_string()))??;
        cycles.abort();
        Ok(())
    })
}

fn run_train(db: PathBuf, model: Option<PathBuf>, force: bool, collect: bool) -> NidsResult<()> {
    if model.is_some() {
        tracing::warn!("--model is accepted but ignored: the trained model stays in-process");
    }
    let store = Store::open(&db)?;
    if collect {
        let n = store.collect_untrained_windows()?;
        tracing::info!(collected = n, "copied untrained windows into the training table");
        return Ok(());
    }
    let mut detector = MlDetector::new();
    let outcome = detector.train(&store, force)?;
    tracing::info!(?outcome, "training attempt complete");
    Ok(())
}

fn run_serve(db: PathBuf, addr: SocketAddr) -> NidsResult<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| NidsError::ConfigError(e.to_string()))?;

    runtime.block_on(async move {
        let store = Arc::new(Store::open(&db)?);
        let ml = Arc::new(RwLock::new(MlDetector::new()));
        let state = Arc::new(ApiState::new(store, ml));
        nids_api::serve(addr, state).await?;
        Ok(())
    })
}
