//! Error types shared across the detection pipeline.

use thiserror::Error;

/// Top-level error kinds for the intrusion detection engine.
///
/// Mirrors the error taxonomy of the detection design: capture and config
/// errors are fatal, parse/store/model errors are recoverable and are
/// logged by the component that raised them.
#[derive(Error, Debug)]
pub enum NidsError {
    /// Packet capture failed (permission denied, device not found). Fatal.
    #[error("capture error: {0}")]
    CaptureError(String),

    /// A rule or input event could not be parsed. Recoverable, logged.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Store I/O or constraint violation. The triggering operation fails;
    /// the pipeline continues.
    #[error("store error: {0}")]
    StoreError(String),

    /// ML layer fault: missing dependency, insufficient data, corrupted
    /// artifact. The ML layer disables itself; the rest of the pipeline
    /// continues with weight renormalization.
    #[error("model error: {0}")]
    ModelError(String),

    /// Invalid configuration or CLI arguments. Fatal at startup.
    #[error("config error: {0}")]
    ConfigError(String),

    /// Underlying I/O failure.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type used throughout the engine.
pub type NidsResult<T> = std::result::Result<T, NidsError>;
