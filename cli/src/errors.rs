use nlq_resilience::acquisition::{AcquisitionError, ConfigError};
use thiserror::Error;

/// Errors surfaced by the `nlq` binary.
#[derive(Debug, Error)]
pub enum CliError {
    /// The acquisition engine could not produce a query.
    #[error("Acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),

    /// Configuration failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Input could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Output could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Anyhow error.
    #[error("{0:#}")]
    Anyhow(#[from] anyhow::Error),
}
