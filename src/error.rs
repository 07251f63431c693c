//! Error types for the forecast_admissions crate

use thiserror::Error;

/// Custom error types for the forecast_admissions crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// A row is missing a required field with no default policy.
    /// Row-scoped: the offending row is skipped, never the batch.
    #[error("Schema error: missing required field '{field}'")]
    Schema { field: &'static str },

    /// A required model artifact is absent and no fallback is defined
    #[error("Model not loaded: {0}")]
    ModelNotLoaded(String),

    /// An explicitly requested mode cannot be satisfied
    #[error("Model unavailable for requested mode: {0}")]
    ModelUnavailable(String),

    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error reading or writing a persisted model artifact
    #[error("Artifact error: {0}")]
    ArtifactError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from JSON serialization
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error from CSV parsing
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;
