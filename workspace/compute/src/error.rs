use thiserror::Error;

/// Error types for the compute module
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComputeError {
    /// No forecast has been recorded for the city yet
    #[error("No predictions recorded for this city: {0}")]
    NoPredictions(String),

    /// Recorded forecasts exist but no reading fell within the matching window
    #[error("No matching readings found for city: {0}")]
    NoMatches(String),

    /// Requested forecast horizon is outside the supported range
    #[error("Invalid forecast horizon: {0} hours (supported 1..=120)")]
    InvalidHorizon(u32),

    /// The ensemble produced no forecast points for the city
    #[error("Ensemble produced an empty forecast for city: {0}")]
    EmptyForecast(String),

    /// Input that cannot be processed at all
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Type alias for Result with ComputeError
pub type Result<T> = std::result::Result<T, ComputeError>;
