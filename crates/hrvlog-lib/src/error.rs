use thiserror::Error;

/// Errors produced by the HRV pipeline.
///
/// Undefined ratios (zero denominators) are not errors; they surface as `None`
/// on the result types instead.
#[derive(Debug, Error)]
pub enum HrvError {
    #[error("insufficient data for {context}: need at least {needed}, found {found}")]
    InsufficientData {
        context: &'static str,
        needed: usize,
        found: usize,
    },

    #[error("interval #{index} is not a usable beat interval: {value_ms} ms")]
    InvalidInterval { index: usize, value_ms: f64 },

    #[error("no sessions recorded yet")]
    NoData,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("fft failed: {0}")]
    Fft(String),
}

pub type Result<T> = std::result::Result<T, HrvError>;
