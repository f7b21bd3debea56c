//! Error types for the atlas-trends system.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the atlas-trends system.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (invalid measurement parameters, bad config file).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data error (invalid or out-of-range data).
    #[error("Data error: {0}")]
    Data(String),

    /// An observation blob could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Not enough data to produce a result.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// State classifier failure.
    #[error("Classifier error: {0}")]
    Classifier(String),

    /// Row store error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Create an insufficient data error.
    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Error::InsufficientData(msg.into())
    }

    /// Create a classifier error.
    pub fn classifier(msg: impl Into<String>) -> Self {
        Error::Classifier(msg.into())
    }

    /// Create a storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    /// Whether this error means "nothing to report" rather than a failure.
    pub fn is_no_data(&self) -> bool {
        matches!(self, Error::InsufficientData(_))
    }
}
