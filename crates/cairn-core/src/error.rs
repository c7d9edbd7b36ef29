//! Error types for Cairn.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Corruption errors
    #[error("Corrupt cache entry: {0}")]
    Corrupt(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Fetch errors
    #[error("Fetch of {locator} timed out after {timeout_ms}ms")]
    FetchTimeout { locator: String, timeout_ms: u64 },

    #[error("Fetch of {locator} returned status {status}")]
    FetchStatus { locator: String, status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Lifecycle
    #[error("Engine has been shut down")]
    ShutDown,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}

impl Error {
    /// Transport failures and server errors may be retried; timeouts and
    /// client errors are final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::FetchStatus { status: 500.., .. }
        )
    }
}
