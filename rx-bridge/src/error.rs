//! Error types for rx-bridge

use thiserror::Error;

/// Result type alias for rx-bridge operations
pub type Result<T> = std::result::Result<T, RxError>;

/// rx-bridge error types
///
/// This is also the default error type carried by [`Observable`](crate::rx::Observable)
/// and [`Subject`](crate::rx::Subject), which is why it is `Clone`: a single
/// producer error is handed to every consumer waiting at that moment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RxError {
    /// The producer failed
    #[error("Producer error: {0}")]
    Producer(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O failure while reading configuration
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl RxError {
    /// Shorthand for a producer failure
    pub fn producer(message: impl Into<String>) -> Self {
        Self::Producer(message.into())
    }
}

impl From<std::io::Error> for RxError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_yaml::Error> for RxError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}
