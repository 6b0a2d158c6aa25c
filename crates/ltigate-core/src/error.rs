//! Error types for `ltigate` core library.

use thiserror::Error;

/// Result type alias using `ltigate` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `ltigate` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
