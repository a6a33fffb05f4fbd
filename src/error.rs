//! Lava client error types

use thiserror::Error;

/// Errors raised by the client library and surfaced by the CLI
#[derive(Error, Debug)]
pub enum LavaError {
    /// Client-side validation failed before any request was made
    #[error("{0}")]
    Invalid(String),

    /// Could not authenticate against the identity service
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Credentials were rejected
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// The request failed in transport or was rejected by the API
    #[error("{0}")]
    Request(String),

    /// The API returned a response the client could not interpret
    #[error("Invalid response: {0}")]
    Api(String),

    /// The API request completed successfully, but the desired action on
    /// the server failed
    #[error("Cluster status is {status}")]
    Failed { status: String },

    /// The action timed out
    #[error("{0}")]
    Timeout(String),
}

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, LavaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_carries_status() {
        let err = LavaError::Failed {
            status: "ERROR".to_string(),
        };
        assert_eq!(err.to_string(), "Cluster status is ERROR");
    }

    #[test]
    fn test_authentication_message() {
        let err = LavaError::Authentication("bad key".to_string());
        assert_eq!(err.to_string(), "Authentication error: bad key");
    }
}
