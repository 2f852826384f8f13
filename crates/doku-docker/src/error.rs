//! Error types for Docker API access.

use std::time::Duration;

use thiserror::Error;

/// Errors talking to the Docker daemon.
#[derive(Debug, Error)]
pub enum DockerError {
    /// The configured host could not be understood.
    #[error("Invalid Docker host {host:?}: {message}")]
    InvalidHost { host: String, message: String },

    /// The daemon socket could not be reached.
    #[error("Cannot connect to the Docker daemon at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// The request could not be built.
    #[error("Invalid request: {0}")]
    Request(String),

    /// The daemon answered with a non-success status.
    #[error("Docker API returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The daemon did not answer in time.
    #[error("Docker API request timed out after {0:?}")]
    Timeout(Duration),

    /// The response body did not match the expected shape.
    #[error("Unexpected Docker API response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl DockerError {
    /// Whether the daemon reported the object as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}
