//! Engine-local error kinds: configuration loading and the Ollama-
//! compatible model runtime clients. Converts into `core::Error` at the
//! boundary, mirroring every other crate in the workspace.

use localdoc_core::Error as CoreError;

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Failure modes specific to configuration loading and the model
/// runtime clients.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// An environment variable held a value that could not be parsed
    /// into its expected type.
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnvVar {
        /// Name of the offending environment variable.
        var: &'static str,
        /// The value that failed to parse.
        value: String,
    },

    /// The model runtime could not be reached.
    #[error("request to {url} failed: {source}")]
    Request {
        /// The URL the request was sent to.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// A call to the model runtime exceeded its deadline.
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout {
        /// The URL the request was sent to.
        url: String,
        /// The configured per-call deadline.
        timeout: std::time::Duration,
    },

    /// The model runtime responded with a non-success status.
    #[error("{url} returned {status}")]
    Status {
        /// The URL the request was sent to.
        url: String,
        /// The HTTP status returned.
        status: reqwest::StatusCode,
    },

    /// A response body could not be decoded as the expected JSON shape.
    #[error("malformed response from {url}: {source}")]
    Decode {
        /// The URL the request was sent to.
        url: String,
        /// Underlying deserialization error.
        #[source]
        source: reqwest::Error,
    },
}

impl From<EngineError> for CoreError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidEnvVar { .. } => CoreError::ConfigInvalid(err.to_string()),
            EngineError::Request { .. } | EngineError::Status { .. } => {
                CoreError::ModelUnavailable(err.to_string())
            }
            EngineError::Timeout { timeout, .. } => CoreError::ModelTimeout(timeout),
            EngineError::Decode { .. } => CoreError::ModelUnavailable(err.to_string()),
        }
    }
}
