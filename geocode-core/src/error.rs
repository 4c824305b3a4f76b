use thiserror::Error;

/// Failures a geocoding provider can report to its caller.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// The query kind is not handled by this provider (e.g. an IP address).
    #[error("{0}")]
    UnsupportedOperation(String),

    #[error("{0}")]
    InvalidCredentials(String),

    #[error("{0}")]
    QuotaExceeded(String),

    /// Caller-supplied data was rejected before any request was made.
    #[error("{0}")]
    InvalidArgument(String),

    /// The API answered with a non-success status we have no dedicated kind for.
    #[error("{provider} request failed with status {status}: {message}")]
    Provider {
        provider: String,
        status: u16,
        message: String,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Network and decoding failures, kept apart from the semantic errors above.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to send request to {endpoint}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read response body from {endpoint}")]
    Body {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to decode response JSON")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T, E = GeocodeError> = std::result::Result<T, E>;
