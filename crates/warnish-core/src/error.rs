//! Error types for the Warnish pipeline

/// Result type alias using [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for the Warnish filters
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid HTTP request
    #[error("Invalid HTTP request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The cache store could not be reached while building a filter
    #[error("Failed to connect to cache store: {0}")]
    StoreConnection(String),

    /// Per-operation store error
    #[error("Cache store error: {0}")]
    Store(String),

    /// Codec failure while compressing a body
    #[error("Compression error: {0}")]
    Compression(String),

    /// The origin handler failed to produce its body
    #[error("Origin body error: {0}")]
    Origin(String),

    /// The client side of a response body is gone
    #[error("Client disconnected before the response was complete")]
    ClientDisconnected,

    /// Middleware error
    #[error("Middleware error: {0}")]
    Middleware(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    HttpError(#[from] http::Error),

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convert error to HTTP status code
    pub fn to_status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::StoreConnection(_) | Error::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Origin(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error only affects the caching side effect
    pub fn is_store_error(&self) -> bool {
        matches!(self, Error::Store(_) | Error::StoreConnection(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            Error::InvalidRequest("bad".to_string()).to_status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Origin("reset".to_string()).to_status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            Error::ClientDisconnected.to_status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_error_classification() {
        assert!(Error::Store("timeout".to_string()).is_store_error());
        assert!(Error::StoreConnection("refused".to_string()).is_store_error());
        assert!(!Error::Compression("bad level".to_string()).is_store_error());
    }
}
