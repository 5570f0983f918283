//! Error types for the generation adapter.

use thiserror::Error;

/// Errors surfaced while establishing or consuming a generation stream.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// No credential was configured for the generation service.
    #[error("API key required for the generation service")]
    MissingApiKey,

    /// HTTP client configuration error.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// HTTP request or body transfer failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The service answered with an error.
    #[error("generation service returned {status}: {message}")]
    Api {
        /// HTTP status code (0 when the error arrived inside the stream).
        status: u16,
        /// Message reported by the service.
        message: String,
    },

    /// A streamed payload could not be decoded.
    #[error("could not decode streamed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The stream body was not valid UTF-8.
    #[error("stream body is not valid UTF-8")]
    InvalidUtf8,
}

impl GenerationError {
    /// Whether resending the same turn could plausibly succeed.
    ///
    /// Nothing in this crate retries; the flag is informational for callers.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Convenience result alias for generation operations.
pub type GenerationResult<T> = Result<T, GenerationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let throttled = GenerationError::Api {
            status: 429,
            message: "quota".to_string(),
        };
        let bad_request = GenerationError::Api {
            status: 400,
            message: "bad".to_string(),
        };
        assert!(throttled.is_retryable());
        assert!(!bad_request.is_retryable());
        assert!(!GenerationError::MissingApiKey.is_retryable());
    }

    #[test]
    fn test_api_error_display() {
        let err = GenerationError::Api {
            status: 403,
            message: "API key not valid".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "generation service returned 403: API key not valid"
        );
    }
}
