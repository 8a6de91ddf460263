//! # Error Types
//!
//! The error taxonomy shared by every API surface of the crate. Transport
//! failures, provider error bodies, and the two stream-level failure modes
//! (`Protocol`, `StreamTerminated`) all map onto [`ZhipuError`].

use thiserror::Error;

/// Errors produced by the ZhipuAI client and the streaming accumulator.
#[derive(Debug, Error)]
pub enum ZhipuError {
    /// The request was malformed before it ever left the client.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The upstream service could not be reached or misbehaved.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// The provider returned a structured error body.
    #[error("api error ({code}): {message}")]
    Api { code: String, message: String },

    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The request did not complete within the configured deadline.
    #[error("request timeout")]
    Timeout,

    /// The provider asked us to back off.
    #[error("rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    /// The incoming chunk sequence violated the streaming protocol, e.g. a
    /// single chunk carried more than one tool-call fragment. Fatal for the
    /// stream it occurred on; never retried.
    #[error("stream protocol violation: {0}")]
    Protocol(String),

    /// A chunk arrived after a terminal finish reason was already observed.
    #[error("stream already terminated")]
    StreamTerminated,

    /// Anything that indicates a bug on our side.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for ZhipuError {
    /// Classify reqwest errors the way the HTTP layer sees them: timeouts
    /// and connect failures are upstream problems, request-construction
    /// failures are ours.
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ZhipuError::Timeout
        } else if err.is_connect() {
            ZhipuError::Upstream(format!("connection failed: {}", err))
        } else if err.is_request() {
            ZhipuError::BadRequest(format!("invalid request: {}", err))
        } else if let Some(status) = err.status() {
            ZhipuError::Upstream(format!("HTTP {}: {}", status.as_u16(), err))
        } else {
            ZhipuError::Upstream(format!("HTTP client error: {}", err))
        }
    }
}

impl From<serde_json::Error> for ZhipuError {
    fn from(err: serde_json::Error) -> Self {
        ZhipuError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for ZhipuError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ZhipuError::BadRequest("resource not found".to_string()),
            std::io::ErrorKind::PermissionDenied => {
                ZhipuError::BadRequest("permission denied".to_string())
            }
            std::io::ErrorKind::TimedOut => ZhipuError::Timeout,
            _ => ZhipuError::Internal(format!("I/O error: {}", err)),
        }
    }
}

impl From<url::ParseError> for ZhipuError {
    fn from(err: url::ParseError) -> Self {
        ZhipuError::BadRequest(format!("invalid URL: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formatting() {
        let err = ZhipuError::Api {
            code: "1301".to_string(),
            message: "content filtered".to_string(),
        };
        assert_eq!(err.to_string(), "api error (1301): content filtered");

        let err = ZhipuError::RateLimited { retry_after: 7 };
        assert!(err.to_string().contains("retry after 7s"));
    }

    #[test]
    fn test_serde_json_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ZhipuError = parse_err.into();
        assert!(matches!(err, ZhipuError::Serialization(_)));
    }

    #[test]
    fn test_io_timeout_maps_to_timeout() {
        let io_err = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        let err: ZhipuError = io_err.into();
        assert!(matches!(err, ZhipuError::Timeout));
    }
}
