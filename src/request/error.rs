//! Per-request failure taxonomy.

use thiserror::Error;

/// Terminal failure of a single request.
///
/// Cloneable so that the batch can both record the error on the member and
/// hand it to the failure callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The request stopped because it was asked to cancel.
    #[error("request was cancelled")]
    Cancelled,

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode response: {message}")]
    Decode { message: String },

    /// The completion handle was dropped without ever reporting.
    #[error("request dropped its completion handle without reporting an outcome")]
    Abandoned,

    #[error("{message}")]
    Other { message: String },
}

impl RequestError {
    pub fn transport(message: impl Into<String>) -> Self {
        RequestError::Transport {
            message: message.into(),
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        RequestError::Status {
            status,
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        RequestError::Decode {
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        RequestError::Other {
            message: message.into(),
        }
    }

    /// True when the request was aborted rather than failing on its own.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, RequestError::Cancelled)
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_is_distinct() {
        assert!(RequestError::Cancelled.is_cancellation());
        assert!(!RequestError::transport("reset by peer").is_cancellation());
        assert!(!RequestError::Abandoned.is_cancellation());
    }

    #[test]
    fn test_status_display() {
        let err = RequestError::status(503, "service unavailable");
        assert_eq!(err.to_string(), "HTTP 503: service unavailable");
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(RequestError::decode("eof").status_code(), None);
    }
}
