//! Venue error types.

use thiserror::Error;

/// Errors that can occur while talking to the venue.
#[derive(Debug, Error)]
pub enum VenueError {
    /// Non-success HTTP status with the response body.
    #[error("HTTP error: {status} - {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error message or response body.
        message: String,
    },

    /// Request timed out.
    #[error("Request timeout")]
    Timeout,

    /// Connection or transport failure.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Failed to parse a response body.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Authentication could not be obtained or renewed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The venue refused an order.
    #[error("Order rejected: {0}")]
    Rejected(String),
}

impl VenueError {
    /// Check if this error is worth retrying on a later tick.
    pub fn is_transient(&self) -> bool {
        match self {
            VenueError::Timeout | VenueError::Connection(_) => true,
            VenueError::Http { status, .. } => *status == 429 || *status >= 500,
            VenueError::Parse(_) | VenueError::Auth(_) | VenueError::Rejected(_) => false,
        }
    }
}

impl From<reqwest::Error> for VenueError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            VenueError::Timeout
        } else if err.is_connect() || err.is_request() {
            VenueError::Connection(err.to_string())
        } else if err.is_decode() {
            VenueError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            VenueError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            VenueError::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for VenueError {
    fn from(err: serde_json::Error) -> Self {
        VenueError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(VenueError::Timeout.is_transient());
        assert!(VenueError::Http {
            status: 503,
            message: "unavailable".to_string()
        }
        .is_transient());
        assert!(!VenueError::Http {
            status: 400,
            message: "bad request".to_string()
        }
        .is_transient());
        assert!(!VenueError::Rejected("insufficient margin".to_string()).is_transient());
    }
}
