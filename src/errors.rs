//! Error types for quakeview.
//!
//! Uses `thiserror` for library-style error definitions. Everything the
//! feed can throw at us is caught at the refresh scheduler boundary.

use thiserror::Error;

/// Errors that can occur while fetching the upstream feed.
#[derive(Error, Debug)]
pub enum FeedError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Feed returned a non-success status
    #[error("USGS feed error (HTTP {status}): {message}")]
    Status { status: u16, message: String },

    /// Body was not a JSON document
    #[error("Failed to parse feed payload: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The refresh scheduler task is gone (shut down or panicked).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("refresh scheduler has stopped")]
pub struct SchedulerStopped;

/// Coarse error taxonomy surfaced to users and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport failure or non-success status
    Network,
    /// Payload did not have the expected structure
    Parse,
}

impl FeedError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http(e) if e.is_decode() => ErrorKind::Parse,
            Self::Http(_) | Self::Status { .. } => ErrorKind::Network,
            Self::Parse(_) => ErrorKind::Parse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_network_error() {
        let err = FeedError::Status {
            status: 503,
            message: "unavailable".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        let err: FeedError = serde_json::from_str::<serde_json::Value>("<html>")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }
}
