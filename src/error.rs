/// Unified error types for the standard.site reader
use std::fmt;
use thiserror::Error;

/// Main error type for reader operations
#[derive(Error, Debug)]
pub enum ReaderError {
    /// Identity resolution errors
    #[error("Identity resolution error: {0}")]
    Resolution(String),

    /// Both the home endpoint and the public fallback failed
    #[error("{0}")]
    EndpointsExhausted(EndpointFailures),

    /// XRPC error returned by a backend
    #[error("XRPC error ({status}): {error}: {message}")]
    Xrpc {
        status: u16,
        error: String,
        message: String,
    },

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Record value could not be decoded
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Malformed resource URI
    #[error("Invalid AT URI: {0}")]
    InvalidUri(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One failed attempt against a single endpoint
#[derive(Debug)]
pub struct EndpointFailure {
    pub endpoint: String,
    pub error: ReaderError,
}

/// Ordered record of every endpoint attempt that failed, home endpoint first
#[derive(Debug, Default)]
pub struct EndpointFailures {
    attempts: Vec<EndpointFailure>,
}

impl EndpointFailures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, endpoint: impl Into<String>, error: ReaderError) {
        self.attempts.push(EndpointFailure {
            endpoint: endpoint.into(),
            error,
        });
    }

    /// The most recent failure, i.e. the public fallback's error
    pub fn last(&self) -> Option<&EndpointFailure> {
        self.attempts.last()
    }

    pub fn attempts(&self) -> &[EndpointFailure] {
        &self.attempts
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Take ownership of the last error, discarding earlier attempts
    pub fn into_last(self) -> Option<ReaderError> {
        self.attempts.into_iter().last().map(|f| f.error)
    }
}

impl fmt::Display for EndpointFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.last() {
            Some(last) => write!(
                f,
                "All {} endpoints failed; last ({}): {}",
                self.attempts.len(),
                last.endpoint,
                last.error
            ),
            None => write!(f, "No endpoints were attempted"),
        }
    }
}

/// Result type alias for reader operations
pub type ReaderResult<T> = Result<T, ReaderError>;
