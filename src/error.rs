//! Error taxonomy for the inbox core.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The request never produced a response (connect, timeout, reset).
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// The response body was not the JSON shape we expect.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// A list response arrived for a query that has since been superseded.
    #[error("Discarded stale response (generation {generation}, latest {latest})")]
    StaleResponse { generation: u64, latest: u64 },

    /// A caller broke a collection invariant, e.g. selecting an item the set does not own.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Unknown route: {0}")]
    UnknownRoute(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether repeating the same idempotent request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleResponse { .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return Self::Decode(e.to_string());
        }
        match e.status() {
            Some(status) => Self::Http {
                status: status.as_u16(),
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None => Self::Network(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
