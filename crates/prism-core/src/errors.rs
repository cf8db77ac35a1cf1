//! Network-facing error kinds shared across Prism crates.
//!
//! - [`ChannelError`]: the push channel failed to connect, dropped, or sent
//!   something undecodable. Never fatal; it drives reconnection and the
//!   offline indicator.
//! - [`FetchError`]: a REST fetch (dashboard snapshot, conversation) failed.
//!
//! Both carry a short [`error_kind`](FetchError::error_kind) string for
//! structured logging.

use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// ChannelError
// ─────────────────────────────────────────────────────────────────────────────

/// Push channel failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// The connection could not be established.
    #[error("failed to connect to {url}: {reason}")]
    Connect {
        /// Endpoint that was dialed.
        url: String,
        /// Underlying transport error.
        reason: String,
    },

    /// The transport reported an error on an open connection.
    #[error("channel protocol error: {0}")]
    Protocol(String),

    /// A frame arrived that is not a valid push envelope.
    #[error("undecodable push message: {0}")]
    Decode(String),

    /// The channel gave up reconnecting after too many failures.
    #[error("channel gave up after {attempts} reconnect attempts")]
    RetriesExhausted {
        /// Number of consecutive failed attempts.
        attempts: u32,
    },

    /// The channel was closed locally.
    #[error("channel closed")]
    Closed,
}

impl ChannelError {
    /// Whether a reconnect attempt makes sense after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Protocol(_))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Protocol(_) => "protocol",
            Self::Decode(_) => "decode",
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::Closed => "closed",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FetchError
// ─────────────────────────────────────────────────────────────────────────────

/// REST fetch failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Request never produced a response (DNS, TCP, TLS, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// Server answered with a non-success status.
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// Response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The requested resource does not exist.
    #[error("{resource} '{id}' not found")]
    NotFound {
        /// Kind of resource ("conversation", ...).
        resource: &'static str,
        /// Identifier that was requested.
        id: String,
    },
}

impl FetchError {
    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode(_) | Self::NotFound { .. } => false,
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Status { .. } => "status",
            Self::Decode(_) => "decode",
            Self::NotFound { .. } => "not_found",
        }
    }

    /// Build a status error, truncating long bodies.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let mut body = body.into();
        if body.len() > MAX_BODY_LEN {
            let mut cut = MAX_BODY_LEN;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Self::Status { status, body }
    }
}

const MAX_BODY_LEN: usize = 512;
