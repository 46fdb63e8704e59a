//! Error taxonomy for transport and discovery failures
//!
//! Transport errors always carry the HTTP status that was observed, or a
//! sentinel when the request never produced one. Discovery errors wrap them
//! and add the "required link missing" cases.

use std::fmt;

/// Status reported when a request timed out
pub const TIMEOUT_STATUS: u16 = 408;
/// Status reported when the connection could not be established
pub const CONNECTION_STATUS: u16 = 444;
/// Status reported for malformed responses and other unexpected failures
pub const PROTOCOL_STATUS: u16 = 500;

/// Which half of a request ran out of time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    Connect,
    Read,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutPhase::Connect => f.write_str("connecting"),
            TimeoutPhase::Read => f.write_str("reading"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("authorization rejected (HTTP {status})")]
    Auth { status: u16 },
    #[error("timeout while {0}")]
    Timeout(TimeoutPhase),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("HTTP {status}{}", message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Http { status: u16, message: Option<String> },
    #[error("unexpected response: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Numeric status to report for this failure
    pub fn status(&self) -> u16 {
        match self {
            TransportError::Auth { status } | TransportError::Http { status, .. } => *status,
            TransportError::Timeout(_) => TIMEOUT_STATUS,
            TransportError::Connection(_) => CONNECTION_STATUS,
            TransportError::Protocol(_) => PROTOCOL_STATUS,
        }
    }

    /// Connection-level failures: the request never reached the controller.
    /// A connect timeout counts, a read timeout does not.
    pub fn is_connection_level(&self) -> bool {
        matches!(
            self,
            TransportError::Connection(_) | TransportError::Timeout(TimeoutPhase::Connect)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("discovery incomplete: {0}")]
    Incomplete(String),
    #[error("malformed {document} document: {reason}")]
    Malformed {
        document: &'static str,
        reason: String,
    },
}

impl DiscoveryError {
    pub fn incomplete(what: impl Into<String>) -> Self {
        DiscoveryError::Incomplete(what.into())
    }
}
