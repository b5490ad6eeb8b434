//! Error Types
//!
//! Two families: failures talking to the host ([`GatewayError`]) and reasons a
//! tracker handler gave up on an event ([`TrackerError`]). Neither ever
//! reaches the event source; listeners log and drop them.

use thiserror::Error;

use crate::events::ViewEventKind;

/// Errors from the attribute or command gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request never produced a response
    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        /// Endpoint path that was called
        endpoint: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// The host answered with a non-success HTTP status
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        /// Endpoint path that was called
        endpoint: String,
        /// HTTP status code
        status: u16,
    },

    /// The host answered but refused the request
    #[error("{endpoint} rejected the request (code {code}): {msg}")]
    Rejected {
        /// Endpoint path that was called
        endpoint: String,
        /// API result code (non-zero)
        code: i64,
        /// API message
        msg: String,
    },

    /// The response body could not be read
    #[error("{endpoint} returned an unreadable response: {reason}")]
    Decode {
        /// Endpoint path that was called
        endpoint: String,
        /// What went wrong while decoding
        reason: String,
    },

    /// The gateway is not accepting requests
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),
}

/// Reasons a tracker handler aborted
#[derive(Debug, Error)]
pub enum TrackerError {
    /// A query or command call failed
    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(#[from] GatewayError),

    /// The event did not carry a usable block identifier
    #[error("Malformed {kind} event: {reason}")]
    MalformedEvent {
        /// Kind of the offending event
        kind: ViewEventKind,
        /// What was missing
        reason: &'static str,
    },
}
