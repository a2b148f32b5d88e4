use thiserror::Error;

use parley_shared::constants::{MSG_UNKNOWN_ERROR, MSG_UNREACHABLE};

/// Failure of a REST call. Every variant renders as a message fit for
/// showing to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request never got a response.
    #[error("{}", MSG_UNREACHABLE)]
    Unreachable,

    /// Non-2xx response. `message` is the server's own message when it sent
    /// one, else `HTTP <status>: <reason>`.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected response body: {0}")]
    Decode(String),

    #[error("Response carried no data")]
    MissingData,

    #[error("{}", MSG_UNKNOWN_ERROR)]
    Unknown,
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Malformed STOMP frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StompError {
    #[error("Frame is empty")]
    Empty,

    #[error("Unknown STOMP command: {0}")]
    UnknownCommand(String),

    #[error("Malformed header line: {0}")]
    BadHeader(String),

    #[error("Invalid escape sequence in header")]
    BadEscape,

    #[error("Frame body is not terminated")]
    Unterminated,

    #[error("Invalid content-length: {0}")]
    BadContentLength(String),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("Broker link closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Broker rejected the connection: {0}")]
    Rejected(String),

    #[error("Broker did not answer CONNECT in time")]
    HandshakeTimeout,

    #[error("Credential carries no user id")]
    MissingUser,

    #[error("Connection was closed while connecting")]
    Aborted,
}
