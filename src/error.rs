//! Error types
//!
//! A single crate-level [`Error`] wraps the transport errors and the
//! obs-websocket failures raised by [`crate::obs`].

use std::fmt;
use std::io;

use tokio_tungstenite::tungstenite;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Socket or listener I/O failure
    Io(io::Error),
    /// WebSocket transport failure
    WebSocket(tungstenite::Error),
    /// Malformed JSON from (or for) the switcher
    Json(serde_json::Error),
    /// obs-websocket protocol failure
    Obs(ObsError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::WebSocket(e) => write!(f, "WebSocket error: {}", e),
            Error::Json(e) => write!(f, "JSON error: {}", e),
            Error::Obs(e) => write!(f, "OBS error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::WebSocket(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Obs(e) => Some(e),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<tungstenite::Error> for Error {
    fn from(e: tungstenite::Error) -> Self {
        Error::WebSocket(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<ObsError> for Error {
    fn from(e: ObsError) -> Self {
        Error::Obs(e)
    }
}

/// obs-websocket protocol errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObsError {
    /// Server requires a password but none was configured
    AuthRequired,
    /// Server closed the socket during the handshake or session
    Closed { code: u16, reason: String },
    /// Socket ended without a close frame
    ConnectionClosed,
    /// Message with an op code we did not expect at this point
    UnexpectedMessage(String),
    /// Request completed with a failure status
    RequestFailed {
        request_type: String,
        code: u32,
        comment: Option<String>,
    },
    /// Operation did not finish in time
    Timeout(&'static str),
    /// The event stream was already taken
    AlreadySubscribed,
}

impl fmt::Display for ObsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObsError::AuthRequired => {
                write!(f, "Server requires authentication but no password was given")
            }
            ObsError::Closed { code, reason } => {
                write!(f, "Connection closed by server ({}): {}", code, reason)
            }
            ObsError::ConnectionClosed => write!(f, "Connection closed"),
            ObsError::UnexpectedMessage(msg) => write!(f, "Unexpected message: {}", msg),
            ObsError::RequestFailed {
                request_type,
                code,
                comment,
            } => match comment {
                Some(comment) => {
                    write!(f, "Request {} failed ({}): {}", request_type, code, comment)
                }
                None => write!(f, "Request {} failed ({})", request_type, code),
            },
            ObsError::Timeout(what) => write!(f, "Timed out waiting for {}", what),
            ObsError::AlreadySubscribed => write!(f, "Event stream already subscribed"),
        }
    }
}

impl std::error::Error for ObsError {}
