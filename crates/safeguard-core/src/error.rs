//! Error types for the safeguard access layer.
//!
//! A single [`Error`] type with explicit variants for transport,
//! authentication, protocol, input validation and listener lifecycle
//! failures. [`Error::is_transient`] is the one place that decides whether a
//! failure is worth retrying.

use std::fmt;
use thiserror::Error;

/// The unified error type for safeguard operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (DNS, TLS, connection, timeout).
    #[error("network error: {0}")]
    Transport(#[from] TransportError),

    /// Authentication errors (rejected credentials, disposed sessions).
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Protocol errors (unexpected or malformed responses).
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Input validation errors (bad address, empty thumbprint).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    /// Event listener lifecycle errors.
    #[error("listener error: {0}")]
    Listener(#[from] ListenerError),
}

impl Error {
    /// Returns true if retrying the same operation later may succeed.
    ///
    /// Network failures and malformed responses are transient (the appliance
    /// may be restarting or mid-upgrade). Rejections are transient only for
    /// throttling, timeouts and server-side failures; everything else means
    /// the credential or session is unusable as-is.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Protocol(_) => true,
            Error::Auth(AuthError::Rejected(rejected)) => rejected.is_transient(),
            Error::Auth(AuthError::TokenNotAccepted { .. }) => true,
            Error::Auth(_) => false,
            Error::InvalidInput(_) => false,
            Error::Listener(_) => false,
        }
    }

    /// Returns true if the failure must halt any reconnect loop.
    pub fn is_fatal(&self) -> bool {
        !self.is_transient()
    }

    /// Returns true if a service refused the access token itself, so a
    /// fresh token is needed before trying again.
    pub fn is_token_rejected(&self) -> bool {
        matches!(self, Error::Auth(AuthError::TokenNotAccepted { .. }))
    }
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// TLS/SSL error.
    #[error("TLS error: {message}")]
    Tls { message: String },

    /// Request timed out.
    #[error("request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },

    /// Websocket error on the event transport.
    #[error("websocket error: {message}")]
    WebSocket { message: String },
}

/// Authentication-related errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token endpoint rejected the request.
    #[error("{0}")]
    Rejected(RejectedError),

    /// A service refused the access token, e.g. after it was revoked.
    #[error("access token not accepted (HTTP {status})")]
    TokenNotAccepted { status: u16 },

    /// A named identity provider could not be resolved to a scope.
    #[error("unable to find scope matching '{provider}' in [{}]", .available.join(", "))]
    UnknownProvider {
        provider: String,
        available: Vec<String>,
    },

    /// The session was disposed and can no longer authenticate.
    #[error("session has been disposed")]
    SessionDisposed,

    /// The session holds no credential that could be duplicated.
    #[error("anonymous and management sessions are not cloneable")]
    NotCloneable,

    /// The session kind does not support the operation.
    #[error("unsupported operation for this session: {operation}")]
    Unsupported { operation: String },

    /// Client certificate material could not be loaded.
    #[error("client certificate unavailable: {message}")]
    Certificate { message: String },
}

/// A non-success response from the token endpoint.
///
/// Carries the structured `code` and `message` the appliance puts in error
/// bodies, when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedError {
    /// HTTP status code.
    pub status: u16,
    /// Numeric appliance error code (if present).
    pub code: Option<i64>,
    /// Error message from the appliance.
    pub message: Option<String>,
}

impl RejectedError {
    /// Create a new rejection.
    pub fn new(status: u16, code: Option<i64>, message: Option<String>) -> Self {
        Self {
            status,
            code,
            message,
        }
    }

    /// Returns true if the rejection came from throttling or a server fault.
    pub fn is_transient(&self) -> bool {
        self.status == 408 || self.status == 429 || self.status >= 500
    }
}

impl fmt::Display for RejectedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rejected with HTTP {}", self.status)?;
        if let Some(code) = self.code {
            write!(f, " [{}]", code)?;
        }
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

/// Protocol-level errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A success response was missing an expected field or was not JSON.
    #[error("malformed response: {message}")]
    MalformedResponse { message: String },

    /// The event transport handshake failed.
    #[error("handshake failed: {message}")]
    Handshake { message: String },
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid appliance address.
    #[error("invalid appliance address '{value}': {reason}")]
    Address { value: String, reason: String },

    /// Invalid credential input.
    #[error("invalid credential: {reason}")]
    Credential { reason: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}

/// Event listener lifecycle errors.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The listener was disposed.
    #[error("event listener has been disposed")]
    Disposed,

    /// The listener permanently disconnected and cannot be restarted.
    #[error("event listener has permanently disconnected")]
    PermanentlyFailed,
}
