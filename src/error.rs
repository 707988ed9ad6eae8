//! Error types for connections, calls and frame processing.
//!
//! [`RpcError`] is the only error that crosses the wire: handlers fail with
//! it and callers of [`Connection::call`](crate::connection::Connection)
//! receive it back inside [`CallError::Remote`]. Everything else is local.

use std::{io, sync::Arc};

use crate::codec::CodecError;

/// Reply error code for a request with no registered handler.
pub const CODE_UNHANDLED_API: &str = "UNHANDLED_API";
/// Reply error code for a handler that failed with a non-api error.
pub const CODE_INTERNAL: &str = "INTERNAL_ERR";
/// Reply error code for a request whose payload could not be decoded.
pub const CODE_BAD_REQUEST: &str = "BAD_REQUEST";

/// Broad origin of an [`RpcError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, bincode::Encode, bincode::Decode)]
pub enum ErrorKind {
    /// The transport failed while carrying the call.
    Network,
    /// The remote side failed while serving the call.
    Server,
    /// The caller sent something the remote side could not accept.
    Client,
    /// An application-level rejection raised deliberately by a handler.
    Api,
}

/// Error carried inside an api reply.
///
/// # Examples
///
/// ```
/// use callwire::error::{ErrorKind, RpcError};
///
/// let err = RpcError::api("name already taken").with_code("NAME_TAKEN");
/// assert_eq!(err.kind(), ErrorKind::Api);
/// assert_eq!(err.code(), Some("NAME_TAKEN"));
/// assert_eq!(err.to_string(), "name already taken");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error, bincode::Encode, bincode::Decode)]
#[error("{message}")]
pub struct RpcError {
    message: String,
    code: Option<String>,
    kind: ErrorKind,
}

impl RpcError {
    /// Create an error of `kind` with a human-readable message.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            kind,
        }
    }

    /// Application-level rejection.
    #[must_use]
    pub fn api(message: impl Into<String>) -> Self { Self::new(ErrorKind::Api, message) }

    /// Failure on the serving side.
    #[must_use]
    pub fn server(message: impl Into<String>) -> Self { Self::new(ErrorKind::Server, message) }

    /// Attach a machine-readable code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str { &self.message }

    /// Machine-readable code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> { self.code.as_deref() }

    /// Origin of the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind { self.kind }

    pub(crate) fn unhandled(service: &str) -> Self {
        Self::server(format!("Unhandled API: {service}")).with_code(CODE_UNHANDLED_API)
    }

    pub(crate) fn internal() -> Self {
        Self::server("Internal Server Error").with_code(CODE_INTERNAL)
    }

    pub(crate) fn bad_request(service: &str) -> Self {
        Self::new(ErrorKind::Client, format!("Invalid request body for {service}"))
            .with_code(CODE_BAD_REQUEST)
    }
}

/// Failures reported by a [`Transport`](crate::transport::Transport).
#[derive(Clone, Debug, thiserror::Error)]
pub enum TransportError {
    /// No socket is open.
    #[error("transport is not connected")]
    NotConnected,
    /// The socket closed while an operation was in flight.
    #[error("transport closed")]
    Closed,
    /// Underlying I/O failure.
    #[error("transport I/O error: {0}")]
    Io(#[source] Arc<io::Error>),
}

impl From<io::Error> for TransportError {
    fn from(error: io::Error) -> Self { Self::Io(Arc::new(error)) }
}

/// Outcome of a failed [`connect`](crate::connection::Connection::connect).
///
/// Cloneable because every concurrent caller of `connect` observes the same
/// outcome.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConnectError {
    /// The transport refused to start the attempt.
    #[error("failed to start connecting to {address}: {source}")]
    Start {
        /// Configured peer address.
        address: String,
        /// Transport failure.
        #[source]
        source: TransportError,
    },
    /// The transport reported an error or closed before opening.
    #[error("failed to connect to {address}")]
    Failed {
        /// Configured peer address.
        address: String,
    },
    /// `disconnect` was called before the attempt completed.
    #[error("connection aborted before completion")]
    Aborted,
    /// A disconnect is still in progress.
    #[error("connection is closing")]
    Closing,
}

/// Protocol errors raised while turning inbound bytes into calls.
///
/// Frames producing these errors are dropped without dispatch.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The message is shorter than the header.
    #[error("frame truncated: expected at least {expected} bytes, got {actual}")]
    Truncated {
        /// Header length.
        expected: usize,
        /// Received length.
        actual: usize,
    },
    /// The header names a service the registry does not know.
    #[error("cannot find service id {0}")]
    UnknownService(u32),
    /// The payload did not decode with the service's schema.
    #[error("failed to decode payload for {service}")]
    Decode {
        /// Service name.
        service: String,
        /// Codec failure.
        #[source]
        source: CodecError,
    },
}

/// Errors returned by outbound [`call`](crate::connection::Connection) and
/// `send_msg` operations.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// No service with this name exists in the registry.
    #[error("unknown service: {0}")]
    UnknownService(String),
    /// The service exists but is a notification, not an api.
    #[error("service {0} is not an api")]
    NotAnApi(String),
    /// The service exists but is an api, not a notification.
    #[error("service {0} is not a notification")]
    NotAMsg(String),
    /// The codec rejected the outbound value or the inbound reply.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    /// The connection is not open.
    #[error("connection is not open")]
    NotConnected,
    /// The transport failed to write the frame.
    #[error("failed to send frame: {0}")]
    Send(#[source] TransportError),
    /// The remote handler answered with an error.
    #[error("remote error: {0}")]
    Remote(#[source] RpcError),
    /// The connection closed before a reply arrived.
    #[error("connection closed before a reply arrived")]
    Disconnected,
    /// No reply arrived within the configured call timeout.
    #[error("call timed out")]
    Timeout,
}

/// Setup-time handler registration failures.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum RegistrationError {
    /// An api handler is already registered under this name.
    #[error("already exist handler for API: {0}")]
    DuplicateApiHandler(String),
    /// A notification handler is already registered under this name.
    #[error("already exist handler for MSG: {0}")]
    DuplicateMsgHandler(String),
}
