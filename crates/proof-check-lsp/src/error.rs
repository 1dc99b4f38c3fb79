//! Error types for the transport, protocol and client layers.

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::client::ClientState;

#[derive(Debug, Error)]
/// Errors produced while framing or deframing messages.
pub enum TransportError {
    #[error("missing Content-Length header")]
    /// The header block ended without a `Content-Length` line.
    MissingContentLength,

    #[error("invalid Content-Length value: {0:?}")]
    /// The `Content-Length` value was not a decimal byte count.
    InvalidContentLength(String),

    #[error("stream ended after {received} of {expected} payload bytes")]
    /// The stream was exhausted before the declared payload was read.
    Truncated {
        /// Declared payload length.
        expected: usize,
        /// Bytes actually received.
        received: usize,
    },

    #[error("stream ended inside a header block")]
    /// The stream was exhausted after some header bytes but before the blank line.
    TruncatedHeader,

    #[error("frame still incomplete at the read deadline")]
    /// The peer stopped sending in the middle of a frame.
    Stalled,

    #[error("invalid JSON payload: {0}")]
    /// The payload was not valid UTF-8 JSON.
    InvalidPayload(#[from] serde_json::Error),

    #[error("writer is closed")]
    /// A frame was written after the write side was closed.
    Closed,

    #[error("I/O error: {0}")]
    /// Underlying stream I/O failed.
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
/// Structurally valid JSON that is not a message this client understands.
pub enum ProtocolError {
    #[error("message is neither a request, a notification nor a response: {0}")]
    /// No `method` and no `id`.
    Unclassifiable(String),

    #[error("malformed `{method}` response: {reason}")]
    /// A response to one of our requests had an unexpected shape.
    MalformedResponse {
        /// Method of the originating request.
        method: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    #[error("malformed `{method}` notification: {reason}")]
    /// A notification this client routes had an unexpected shape.
    MalformedNotification {
        /// Notification method.
        method: String,
        /// What was wrong with it.
        reason: String,
    },
}

#[derive(Debug, Error)]
/// Errors returned by [`crate::ProtocolClient`].
pub enum ClientError {
    #[error("failed to start checker: {0}")]
    /// The checker could not be spawned or did not complete the handshake.
    Startup(String),

    #[error("timed out after {elapsed:?} waiting for {waiting_for}")]
    /// No matching message arrived within the allotted time. Recoverable.
    Timeout {
        /// What was being waited for.
        waiting_for: String,
        /// Time spent waiting.
        elapsed: Duration,
    },

    #[error("transport error: {0}")]
    /// Framing failure. Fatal for the client.
    Transport(#[from] TransportError),

    #[error("protocol error: {0}")]
    /// Unexpected message shape. Fatal for the client.
    Protocol(#[from] ProtocolError),

    #[error("checker closed its output stream")]
    /// Clean end of stream while a message was expected. Fatal for the client.
    Disconnected,

    #[error("`{method}` failed with code {code}: {message}")]
    /// The checker answered a request with a JSON-RPC error object.
    ServerError {
        /// Method of the failed request.
        method: &'static str,
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
    },

    #[error("document is already open: {0}")]
    /// `open_file` on a URI that is already managed.
    AlreadyOpen(String),

    #[error("document is not open: {0}")]
    /// An operation on a URI that was never opened.
    NotOpen(String),

    #[error("cannot {operation} while the client is {state:?}")]
    /// Operation not valid in the current lifecycle state.
    InvalidState {
        /// Current state.
        state: ClientState,
        /// Attempted operation.
        operation: &'static str,
    },

    #[error("client is unusable after an earlier fatal error")]
    /// A previous transport or protocol fault poisoned this client.
    Unusable,

    #[error("I/O error: {0}")]
    /// Process-level I/O failed.
    Io(#[from] io::Error),
}

impl ClientError {
    /// Returns `true` for the recoverable timeout kind.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` for errors that leave the client unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Protocol(_) | Self::Disconnected | Self::Unusable
        )
    }
}
