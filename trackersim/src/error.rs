//! Error types for simulator sessions and configuration.

use std::io;

use thiserror::Error;
use trackersim_protocol::ProtocolError;

use crate::session::SessionState;

/// Errors that end a session.
///
/// Acknowledgement timeouts are not errors; see
/// [`crate::session::transport::Ack`].
#[derive(Error, Debug)]
pub enum SessionError {
    /// Connect failed or timed out.
    #[error("Connection to {addr} failed: {reason}")]
    Connection { addr: String, reason: String },

    /// Write failed on an established connection.
    #[error("Transmit failed: {0}")]
    Transmit(#[source] io::Error),

    /// Read failed for a reason other than a timeout.
    #[error("Receive failed: {0}")]
    Receive(#[source] io::Error),

    /// Peer closed the connection.
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// Message could not be built.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Operation called in the wrong session state.
    #[error("Invalid session state: expected {expected:?}, got {actual:?}")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },

    /// Session configuration cannot be used as given.
    #[error("Unsupported session configuration: {0}")]
    Unsupported(String),

    /// The task running the session panicked or was aborted.
    #[error("Session task failed: {0}")]
    Task(String),
}

/// Errors raised while resolving configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("Failed to load track {path}: {reason}")]
    TrackFile { path: String, reason: String },
}
