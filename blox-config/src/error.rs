//! Common error types for blox-config.
//!
//! This module provides a centralized Error enum using thiserror. A device
//! rejecting a command is not an error; see
//! [`ProtocolResult`](crate::protocol::ProtocolResult).

use thiserror::Error;

/// Main error type for blox-config operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The endpoint does not name a usable medium, or it failed to open
    #[error("cannot open {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    /// I/O errors on an open link, including write timeouts
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device answered with something the protocol does not allow
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Command arguments outside the range the firmware accepts
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Malformed replies from the switch MCU.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("no status byte received from board")]
    NoStatus,

    #[error("unknown status byte {0:#04x}")]
    UnknownStatus(u8),

    #[error("payload too short: expected {expected} bytes, got {actual}")]
    ShortPayload { expected: usize, actual: usize },
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
