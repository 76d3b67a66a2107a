//! Physical transport layer for the switch MCU link.
//!
//! This module moves raw bytes to and from the board without any protocol
//! knowledge. A [`Link`] opens a session on an endpoint; the session is a
//! [`Transport`] and the medium stays open exactly as long as the session
//! value lives, so dropping it on any path releases the link.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

pub mod fake;
pub mod serial;

pub use fake::{FakeLink, FakeSession};
pub use serial::{SerialLink, SerialSession};

/// Line speed the SwitchBlox firmware is built for.
pub const BAUD_RATE: u32 = 115_200;

/// Upper bound on a single `read_bytes` call, from first byte requested to
/// last byte returned.
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on a single `write_bytes` call.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Opens transport sessions on a named endpoint.
pub trait Link {
    type Session: Transport;

    /// Open a session on `endpoint`.
    ///
    /// Fails with [`Error::Connection`](crate::error::Error::Connection) if
    /// the endpoint is not a valid medium or cannot be initialised.
    /// Implementations backed by an async medium, such as
    /// [`SerialLink`], need a running tokio runtime.
    fn open(&self, endpoint: &str) -> Result<Self::Session>;
}

/// An open byte stream to the board.
#[async_trait]
pub trait Transport: Send {
    /// Send all of `buf`, failing if the write does not complete within
    /// [`WRITE_TIMEOUT`].
    async fn write_bytes(&mut self, buf: &[u8]) -> Result<()>;

    /// Read up to `len` bytes.
    ///
    /// Returns early with whatever has arrived once [`READ_TIMEOUT`]
    /// elapses or the stream ends, so the result may be shorter than `len`
    /// or empty.
    async fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>>;
}
