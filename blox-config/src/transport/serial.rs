//! USB-to-UART transport to the switch MCU.

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{self, Instant};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};

use super::{Link, Transport, BAUD_RATE, READ_TIMEOUT, WRITE_TIMEOUT};
use crate::error::{Error, Result};
use crate::tracing::prelude::*;

/// Serial device nodes must live under this directory.
pub const DEVICE_PATH_PREFIX: &str = "/dev/";

/// Opens sessions on serial device nodes.
///
/// The port is registered with the tokio reactor, so [`Link::open`] must be
/// called from within a tokio runtime; outside one it panics.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialLink;

impl SerialLink {
    pub fn description() -> &'static str {
        "USB-to-UART converter"
    }
}

impl Link for SerialLink {
    type Session = SerialSession;

    fn open(&self, endpoint: &str) -> Result<SerialSession> {
        if !endpoint.starts_with(DEVICE_PATH_PREFIX) {
            return Err(Error::Connection {
                endpoint: endpoint.to_string(),
                reason: format!("not a UART device, expected a path under {DEVICE_PATH_PREFIX}"),
            });
        }

        let port = tokio_serial::new(endpoint, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open_native_async()
            .map_err(|e| Error::Connection {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        debug!("Opened {endpoint} at {BAUD_RATE} baud, 8N1.");
        Ok(SerialSession::new(port, endpoint))
    }
}

/// An open serial port. The port is closed when the session is dropped.
pub struct SerialSession {
    port: SerialStream,
    endpoint: String,
}

impl SerialSession {
    fn new(port: SerialStream, endpoint: &str) -> Self {
        Self {
            port,
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl Transport for SerialSession {
    async fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        let port = &mut self.port;
        time::timeout(WRITE_TIMEOUT, async move {
            port.write_all(buf).await?;
            port.flush().await
        })
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "UART write timeout"))??;
        Ok(())
    }

    async fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        let deadline = Instant::now() + READ_TIMEOUT;

        while filled < len {
            match time::timeout_at(deadline, self.port.read(&mut buf[filled..])).await {
                Ok(Ok(0)) => {
                    debug!("{} closed after {filled} of {len} bytes.", self.endpoint);
                    break;
                }
                Ok(Ok(n)) => filled += n,
                Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    debug!("Read timeout on {} after {filled} of {len} bytes.", self.endpoint);
                    break;
                }
            }
        }

        buf.truncate(filled);
        Ok(buf)
    }
}

impl Drop for SerialSession {
    fn drop(&mut self) {
        trace!("Closing {}.", self.endpoint);
    }
}
