//! Command/response protocol spoken by the SwitchBlox MCU.
//!
//! A command is a batch of fixed 4-byte records. Each record is written
//! raw, with no length field or checksum, and followed by a settle delay
//! because the MCU handles commands synchronously and drops bytes that
//! arrive while it is busy. Once every record is out the MCU answers with
//! one status byte ([`STATUS_SUCCESS`] or [`STATUS_FAILURE`]). For reads,
//! a successful status is followed by a payload of the length the caller
//! declared up front.
//!
//! ```text
//! Idle -> Writing(1..n) -> AwaitStatus -> Success -> [ReadingPayload] -> Done
//!                                      -> Failure -> Done
//!                                      -> Malformed (error)
//! ```

use std::fmt;
use std::time::Duration;
use tokio::time;

use crate::error::{Error, ProtocolError, Result};
use crate::tracing::prelude::*;
use crate::transport::{Link, Transport};

/// Size of one command record on the wire.
pub const RECORD_LEN: usize = 4;

/// Pause after every record before the next write or the status read.
pub const COMMAND_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Status byte sent by the MCU when it carried out the command.
pub const STATUS_SUCCESS: u8 = 1;

/// Status byte sent by the MCU when it refused or failed the command.
pub const STATUS_FAILURE: u8 = 2;

/// One instruction for the MCU: an opcode followed by three arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandRecord([u8; RECORD_LEN]);

impl CommandRecord {
    pub const fn new(opcode: u8, arg1: u8, arg2: u8, arg3: u8) -> Self {
        Self([opcode, arg1, arg2, arg3])
    }

    pub fn opcode(&self) -> u8 {
        self.0[0]
    }

    /// The record exactly as it goes on the wire.
    pub fn as_bytes(&self) -> &[u8; RECORD_LEN] {
        &self.0
    }
}

impl From<[u8; RECORD_LEN]> for CommandRecord {
    fn from(bytes: [u8; RECORD_LEN]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[i64]> for CommandRecord {
    type Error = Error;

    fn try_from(values: &[i64]) -> Result<Self> {
        if values.len() != RECORD_LEN {
            return Err(Error::InvalidArgument(format!(
                "a command record has {RECORD_LEN} values, got {}",
                values.len()
            )));
        }
        let mut bytes = [0u8; RECORD_LEN];
        for (byte, &value) in bytes.iter_mut().zip(values) {
            *byte = u8::try_from(value).map_err(|_| {
                Error::InvalidArgument(format!("{value} does not fit in a byte (0..=255)"))
            })?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for CommandRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [op, a, b, c] = self.0;
        write!(f, "[{op}, {a}, {b}, {c}]")
    }
}

/// The records making up one logical operation, in transmission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandBatch(Vec<CommandRecord>);

impl CommandBatch {
    pub fn new(records: Vec<CommandRecord>) -> Self {
        Self(records)
    }

    pub fn single(record: CommandRecord) -> Self {
        Self(vec![record])
    }

    pub fn records(&self) -> &[CommandRecord] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<CommandRecord> for CommandBatch {
    fn from_iter<I: IntoIterator<Item = CommandRecord>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Number of payload bytes expected after a successful status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReadBack(usize);

impl ReadBack {
    /// Status only; the command writes configuration.
    pub const NONE: ReadBack = ReadBack(0);

    pub const fn bytes(len: usize) -> Self {
        Self(len)
    }

    pub fn len(&self) -> usize {
        self.0
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

/// Outcome reported by the status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure,
}

impl TryFrom<u8> for Status {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> std::result::Result<Self, ProtocolError> {
        match byte {
            STATUS_SUCCESS => Ok(Status::Success),
            STATUS_FAILURE => Ok(Status::Failure),
            other => Err(ProtocolError::UnknownStatus(other)),
        }
    }
}

/// Result of a command the MCU answered.
///
/// A payload is only ever present on success, and only when one was
/// requested. It may be shorter than requested if the board stopped
/// sending before the read timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolResult {
    success: bool,
    payload: Option<Vec<u8>>,
}

impl ProtocolResult {
    fn accepted(payload: Option<Vec<u8>>) -> Self {
        Self {
            success: true,
            payload,
        }
    }

    fn rejected() -> Self {
        Self {
            success: false,
            payload: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    pub fn into_payload(self) -> Option<Vec<u8>> {
        self.payload
    }
}

/// Send `batch` to the board at `endpoint` and collect its answer.
///
/// The session is opened here and dropped before returning, whichever way
/// this returns. A board that rejects the command yields a result with
/// `is_success() == false`; a board that does not answer, or answers with
/// an unknown status byte, yields [`Error::Protocol`].
pub async fn execute<L: Link>(
    link: &L,
    endpoint: &str,
    batch: &CommandBatch,
    read_back: ReadBack,
) -> Result<ProtocolResult> {
    let mut session = link.open(endpoint)?;
    exchange(&mut session, batch, read_back).await
}

async fn exchange<T: Transport>(
    session: &mut T,
    batch: &CommandBatch,
    read_back: ReadBack,
) -> Result<ProtocolResult> {
    if batch.is_empty() {
        warn!("Sending an empty command batch; only reading status.");
    }

    for record in batch.records() {
        debug!("Writing command {record}.");
        session.write_bytes(record.as_bytes()).await?;
        time::sleep(COMMAND_SETTLE_DELAY).await;
    }

    let status = session.read_bytes(1).await?;
    let Some(&byte) = status.first() else {
        error!("Failed to read status byte from board.");
        return Err(ProtocolError::NoStatus.into());
    };

    let status = Status::try_from(byte).inspect_err(|_| {
        error!("Board replied with unknown status byte {byte:#04x}.");
    })?;

    match (status, read_back.is_none()) {
        (Status::Success, true) => {
            info!("Success setting configuration in EEPROM.");
            Ok(ProtocolResult::accepted(None))
        }
        (Status::Failure, true) => {
            error!("Failed saving configuration in EEPROM.");
            Ok(ProtocolResult::rejected())
        }
        (Status::Success, false) => {
            let payload = session.read_bytes(read_back.len()).await?;
            if payload.len() < read_back.len() {
                warn!(
                    "Short read-back: expected {} bytes, got {}.",
                    read_back.len(),
                    payload.len()
                );
            }
            info!("Success reading configuration from switch.");
            Ok(ProtocolResult::accepted(Some(payload)))
        }
        (Status::Failure, false) => {
            error!("Failed reading configuration from switch.");
            Ok(ProtocolResult::rejected())
        }
    }
}
