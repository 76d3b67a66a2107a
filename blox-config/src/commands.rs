//! Catalogue of read-only queries understood by the SwitchBlox firmware.
//!
//! Each [`DeviceCommand`] knows the records to send, how much read-back to
//! expect, and how to turn the payload into something worth printing.

use std::fmt;
use std::ops::RangeInclusive;
use strum::Display;

use crate::error::{Error, ProtocolError, Result};
use crate::protocol::{CommandBatch, CommandRecord, ReadBack};

/// Opcodes (first byte of a record).
pub mod opcode {
    pub const READ: u8 = 102;
    pub const FIRMWARE_REVISION: u8 = 103;
    pub const BOARD_TYPE: u8 = 104;
}

/// What an [`opcode::READ`] record reads, in its second byte.
pub mod read_target {
    pub const SWITCH_REGISTER: u8 = 1;
    pub const EEPROM_COMMAND: u8 = 2;
    pub const RAM_COMMAND: u8 = 3;
}

pub const PHY_RANGE: RangeInclusive<u8> = 2..=24;
pub const REGISTER_RANGE: RangeInclusive<u8> = 0..=31;
pub const COMMAND_INDEX_RANGE: RangeInclusive<u8> = 0..=19;

/// Payload byte identifying a SwitchBlox Nano.
const NANO_BOARD_ID: u8 = b'n';

/// Length of a switch register or stored command read.
const WORD_LEN: usize = 4;

fn check_range(what: &str, value: u8, range: &RangeInclusive<u8>) -> Result<u8> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(Error::InvalidArgument(format!(
            "{value} is not a valid {what} ({} <= {what} <= {})",
            range.start(),
            range.end()
        )))
    }
}

/// Where stored configuration commands are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Storage {
    #[strum(serialize = "EEPROM")]
    Eeprom,
    /// Temporary commands not yet saved.
    #[strum(serialize = "RAM")]
    Ram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BoardType {
    #[strum(serialize = "SwitchBlox Nano")]
    Nano,
    #[strum(serialize = "SwitchBlox")]
    SwitchBlox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    FirmwareRevision,
    BoardType,
    /// Read register `reg` of switch PHY `phy`.
    ReadSwitch { phy: u8, reg: u8 },
    /// Read the configuration command stored at `index`.
    ReadConfig { index: u8, storage: Storage },
}

impl DeviceCommand {
    pub fn read_switch(phy: u8, reg: u8) -> Result<Self> {
        Ok(DeviceCommand::ReadSwitch {
            phy: check_range("PHY", phy, &PHY_RANGE)?,
            reg: check_range("REG", reg, &REGISTER_RANGE)?,
        })
    }

    pub fn read_config(index: u8, storage: Storage) -> Result<Self> {
        Ok(DeviceCommand::ReadConfig {
            index: check_range("command", index, &COMMAND_INDEX_RANGE)?,
            storage,
        })
    }

    pub fn batch(&self) -> CommandBatch {
        let record = match *self {
            DeviceCommand::FirmwareRevision => {
                CommandRecord::new(opcode::FIRMWARE_REVISION, 0, 0, 0)
            }
            DeviceCommand::BoardType => CommandRecord::new(opcode::BOARD_TYPE, 0, 0, 0),
            DeviceCommand::ReadSwitch { phy, reg } => {
                CommandRecord::new(opcode::READ, read_target::SWITCH_REGISTER, phy, reg)
            }
            DeviceCommand::ReadConfig { index, storage } => {
                let target = match storage {
                    Storage::Eeprom => read_target::EEPROM_COMMAND,
                    Storage::Ram => read_target::RAM_COMMAND,
                };
                CommandRecord::new(opcode::READ, target, index, 0)
            }
        };
        CommandBatch::single(record)
    }

    pub fn read_back(&self) -> ReadBack {
        match self {
            DeviceCommand::FirmwareRevision | DeviceCommand::BoardType => ReadBack::bytes(1),
            DeviceCommand::ReadSwitch { .. } | DeviceCommand::ReadConfig { .. } => {
                ReadBack::bytes(WORD_LEN)
            }
        }
    }

    /// Decode the payload of a successful reply.
    ///
    /// Fails if the payload is shorter than the reading needs.
    pub fn interpret(&self, payload: &[u8]) -> Result<Reading> {
        let need = |expected: usize| -> Result<()> {
            if payload.len() < expected {
                Err(ProtocolError::ShortPayload {
                    expected,
                    actual: payload.len(),
                }
                .into())
            } else {
                Ok(())
            }
        };

        match *self {
            DeviceCommand::FirmwareRevision => {
                need(1)?;
                Ok(Reading::FirmwareRevision(payload[0]))
            }
            DeviceCommand::BoardType => {
                need(1)?;
                let board = if payload[0] == NANO_BOARD_ID {
                    BoardType::Nano
                } else {
                    BoardType::SwitchBlox
                };
                Ok(Reading::BoardType(board))
            }
            DeviceCommand::ReadSwitch { phy, reg } => {
                need(WORD_LEN)?;
                Ok(Reading::SwitchRegister {
                    phy,
                    reg,
                    value: payload[..WORD_LEN].to_vec(),
                })
            }
            DeviceCommand::ReadConfig { index, storage } => {
                need(WORD_LEN)?;
                Ok(Reading::StoredCommand {
                    index,
                    storage,
                    record: payload[..WORD_LEN].to_vec(),
                })
            }
        }
    }
}

/// A decoded reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reading {
    FirmwareRevision(u8),
    BoardType(BoardType),
    SwitchRegister { phy: u8, reg: u8, value: Vec<u8> },
    StoredCommand { index: u8, storage: Storage, record: Vec<u8> },
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::FirmwareRevision(rev) => write!(f, "{rev}"),
            Reading::BoardType(board) => write!(f, "{board}"),
            Reading::SwitchRegister { value, .. } => write!(f, "{value:?}"),
            Reading::StoredCommand { record, .. } => write!(f, "{record:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn only_record(command: DeviceCommand) -> [u8; 4] {
        let batch = command.batch();
        assert_eq!(batch.len(), 1);
        *batch.records()[0].as_bytes()
    }

    #[test]
    fn records_match_firmware_opcodes() {
        assert_eq!(only_record(DeviceCommand::FirmwareRevision), [103, 0, 0, 0]);
        assert_eq!(only_record(DeviceCommand::BoardType), [104, 0, 0, 0]);
        assert_eq!(
            only_record(DeviceCommand::read_switch(5, 3).unwrap()),
            [102, 1, 5, 3]
        );
        assert_eq!(
            only_record(DeviceCommand::read_config(7, Storage::Eeprom).unwrap()),
            [102, 2, 7, 0]
        );
        assert_eq!(
            only_record(DeviceCommand::read_config(7, Storage::Ram).unwrap()),
            [102, 3, 7, 0]
        );
    }

    #[test]
    fn read_back_lengths() {
        assert_eq!(DeviceCommand::FirmwareRevision.read_back(), ReadBack::bytes(1));
        assert_eq!(DeviceCommand::BoardType.read_back(), ReadBack::bytes(1));
        assert_eq!(
            DeviceCommand::read_switch(2, 0).unwrap().read_back(),
            ReadBack::bytes(4)
        );
        assert_eq!(
            DeviceCommand::read_config(0, Storage::Ram).unwrap().read_back(),
            ReadBack::bytes(4)
        );
    }

    #[test_case(2, 0 ; "lowest")]
    #[test_case(24, 31 ; "highest")]
    fn read_switch_accepts(phy: u8, reg: u8) {
        assert!(DeviceCommand::read_switch(phy, reg).is_ok());
    }

    #[test_case(1, 0 ; "phy below range")]
    #[test_case(25, 0 ; "phy above range")]
    #[test_case(2, 32 ; "reg above range")]
    fn read_switch_rejects(phy: u8, reg: u8) {
        assert!(matches!(
            DeviceCommand::read_switch(phy, reg),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn read_config_index_range() {
        assert!(DeviceCommand::read_config(19, Storage::Eeprom).is_ok());
        assert!(matches!(
            DeviceCommand::read_config(20, Storage::Eeprom),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test_case(b'n', BoardType::Nano ; "nano")]
    #[test_case(b's', BoardType::SwitchBlox ; "switchblox")]
    fn board_type(byte: u8, expected: BoardType) {
        assert_eq!(
            DeviceCommand::BoardType.interpret(&[byte]).unwrap(),
            Reading::BoardType(expected)
        );
    }

    #[test]
    fn display_readings() {
        assert_eq!(Reading::FirmwareRevision(12).to_string(), "12");
        assert_eq!(Reading::BoardType(BoardType::Nano).to_string(), "SwitchBlox Nano");
        let reading = DeviceCommand::read_switch(5, 3)
            .unwrap()
            .interpret(&[9, 8, 7, 6])
            .unwrap();
        assert_eq!(reading.to_string(), "[9, 8, 7, 6]");
    }

    #[test]
    fn short_payload_cannot_be_interpreted() {
        let err = DeviceCommand::read_config(1, Storage::Ram)
            .unwrap()
            .interpret(&[1, 2])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::ShortPayload { expected: 4, actual: 2 })
        ));
        assert!(DeviceCommand::FirmwareRevision.interpret(&[]).is_err());
    }
}
