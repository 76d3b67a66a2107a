//! Configure SwitchBlox managed Ethernet switches over their UART link.
//!
//! The [`protocol`] module sends command records to the switch MCU and
//! interprets its status and read-back reply, over any [`transport::Link`].
//! [`commands`] builds those records for the queries the firmware supports.

pub mod commands;
pub mod config;
pub mod error;
pub mod protocol;
pub mod tracing;
pub mod transport;

pub use error::{Error, ProtocolError, Result};
pub use protocol::{execute, CommandBatch, CommandRecord, ProtocolResult, ReadBack};
