//! Command-line interface for blox-config.
//!
//! Sends one query to a SwitchBlox over its USB-to-UART converter and
//! prints the answer on stdout. Exits 0 when the switch carried out the
//! command, 1 when it refused, and 2 on any other failure.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use blox_config::commands::{DeviceCommand, Storage};
use blox_config::config::{Config, DEVICE_ENV};
use blox_config::protocol::{self, CommandBatch, CommandRecord, ReadBack, STATUS_SUCCESS};
use blox_config::tracing::{self, prelude::*};
use blox_config::transport::{FakeLink, Link, SerialLink};

#[derive(Parser, Debug)]
#[command(name = "blox-config", version, about = "Configure SwitchBlox managed switches")]
struct Cli {
    /// UART device the switch is attached to
    #[arg(short, long, env = DEVICE_ENV, global = true)]
    device: Option<String>,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Talk to a simulated switch that accepts everything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read firmware revision from the switch MCU
    FwRev,

    /// Read board type from the switch MCU
    BoardType,

    /// Read a switch register
    ReadSwitch {
        /// PHY number to read (2-24)
        phy: u8,
        /// Register number to read (0-31)
        reg: u8,
    },

    /// Read a stored configuration command
    ReadConfig {
        /// Index of stored command to read (0-19)
        #[arg(value_name = "COMMAND")]
        index: u8,
        /// Read the temporary commands in RAM instead of EEPROM
        #[arg(short, long)]
        temp: bool,
    },

    /// Send a raw command record
    Raw {
        /// Opcode followed by three arguments, each 0-255
        #[arg(
            required = true,
            num_args = 4,
            value_names = ["OP", "ARG1", "ARG2", "ARG3"],
            allow_negative_numbers = true
        )]
        record: Vec<i64>,
        /// Number of bytes the switch sends back on success
        #[arg(short, long, default_value_t = 0)]
        read_back: usize,
    },
}

impl Command {
    /// The catalogue entry for this subcommand, if it has one.
    fn device_command(&self) -> Result<Option<DeviceCommand>> {
        let command = match *self {
            Command::FwRev => DeviceCommand::FirmwareRevision,
            Command::BoardType => DeviceCommand::BoardType,
            Command::ReadSwitch { phy, reg } => DeviceCommand::read_switch(phy, reg)?,
            Command::ReadConfig { index, temp } => {
                let storage = if temp { Storage::Ram } else { Storage::Eeprom };
                DeviceCommand::read_config(index, storage)?
            }
            Command::Raw { .. } => return Ok(None),
        };
        Ok(Some(command))
    }
}

struct Request {
    batch: CommandBatch,
    read_back: ReadBack,
    command: Option<DeviceCommand>,
}

impl Request {
    fn from_command(command: &Command) -> Result<Self> {
        if let Command::Raw { record, read_back } = command {
            let record = CommandRecord::try_from(record.as_slice())?;
            return Ok(Self {
                batch: CommandBatch::single(record),
                read_back: ReadBack::bytes(*read_back),
                command: None,
            });
        }

        let command = command
            .device_command()?
            .context("subcommand has no device command")?;
        Ok(Self {
            batch: command.batch(),
            read_back: command.read_back(),
            command: Some(command),
        })
    }
}

/// Run the request against the switch. Returns whether it succeeded.
async fn send<L: Link>(link: &L, device: &str, request: &Request) -> Result<bool> {
    let result = protocol::execute(link, device, &request.batch, request.read_back)
        .await
        .with_context(|| format!("talking to switch on {device}"))?;

    if !result.is_success() {
        eprintln!("The switch rejected the command.");
        return Ok(false);
    }

    match (request.command, result.payload()) {
        (Some(command), Some(payload)) => {
            let reading = command.interpret(payload)?;
            info!("Read {reading:?}.");
            println!("{reading}");
        }
        (None, Some(payload)) => println!("{payload:?}"),
        (_, None) => {}
    }
    Ok(true)
}

async fn run(cli: &Cli, config: &Config) -> Result<bool> {
    let request = Request::from_command(&cli.command)?;
    let device = config.device(cli.device.as_deref());

    if cli.dry_run {
        let mut reply = vec![STATUS_SUCCESS];
        reply.resize(1 + request.read_back.len(), 0);
        info!("Dry run via {} link.", FakeLink::description());
        send(&FakeLink::replying(reply), &device, &request).await
    } else {
        debug!("Using {} on {device}.", SerialLink::description());
        send(&SerialLink, &device, &request).await
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("blox-config: {e}");
            return ExitCode::from(2);
        }
    };
    tracing::init_journald_or_stderr(
        tracing::level_for_verbosity(cli.verbose),
        config.log_level.as_deref(),
    );

    match run(&cli, &config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{e:#}");
            eprintln!("blox-config: {e:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_read_config_with_temp() {
        let cli = Cli::try_parse_from([
            "blox-config",
            "-d",
            "/dev/ttyUSB0",
            "read-config",
            "4",
            "--temp",
        ])
        .unwrap();
        let request = Request::from_command(&cli.command).unwrap();

        assert_eq!(cli.device.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(request.batch, CommandBatch::single(CommandRecord::new(102, 3, 4, 0)));
        assert_eq!(request.read_back, ReadBack::bytes(4));
    }

    #[test]
    fn parses_raw_record() {
        let cli = Cli::try_parse_from([
            "blox-config",
            "raw",
            "102",
            "1",
            "5",
            "3",
            "--read-back",
            "4",
        ])
        .unwrap();
        let request = Request::from_command(&cli.command).unwrap();

        assert_eq!(request.batch, CommandBatch::single(CommandRecord::new(102, 1, 5, 3)));
        assert_eq!(request.read_back, ReadBack::bytes(4));
        assert!(request.command.is_none());
    }

    #[test]
    fn raw_rejects_out_of_range_values() {
        let cli = Cli::try_parse_from(["blox-config", "raw", "300", "0", "0", "0"]).unwrap();
        assert!(Request::from_command(&cli.command).is_err());
    }

    #[test]
    fn read_switch_validates_phy() {
        let cli = Cli::try_parse_from(["blox-config", "read-switch", "1", "0"]).unwrap();
        assert!(Request::from_command(&cli.command).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn dry_run_accepts_queries() {
        let cli = Cli::try_parse_from(["blox-config", "--dry-run", "board-type"]).unwrap();
        assert!(run(&cli, &Config::default()).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_command_reports_false() {
        let request = Request::from_command(&Command::FwRev).unwrap();
        let link = FakeLink::replying([protocol::STATUS_FAILURE]);
        assert!(!send(&link, "/dev/ttyACM0", &request).await.unwrap());
    }
}
