use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use senslink_link::Command as DeviceCommand;
use senslink_transport::{
    SerialConfig, SerialTransport, SocketTransport, Transport, DEFAULT_BAUD_RATE,
};

use crate::exit::{transport_error, CliResult};
use crate::output::OutputFormat;

pub mod monitor;
pub mod ports;
pub mod send;
pub mod version;

/// Connect timeout for `--tcp` serial bridges.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open an interactive session and print device events.
    Monitor(MonitorArgs),
    /// Send a single command.
    Send(SendArgs),
    /// List serial ports.
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Monitor(args) => monitor::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Ports(args) => ports::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct PortArgs {
    /// Serial port (e.g. /dev/ttyUSB0, COM3), or HOST:PORT with --tcp.
    pub port: String,
    /// Baud rate.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Treat PORT as the address of a TCP serial bridge.
    #[arg(long)]
    pub tcp: bool,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// Start recording to CSV immediately.
    #[arg(long)]
    pub record: bool,
    /// Directory for CSV recordings.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub record_dir: PathBuf,
    /// Start with frame hex dumps enabled.
    #[arg(long)]
    pub debug: bool,
    /// Accept inbound frames whose checksum does not match.
    #[arg(long)]
    pub lenient: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// get-status, start, stop, or a numeric command id (e.g. 7, 0x10).
    #[arg(value_parser = parse_command_id)]
    pub command: u8,
    /// Argument bytes appended after the sequence number (comma-separated).
    #[arg(long, value_delimiter = ',', value_parser = parse_byte)]
    pub args: Vec<u8>,
    /// Wait for the device to acknowledge the command.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the ACK when --wait is set (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub wait_timeout: String,
    /// Log frame hex dumps.
    #[arg(long)]
    pub debug: bool,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Work that runs over whichever transport the port arguments select.
pub trait PortSession {
    fn run<T: Transport + 'static>(self, transport: T) -> CliResult<i32>;
}

pub fn open_port<S: PortSession>(port: &PortArgs, session: S) -> CliResult<i32> {
    if port.tcp {
        let transport = SocketTransport::connect_tcp(&port.port, CONNECT_TIMEOUT)
            .map_err(|err| transport_error("connect failed", err))?;
        session.run(transport)
    } else {
        let config = SerialConfig::new(port.port.as_str()).with_baud_rate(port.baud);
        let transport = SerialTransport::open(&config)
            .map_err(|err| transport_error("open failed", err))?;
        session.run(transport)
    }
}

fn parse_command_id(input: &str) -> Result<u8, String> {
    let known = [
        DeviceCommand::GetStatus,
        DeviceCommand::StartMeasure,
        DeviceCommand::StopMeasure,
    ];
    if let Some(command) = known.iter().find(|c| c.name() == input) {
        return Ok(command.id());
    }
    parse_byte(input).map_err(|_| {
        format!("unknown command '{input}' (expected get-status, start, stop or 0-255)")
    })
}

fn parse_byte(input: &str) -> Result<u8, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|err| format!("invalid byte '{input}': {err}"))
}
