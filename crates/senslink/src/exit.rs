use std::fmt;
use std::io;

use senslink_link::{LinkError, SinkError};
use senslink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match err.io_kind() {
        Some(io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => TIMEOUT,
        _ => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn sink_error(context: &str, err: SinkError) -> CliError {
    CliError::new(FAILURE, format!("{context}: {err}"))
}

pub fn link_error(context: &str, err: LinkError) -> CliError {
    match err {
        LinkError::Transport(err) => transport_error(context, err),
        LinkError::Sink(err) => sink_error(context, err),
        LinkError::Frame(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        LinkError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        LinkError::ReaderStopped => CliError::new(FAILURE, format!("{context}: {err}")),
        LinkError::Spawn(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}
