use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use senslink_link::{Ack, Link, LinkConfig, LinkEvent, TracingTap};
use senslink_transport::Transport;
use tracing::debug;

use crate::cmd::{open_port, PortSession, SendArgs};
use crate::exit::{link_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_event, print_sent, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let port = &args.port;
    open_port(
        port,
        SendOne {
            args: &args,
            wait_timeout,
            format,
        },
    )
}

struct SendOne<'a> {
    args: &'a SendArgs,
    wait_timeout: Duration,
    format: OutputFormat,
}

impl PortSession for SendOne<'_> {
    fn run<T: Transport + 'static>(self, transport: T) -> CliResult<i32> {
        let (events, rx) = mpsc::channel();
        let config = LinkConfig {
            debug: self.args.debug,
            ..LinkConfig::default()
        };
        let mut link = Link::open_with_tap(transport, events, Arc::new(TracingTap), config)
            .map_err(|err| link_error("link setup failed", err))?;

        let cmd_id = self.args.command;
        let seq = link
            .send_command(cmd_id, &self.args.args)
            .map_err(|err| link_error("send failed", err))?;

        if !self.args.wait {
            print_sent(cmd_id, seq, self.format);
            link.close().map_err(|err| link_error("close failed", err))?;
            return Ok(SUCCESS);
        }

        let ack = wait_for_ack(&rx, cmd_id, self.wait_timeout);
        let closed = link.close();
        let Some(ack) = ack else {
            if let Err(err) = closed {
                return Err(link_error("link failed", err));
            }
            return Err(CliError::new(
                TIMEOUT,
                format!(
                    "no ACK for command 0x{cmd_id:02X} within {:?}",
                    self.wait_timeout
                ),
            ));
        };

        print_event(&LinkEvent::Ack(ack), self.format);
        if ack.is_success() {
            Ok(SUCCESS)
        } else {
            Ok(FAILURE)
        }
    }
}

/// Wait for the first ACK naming `cmd_id`, skipping other traffic.
///
/// ACKs are matched on command id alone.
fn wait_for_ack(events: &Receiver<LinkEvent>, cmd_id: u8, timeout: Duration) -> Option<Ack> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(LinkEvent::Ack(ack)) if ack.acknowledges(cmd_id) => return Some(ack),
            Ok(other) => debug!(?other, "ignoring event while waiting for ACK"),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
        }
    }
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(num) => (num, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
