use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use senslink_frame::ChecksumPolicy;
use senslink_link::{Command as DeviceCommand, CsvRecorder, Link, LinkConfig, LinkEvent};
use senslink_transport::Transport;
use tracing::{debug, info, warn};

use crate::cmd::{open_port, MonitorArgs, PortSession};
use crate::exit::{link_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_event, print_stats, print_wire_line, OutputFormat};

/// How long the event loop blocks before servicing input and the tap.
const TICK: Duration = Duration::from_millis(50);

const HELP: &str = "keys: s=start x=stop g=status r=record e=end record d=debug q=quit";

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let port = &args.port;
    open_port(
        port,
        Monitor {
            args: &args,
            format,
        },
    )
}

/// Interactive key commands, one per stdin line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Start,
    Stop,
    Status,
    Record,
    EndRecord,
    Debug,
    Quit,
}

impl Key {
    fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "s" => Some(Self::Start),
            "x" => Some(Self::Stop),
            "g" => Some(Self::Status),
            "r" => Some(Self::Record),
            "e" => Some(Self::EndRecord),
            "d" => Some(Self::Debug),
            "q" => Some(Self::Quit),
            _ => None,
        }
    }
}

struct Monitor<'a> {
    args: &'a MonitorArgs,
    format: OutputFormat,
}

impl PortSession for Monitor<'_> {
    fn run<T: Transport + 'static>(self, transport: T) -> CliResult<i32> {
        let config = LinkConfig {
            checksum: if self.args.lenient {
                ChecksumPolicy::Lenient
            } else {
                ChecksumPolicy::Strict
            },
            debug: self.args.debug,
            ..LinkConfig::default()
        };
        let (events, event_rx) = mpsc::channel();
        let (tap, tap_rx) = mpsc::channel::<String>();
        let mut link = Link::open_with_tap(transport, events, Arc::new(tap), config)
            .map_err(|err| link_error("link setup failed", err))?;

        let running = Arc::new(AtomicBool::new(true));
        install_ctrlc_handler(running.clone())?;
        let keys = spawn_stdin_reader()?;
        info!(transport = %link.name(), "{HELP}");

        let outcome = self.session(&mut link, &running, &event_rx, &tap_rx, &keys);
        let stats = link.stats();
        let closed = link.close();
        drain_tap(&tap_rx);
        print_stats(&stats, self.format);

        outcome?;
        closed.map_err(|err| link_error("link failed", err))?;
        Ok(SUCCESS)
    }
}

impl Monitor<'_> {
    fn session<T: Transport + 'static>(
        &self,
        link: &mut Link<T>,
        running: &AtomicBool,
        events: &Receiver<LinkEvent>,
        tap: &Receiver<String>,
        keys: &Receiver<Key>,
    ) -> CliResult<()> {
        if self.args.record {
            self.start_recording(link)?;
        }
        link.send(DeviceCommand::GetStatus)
            .map_err(|err| link_error("send failed", err))?;

        while running.load(Ordering::SeqCst) {
            drain_tap(tap);

            match events.recv_timeout(TICK) {
                Ok(event) => print_event(&event, self.format),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    // Handler dropped: the reader is gone.
                    return link
                        .check()
                        .map_err(|err| link_error("link failed", err));
                }
            }

            while let Ok(key) = keys.try_recv() {
                if key == Key::Quit {
                    return Ok(());
                }
                self.apply(link, key)?;
            }
        }
        debug!("interrupted");
        Ok(())
    }

    fn apply<T: Transport + 'static>(&self, link: &mut Link<T>, key: Key) -> CliResult<()> {
        let send = |link: &mut Link<T>, command: DeviceCommand| {
            link.send(command)
                .map(|_| ())
                .map_err(|err| link_error("send failed", err))
        };
        match key {
            Key::Start => send(link, DeviceCommand::StartMeasure),
            Key::Stop => send(link, DeviceCommand::StopMeasure),
            Key::Status => send(link, DeviceCommand::GetStatus),
            Key::Record => self.start_recording(link),
            Key::EndRecord => {
                match link.stop_recording() {
                    Ok(true) => {}
                    Ok(false) => info!("not recording"),
                    Err(err) => warn!(%err, "failed to stop recording"),
                }
                Ok(())
            }
            Key::Debug => {
                let on = link.toggle_debug();
                info!(debug = on, "frame dumps {}", if on { "on" } else { "off" });
                Ok(())
            }
            Key::Quit => Ok(()),
        }
    }

    /// Open a new CSV file and attach it. Failures are reported but leave
    /// the session running without recording.
    fn start_recording<T: Transport + 'static>(&self, link: &mut Link<T>) -> CliResult<()> {
        if link.is_recording() {
            info!("already recording");
            return Ok(());
        }
        let recorder = match CsvRecorder::create(&self.args.record_dir) {
            Ok(recorder) => recorder,
            Err(err) => {
                warn!(%err, "recording not started");
                return Ok(());
            }
        };
        let path = recorder.path().display().to_string();
        match link.start_recording(Box::new(recorder)) {
            Ok(_) => {
                info!(%path, "recording");
                Ok(())
            }
            Err(err) => Err(link_error("recording failed", err)),
        }
    }
}

fn drain_tap(tap: &Receiver<String>) {
    while let Ok(line) = tap.try_recv() {
        print_wire_line(&line);
    }
}

fn spawn_stdin_reader() -> CliResult<Receiver<Key>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("senslink-stdin".to_string())
        .spawn(move || read_keys(std::io::stdin().lock(), &tx))
        .map_err(|err| CliError::new(INTERNAL, format!("failed to start input reader: {err}")))?;
    Ok(rx)
}

fn read_keys(input: impl BufRead, keys: &Sender<Key>) {
    for line in input.lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        match Key::parse(&line) {
            Some(key) => {
                if keys.send(key).is_err() {
                    break;
                }
            }
            None => warn!(input = %line.trim(), "{HELP}"),
        }
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
