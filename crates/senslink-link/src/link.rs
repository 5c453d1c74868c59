use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use senslink_frame::{hex_dump, Direction, FrameType};
use senslink_transport::{Transport, TransportError};
use tracing::{debug, info, warn};

use crate::command::{Command, CommandEncoder};
use crate::config::LinkConfig;
use crate::dispatcher::{Dispatcher, EventHandler};
use crate::error::{LinkError, Result};
use crate::reader::{Reader, ReaderControl, Ticket};
use crate::recording::RecordingSink;
use crate::session::{LinkStats, SessionFlags, StatsSnapshot};
use crate::tap::DebugTap;

/// An open session with one device.
///
/// Commands are written from the owning thread. Inbound traffic is handled
/// on a dedicated reader thread that owns a clone of the transport and the
/// event handler.
///
/// Dropping a `Link` stops the reader and closes the transport; use
/// [`close`](Self::close) to observe errors from either.
pub struct Link<T: Transport + 'static> {
    writer: Option<T>,
    name: String,
    encoder: CommandEncoder,
    flags: Arc<SessionFlags>,
    stats: Arc<LinkStats>,
    tap: Option<Arc<dyn DebugTap>>,
    control: Sender<ReaderControl>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<Result<()>>>,
    config: LinkConfig,
}

impl<T: Transport + 'static> Link<T> {
    /// Start a session over `transport`, delivering events to `handler`.
    pub fn open<H>(transport: T, handler: H, config: LinkConfig) -> Result<Self>
    where
        H: EventHandler + 'static,
    {
        Self::start(transport, handler, None, config)
    }

    /// Like [`open`](Self::open), with hex dumps of every frame sent to
    /// `tap` while debug is on.
    pub fn open_with_tap<H>(
        transport: T,
        handler: H,
        tap: Arc<dyn DebugTap>,
        config: LinkConfig,
    ) -> Result<Self>
    where
        H: EventHandler + 'static,
    {
        Self::start(transport, handler, Some(tap), config)
    }

    fn start<H>(
        transport: T,
        handler: H,
        tap: Option<Arc<dyn DebugTap>>,
        config: LinkConfig,
    ) -> Result<Self>
    where
        H: EventHandler + 'static,
    {
        let name = transport.describe();
        let flags = Arc::new(SessionFlags::new(config.debug));
        let stats = Arc::new(LinkStats::default());
        let stop = Arc::new(AtomicBool::new(false));
        let (control, control_rx) = mpsc::channel();

        let mut dispatcher = Dispatcher::new(handler, flags.clone(), stats.clone());
        if let Some(tap) = &tap {
            dispatcher = dispatcher.with_tap(tap.clone());
        }
        let reader = Reader::new(
            transport.try_clone()?,
            dispatcher,
            control_rx,
            stop.clone(),
            stats.clone(),
            &config,
        );
        let handle = thread::Builder::new()
            .name("senslink-reader".to_string())
            .spawn(move || reader.run())
            .map_err(LinkError::Spawn)?;

        info!(transport = %name, "link open");
        Ok(Self {
            writer: Some(transport),
            name,
            encoder: CommandEncoder::new(),
            flags,
            stats,
            tap,
            control,
            stop,
            reader: Some(handle),
            config,
        })
    }

    /// Encode and write a COMMAND frame. Returns its sequence number.
    pub fn send_command(&mut self, cmd_id: u8, args: &[u8]) -> Result<u8> {
        let writer = self
            .writer
            .as_mut()
            .ok_or(LinkError::Transport(TransportError::Closed))?;
        let (seq, wire) = self.encoder.encode(cmd_id, args)?;

        if self.flags.is_debug() {
            if let Some(tap) = &self.tap {
                tap.emit(hex_dump(Direction::Tx, FrameType::Command, &wire));
            }
        }
        writer.write_all(&wire)?;
        self.stats.frame_sent();
        debug!(cmd_id, seq, "command sent");
        Ok(seq)
    }

    pub fn send(&mut self, command: Command) -> Result<u8> {
        self.send_command(command.id(), &[])
    }

    /// Sequence number of the last command written (0 before the first).
    pub fn last_sequence(&self) -> u8 {
        self.encoder.sequence()
    }

    /// Start appending samples to `sink`.
    ///
    /// Returns `false`, dropping `sink`, when a recording is already
    /// active. Samples dispatched after this returns `true` are recorded.
    /// On [`LinkError::Timeout`] the request is withdrawn and the sink is
    /// closed unused, so recording stays off.
    pub fn start_recording(&mut self, sink: Box<dyn RecordingSink>) -> Result<bool> {
        if self.flags.is_recording() {
            return Ok(false);
        }

        let name = sink.describe();
        let ticket = Ticket::default();
        let (reply, ack) = mpsc::channel();
        self.control
            .send(ReaderControl::Attach {
                sink,
                ticket: ticket.clone(),
                reply,
            })
            .map_err(|_| LinkError::ReaderStopped)?;
        self.await_claimed(&ticket, &ack)?;
        info!(sink = %name, "recording started");
        Ok(true)
    }

    /// Detach and close the active recording.
    ///
    /// Returns `false` when nothing was recording. On
    /// [`LinkError::Timeout`] the request is withdrawn and the recording
    /// carries on.
    pub fn stop_recording(&mut self) -> Result<bool> {
        if !self.flags.is_recording() {
            return Ok(false);
        }

        let ticket = Ticket::default();
        let (reply, ack) = mpsc::channel();
        self.control
            .send(ReaderControl::Detach {
                ticket: ticket.clone(),
                reply,
            })
            .map_err(|_| LinkError::ReaderStopped)?;
        match self.await_claimed(&ticket, &ack)? {
            Some(closed) => {
                closed?;
                info!("recording stopped");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Wait for the reader to answer a ticketed request.
    ///
    /// Past the control timeout the ticket is cancelled. A ticket the
    /// reader already took cannot be cancelled; its reply is awaited in
    /// full.
    fn await_claimed<R>(&self, ticket: &Ticket, ack: &Receiver<R>) -> Result<R> {
        match ack.recv_timeout(self.config.control_timeout) {
            Ok(reply) => Ok(reply),
            Err(RecvTimeoutError::Disconnected) => Err(LinkError::ReaderStopped),
            Err(RecvTimeoutError::Timeout) if ticket.cancel() => {
                warn!(
                    timeout = ?self.config.control_timeout,
                    "reader did not answer; request withdrawn"
                );
                Err(LinkError::Timeout(self.config.control_timeout))
            }
            Err(RecvTimeoutError::Timeout) => ack.recv().map_err(|_| LinkError::ReaderStopped),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.flags.is_recording()
    }

    pub fn is_debug(&self) -> bool {
        self.flags.is_debug()
    }

    pub fn set_debug(&self, on: bool) {
        self.flags.set_debug(on);
    }

    /// Flip the debug tap and return the new state.
    pub fn toggle_debug(&self) -> bool {
        self.flags.toggle_debug()
    }

    /// Whether the reader thread is still receiving.
    pub fn is_running(&self) -> bool {
        self.reader
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Surface a reader failure.
    ///
    /// Returns the error the reader stopped with the first time it is
    /// observed, [`LinkError::ReaderStopped`] after that.
    pub fn check(&mut self) -> Result<()> {
        match &self.reader {
            Some(handle) if !handle.is_finished() => return Ok(()),
            Some(_) => {}
            None => return Err(LinkError::ReaderStopped),
        }
        match self.reader.take().map(JoinHandle::join) {
            Some(Ok(Err(err))) => Err(err),
            _ => Err(LinkError::ReaderStopped),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Shared session flags, for observers on other threads.
    pub fn flags(&self) -> Arc<SessionFlags> {
        self.flags.clone()
    }

    /// Transport description, e.g. `serial:/dev/ttyUSB0`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop recording, stop the reader and close the transport.
    ///
    /// The reader's error wins when several steps fail.
    pub fn close(mut self) -> Result<()> {
        let recording = match self.stop_recording() {
            Err(LinkError::ReaderStopped) => Ok(false),
            other => other,
        };
        let reader = self.stop_reader();
        let transport = match self.writer.take() {
            Some(writer) => writer.close().map_err(LinkError::from),
            None => Ok(()),
        };
        info!(transport = %self.name, stats = ?self.stats.snapshot(), "link closed");
        reader.and(recording.map(|_| ())).and(transport)
    }

    fn stop_reader(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::Release);
        match self.reader.take().map(JoinHandle::join) {
            None | Some(Ok(Ok(()))) => Ok(()),
            Some(Ok(Err(err))) => Err(err),
            Some(Err(_)) => {
                warn!("reader thread panicked");
                Err(LinkError::ReaderStopped)
            }
        }
    }
}

impl<T: Transport + 'static> Drop for Link<T> {
    fn drop(&mut self) {
        if self.reader.is_none() && self.writer.is_none() {
            return;
        }
        if let Err(err) = self.stop_reader() {
            debug!(%err, "reader ended with error during drop");
        }
        if let Some(writer) = self.writer.take() {
            let _ = writer.close();
        }
    }
}

impl<T: Transport + 'static> std::fmt::Debug for Link<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("transport", &self.name)
            .field("running", &self.is_running())
            .field("recording", &self.is_recording())
            .field("debug", &self.is_debug())
            .finish()
    }
}
