//! Background reader: transport bytes in, dispatched frames out.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use senslink_frame::Reassembler;
use senslink_transport::Transport;
use tracing::{debug, error, warn};

use crate::config::LinkConfig;
use crate::dispatcher::{Dispatcher, EventHandler};
use crate::error::{Result, SinkError};
use crate::recording::RecordingSink;
use crate::session::LinkStats;

const PENDING: u8 = 0;
const TAKEN: u8 = 1;
const CANCELLED: u8 = 2;

/// Claim on a control request, settled exactly once.
///
/// The reader takes a ticket before acting on its request. The issuer
/// cancels it when it gives up waiting. Whichever side gets there first
/// decides whether the request happens at all.
#[derive(Debug, Clone, Default)]
pub(crate) struct Ticket(Arc<AtomicU8>);

impl Ticket {
    pub(crate) fn take(&self) -> bool {
        self.settle(TAKEN)
    }

    pub(crate) fn cancel(&self) -> bool {
        self.settle(CANCELLED)
    }

    fn settle(&self, outcome: u8) -> bool {
        self.0
            .compare_exchange(PENDING, outcome, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Requests from the foreground, applied between reads.
///
/// Requests whose ticket was cancelled are dropped unapplied.
pub(crate) enum ReaderControl {
    /// Start appending samples to the sink. Replies once attached.
    Attach {
        sink: Box<dyn RecordingSink>,
        ticket: Ticket,
        reply: Sender<()>,
    },
    /// Detach and close the active sink. Replies with the close result,
    /// or `None` when nothing was attached.
    Detach {
        ticket: Ticket,
        reply: Sender<Option<std::result::Result<(), SinkError>>>,
    },
}

pub(crate) struct Reader<T, H> {
    transport: T,
    reassembler: Reassembler,
    dispatcher: Dispatcher<H>,
    control: Receiver<ReaderControl>,
    stop: Arc<AtomicBool>,
    stats: Arc<LinkStats>,
    poll_interval: Duration,
    read_chunk_size: usize,
}

impl<T: Transport, H: EventHandler> Reader<T, H> {
    pub(crate) fn new(
        transport: T,
        dispatcher: Dispatcher<H>,
        control: Receiver<ReaderControl>,
        stop: Arc<AtomicBool>,
        stats: Arc<LinkStats>,
        config: &LinkConfig,
    ) -> Self {
        Self {
            transport,
            reassembler: Reassembler::with_policy(config.checksum),
            dispatcher,
            control,
            stop,
            stats,
            poll_interval: config.poll_interval,
            read_chunk_size: config.read_chunk_size.max(1),
        }
    }

    /// Run until the stop flag is raised or the transport fails.
    ///
    /// Any attached sink is closed before returning.
    pub(crate) fn run(mut self) -> Result<()> {
        let mut buf = vec![0u8; self.read_chunk_size];
        debug!(transport = %self.transport.describe(), "reader started");

        let outcome = loop {
            self.apply_controls();
            if self.stop.load(Ordering::Acquire) {
                break Ok(());
            }

            match self.transport.read_available(&mut buf) {
                Ok(0) => thread::sleep(self.poll_interval),
                Ok(n) => {
                    self.reassembler.feed(&buf[..n]);
                    self.process();
                }
                Err(err) => {
                    error!(
                        %err,
                        transport = %self.transport.describe(),
                        "reader stopping on transport error"
                    );
                    break Err(err.into());
                }
            }
        };

        self.apply_controls();
        if let Some(sink) = self.dispatcher.detach_sink() {
            close_sink(sink);
        }
        debug!(stats = ?self.stats.snapshot(), "reader stopped");
        outcome
    }

    fn process(&mut self) {
        for frame in self.reassembler.drain() {
            // Violations are logged and counted by the dispatcher.
            let _ = self.dispatcher.dispatch(&frame);
        }
        self.stats.publish_framing(self.reassembler.stats());
    }

    fn apply_controls(&mut self) {
        while let Ok(request) = self.control.try_recv() {
            match request {
                ReaderControl::Attach { sink, ticket, .. } if !ticket.take() => {
                    debug!(sink = %sink.describe(), "attach abandoned");
                    close_sink(sink);
                }
                ReaderControl::Detach { ticket, .. } if !ticket.take() => {
                    debug!("detach abandoned");
                }
                ReaderControl::Attach { sink, reply, .. } => {
                    debug!(sink = %sink.describe(), "recording started");
                    if let Some(previous) = self.dispatcher.attach_sink(sink) {
                        close_sink(previous);
                    }
                    let _ = reply.send(());
                }
                ReaderControl::Detach { reply, .. } => {
                    let result = self.dispatcher.detach_sink().map(|sink| {
                        debug!(sink = %sink.describe(), "recording stopped");
                        sink.close()
                    });
                    let _ = reply.send(result);
                }
            }
        }
    }
}

fn close_sink(sink: Box<dyn RecordingSink>) {
    let name = sink.describe();
    match sink.close() {
        Ok(()) => debug!(sink = %name, "recording closed"),
        Err(err) => warn!(%err, sink = %name, "failed to close recording"),
    }
}
