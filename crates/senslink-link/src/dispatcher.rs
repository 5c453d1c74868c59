use std::sync::mpsc::Sender;
use std::sync::Arc;

use senslink_frame::{Direction, Frame, FrameType};
use tracing::warn;

use crate::error::ProtocolViolation;
use crate::message::{Ack, LinkEvent, Sample, StatusReport};
use crate::recording::{RecordingSink, SampleRecord};
use crate::session::{LinkStats, SessionFlags};
use crate::tap::{emit_frame, DebugTap};

/// Consumer of link events, called on the reader thread.
///
/// Called synchronously between frames, so a slow handler delays decoding
/// of the frames behind it.
pub trait EventHandler: Send {
    fn handle(&mut self, event: LinkEvent);
}

impl EventHandler for Sender<LinkEvent> {
    fn handle(&mut self, event: LinkEvent) {
        let _ = self.send(event);
    }
}

impl EventHandler for Vec<LinkEvent> {
    fn handle(&mut self, event: LinkEvent) {
        self.push(event);
    }
}

/// Routes decoded frames by type.
///
/// Owns the recording sink while recording is on; the sink arrives and
/// leaves through [`attach_sink`](Self::attach_sink) and
/// [`detach_sink`](Self::detach_sink), never by shared reference.
pub struct Dispatcher<H> {
    handler: H,
    flags: Arc<SessionFlags>,
    stats: Arc<LinkStats>,
    tap: Option<Arc<dyn DebugTap>>,
    sink: Option<Box<dyn RecordingSink>>,
}

impl<H: EventHandler> Dispatcher<H> {
    pub fn new(handler: H, flags: Arc<SessionFlags>, stats: Arc<LinkStats>) -> Self {
        Self {
            handler,
            flags,
            stats,
            tap: None,
            sink: None,
        }
    }

    /// Send hex dumps of inbound frames to `tap` while the debug flag is set.
    pub fn with_tap(mut self, tap: Arc<dyn DebugTap>) -> Self {
        self.tap = Some(tap);
        self
    }

    /// Handle one frame.
    ///
    /// Frames that make no sense to the host are counted, logged and
    /// returned as a [`ProtocolViolation`]; nothing else happens to them.
    pub fn dispatch(&mut self, frame: &Frame) -> Result<(), ProtocolViolation> {
        if self.flags.is_debug() {
            if let Some(tap) = &self.tap {
                emit_frame(tap.as_ref(), Direction::Rx, frame);
            }
        }

        let result = self.route(frame);
        if let Err(violation) = &result {
            self.stats.protocol_violation();
            warn!(%violation, "dropping frame");
        }
        result
    }

    fn route(&mut self, frame: &Frame) -> Result<(), ProtocolViolation> {
        let payload = frame.payload().as_ref();
        let event = match frame.frame_type() {
            FrameType::Ack => LinkEvent::Ack(Ack::parse(payload)?),
            FrameType::Status => LinkEvent::Status(StatusReport::parse(payload)?),
            FrameType::Data => {
                let sample = Sample::parse(payload)?;
                let recorded = self.record(&sample);
                LinkEvent::Sample { sample, recorded }
            }
            FrameType::Command => {
                return Err(ProtocolViolation::UnexpectedType(FrameType::Command));
            }
        };
        self.handler.handle(event);
        Ok(())
    }

    fn record(&mut self, sample: &Sample) -> bool {
        let Some(sink) = self.sink.as_mut() else {
            return false;
        };
        match sink.append(&SampleRecord::now(sample)) {
            Ok(()) => {
                self.stats.sample_recorded();
                true
            }
            Err(err) => {
                self.stats.sink_error();
                warn!(%err, sink = %sink.describe(), "failed to record sample");
                false
            }
        }
    }

    /// Start appending samples to `sink`. Returns the sink it replaces.
    pub fn attach_sink(
        &mut self,
        sink: Box<dyn RecordingSink>,
    ) -> Option<Box<dyn RecordingSink>> {
        let previous = self.sink.replace(sink);
        self.flags.set_recording(true);
        previous
    }

    /// Stop recording and hand the sink back for closing.
    pub fn detach_sink(&mut self) -> Option<Box<dyn RecordingSink>> {
        self.flags.set_recording(false);
        self.sink.take()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

impl<H> std::fmt::Debug for Dispatcher<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("recording", &self.sink.is_some())
            .field("tap", &self.tap.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::error::SinkError;
    use crate::message::{Contact, DeviceState};
    use crate::recording::MemorySink;

    fn dispatcher() -> Dispatcher<Vec<LinkEvent>> {
        Dispatcher::new(
            Vec::new(),
            Arc::new(SessionFlags::default()),
            Arc::new(LinkStats::default()),
        )
    }

    fn data_frame(timestamp_ms: u32, adc_raw: u16) -> Frame {
        let mut payload = timestamp_ms.to_le_bytes().to_vec();
        payload.extend_from_slice(&adc_raw.to_le_bytes());
        Frame::new(FrameType::Data, payload).unwrap()
    }

    struct FailingSink;

    impl RecordingSink for FailingSink {
        fn append(&mut self, _record: &SampleRecord) -> Result<(), SinkError> {
            Err(SinkError::Write(std::io::Error::other("disk full")))
        }

        fn close(self: Box<Self>) -> Result<(), SinkError> {
            Ok(())
        }

        fn describe(&self) -> String {
            "failing".to_string()
        }
    }

    #[test]
    fn status_frame_becomes_status_event() {
        let mut d = dispatcher();
        d.dispatch(&Frame::new(FrameType::Status, vec![1, 2]).unwrap())
            .unwrap();
        assert_eq!(
            d.handler().as_slice(),
            &[LinkEvent::Status(StatusReport {
                state: DeviceState::Measuring,
                active_sensors: 2,
            })]
        );
    }

    #[test]
    fn ack_frame_becomes_ack_event() {
        let mut d = dispatcher();
        d.dispatch(&Frame::new(FrameType::Ack, vec![3, 4, 1]).unwrap())
            .unwrap();
        match &d.handler()[0] {
            LinkEvent::Ack(ack) => {
                assert!(ack.acknowledges(3));
                assert!(!ack.is_success());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn data_frame_classified() {
        let mut d = dispatcher();
        d.dispatch(&data_frame(16, 19199)).unwrap();
        match &d.handler()[0] {
            LinkEvent::Sample { sample, recorded } => {
                assert_eq!(sample.timestamp_ms, 16);
                assert_eq!(sample.contact, Contact::Pressed);
                assert!(!recorded);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn command_frame_is_dropped() {
        let mut d = dispatcher();
        let err = d
            .dispatch(&Frame::new(FrameType::Command, vec![1, 1]).unwrap())
            .unwrap_err();
        assert_eq!(err, ProtocolViolation::UnexpectedType(FrameType::Command));
        assert!(d.handler().is_empty());
        assert_eq!(d.stats.snapshot().protocol_violations, 1);
    }

    #[test]
    fn malformed_payload_is_dropped() {
        let mut d = dispatcher();
        assert!(d
            .dispatch(&Frame::new(FrameType::Ack, vec![1]).unwrap())
            .is_err());
        assert!(d.handler().is_empty());
    }

    #[test]
    fn recording_gated_by_attached_sink() {
        let mut d = dispatcher();
        let sink = MemorySink::new();

        assert!(d.attach_sink(Box::new(sink.clone())).is_none());
        assert!(d.flags.is_recording());
        for ts in 0..3 {
            d.dispatch(&data_frame(ts, 1000)).unwrap();
        }
        assert_eq!(sink.len(), 3);

        let detached = d.detach_sink().unwrap();
        detached.close().unwrap();
        assert!(!d.flags.is_recording());
        for ts in 3..6 {
            d.dispatch(&data_frame(ts, 1000)).unwrap();
        }
        assert_eq!(sink.len(), 3);
        assert_eq!(d.handler().len(), 6);
        assert_eq!(d.stats.snapshot().samples_recorded, 3);
    }

    #[test]
    fn sink_failure_does_not_stop_dispatch() {
        let mut d = dispatcher();
        d.attach_sink(Box::new(FailingSink));
        d.dispatch(&data_frame(1, 1)).unwrap();
        d.dispatch(&data_frame(2, 1)).unwrap();

        assert_eq!(d.handler().len(), 2);
        assert!(matches!(
            d.handler()[0],
            LinkEvent::Sample {
                recorded: false,
                ..
            }
        ));
        assert_eq!(d.stats.snapshot().sink_errors, 2);
    }

    #[test]
    fn tap_only_when_debug_enabled() {
        let (tx, rx) = mpsc::channel::<String>();
        let flags = Arc::new(SessionFlags::default());
        let mut d = Dispatcher::new(Vec::new(), flags.clone(), Arc::new(LinkStats::default()))
            .with_tap(Arc::new(tx));

        let frame = Frame::new(FrameType::Status, vec![0, 0]).unwrap();
        d.dispatch(&frame).unwrap();
        assert!(rx.try_recv().is_err());

        flags.set_debug(true);
        d.dispatch(&frame).unwrap();
        assert!(rx.try_recv().unwrap().starts_with("[RX STATUS]"));
        assert_eq!(d.handler().len(), 2);
    }
}
