//! Debug tap: hex dumps of raw frames on a channel of their own.

use std::sync::mpsc::Sender;

use senslink_frame::{hex_dump, Direction, Frame};

/// Receiver of hex-dump lines.
///
/// Emission happens on the reader thread (inbound) and on the command
/// issuer's thread (outbound), so implementations must be cheap and must
/// not block.
pub trait DebugTap: Send + Sync {
    fn emit(&self, line: String);
}

impl DebugTap for Sender<String> {
    fn emit(&self, line: String) {
        // A dropped receiver just means nobody is watching.
        let _ = self.send(line);
    }
}

/// Tap that writes lines as `tracing` events on the `senslink::wire` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTap;

impl DebugTap for TracingTap {
    fn emit(&self, line: String) {
        tracing::info!(target: "senslink::wire", "{line}");
    }
}

pub(crate) fn emit_frame(tap: &dyn DebugTap, direction: Direction, frame: &Frame) {
    tap.emit(hex_dump(direction, frame.frame_type(), &frame.to_wire()));
}
