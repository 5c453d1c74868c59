//! Hex rendering of raw frames for the debug tap.

use std::fmt::Write;

use crate::frame_type::FrameType;

/// Which way a frame travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Device → host.
    Rx,
    /// Host → device.
    Tx,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Self::Rx => "RX",
            Self::Tx => "TX",
        }
    }
}

/// Render wire bytes as `[RX DATA] A5 5A 01 02 ...`.
pub fn hex_dump(direction: Direction, frame_type: FrameType, wire: &[u8]) -> String {
    let mut out = String::with_capacity(16 + wire.len() * 3);
    let _ = write!(out, "[{} {}]", direction.label(), frame_type.name());
    for byte in wire {
        let _ = write!(out, " {byte:02X}");
    }
    out
}
