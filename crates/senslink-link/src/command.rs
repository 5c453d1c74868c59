use bytes::{BufMut, Bytes, BytesMut};
use senslink_frame::{encode_frame, FrameType};

use crate::error::Result;

/// Commands understood by the sensor firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Ask for a STATUS frame.
    GetStatus,
    /// Start streaming DATA frames.
    StartMeasure,
    /// Stop streaming DATA frames.
    StopMeasure,
}

impl Command {
    pub const GET_STATUS: u8 = 0x01;
    pub const START_MEASURE: u8 = 0x02;
    pub const STOP_MEASURE: u8 = 0x03;

    /// Wire command id.
    pub fn id(self) -> u8 {
        match self {
            Self::GetStatus => Self::GET_STATUS,
            Self::StartMeasure => Self::START_MEASURE,
            Self::StopMeasure => Self::STOP_MEASURE,
        }
    }

    /// Look up a known command by id.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            Self::GET_STATUS => Some(Self::GetStatus),
            Self::START_MEASURE => Some(Self::StartMeasure),
            Self::STOP_MEASURE => Some(Self::StopMeasure),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::GetStatus => "get-status",
            Self::StartMeasure => "start",
            Self::StopMeasure => "stop",
        }
    }
}

/// Builds COMMAND frames with a wrapping sequence number.
///
/// Payload layout: `cmd_id (1) | seq (1) | args`. The sequence number is
/// incremented before use, so the first command carries 1. Not shared: the
/// owner serializes command issue.
#[derive(Debug, Default)]
pub struct CommandEncoder {
    seq: u8,
    buf: BytesMut,
}

impl CommandEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number of the most recent command (0 before the first).
    pub fn sequence(&self) -> u8 {
        self.seq
    }

    /// Encode the next command. Returns the sequence number used and the
    /// complete wire frame.
    ///
    /// The counter only advances when encoding succeeds.
    pub fn encode(&mut self, cmd_id: u8, args: &[u8]) -> Result<(u8, Bytes)> {
        let seq = self.seq.wrapping_add(1);

        let mut payload = Vec::with_capacity(2 + args.len());
        payload.put_u8(cmd_id);
        payload.put_u8(seq);
        payload.put_slice(args);

        self.buf.clear();
        encode_frame(FrameType::Command, &payload, &mut self.buf)?;
        self.seq = seq;
        Ok((seq, self.buf.split().freeze()))
    }
}
