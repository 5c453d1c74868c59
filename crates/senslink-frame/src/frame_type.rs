//! Frame type tags.

use serde::Serialize;

/// The type tag carried in byte 3 of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum FrameType {
    /// Device state report (device → host).
    Status = 0x01,
    /// Measurement sample (device → host).
    Data = 0x02,
    /// Command (host → device).
    Command = 0x03,
    /// Command acknowledgement (device → host).
    Ack = 0x04,
}

impl FrameType {
    /// Wire value of this tag.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Upper-case name used in logs and hex dumps.
    pub fn name(self) -> &'static str {
        match self {
            Self::Status => "STATUS",
            Self::Data => "DATA",
            Self::Command => "COMMAND",
            Self::Ack => "ACK",
        }
    }
}

impl TryFrom<u8> for FrameType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        match value {
            0x01 => Ok(Self::Status),
            0x02 => Ok(Self::Data),
            0x03 => Ok(Self::Command),
            0x04 => Ok(Self::Ack),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for FrameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
