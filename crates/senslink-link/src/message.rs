//! Payload layouts of the frames a device sends.

use senslink_frame::FrameType;
use serde::Serialize;

use crate::error::ProtocolViolation;

/// Volts per ADC count.
pub const VOLTS_PER_COUNT: f64 = 0.000_031_25;

/// Samples below this voltage mean the sensor is pressed.
pub const PRESS_THRESHOLD_VOLTS: f64 = 0.60;

/// STATUS payload: state (1) + active sensor count (1).
pub const STATUS_PAYLOAD_LEN: usize = 2;
/// ACK payload: command id (1) + sequence (1) + result code (1).
pub const ACK_PAYLOAD_LEN: usize = 3;
/// DATA payload: timestamp ms (4, LE) + raw ADC value (2, LE).
pub const DATA_PAYLOAD_LEN: usize = 6;

/// Device state reported in STATUS frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    Idle,
    Measuring,
    Calibrating,
    Error,
    /// A state code this host does not know, surfaced as-is.
    Unknown(u8),
}

impl DeviceState {
    pub fn from_u8(code: u8) -> Self {
        match code {
            0 => Self::Idle,
            1 => Self::Measuring,
            2 => Self::Calibrating,
            3 => Self::Error,
            other => Self::Unknown(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Measuring => 1,
            Self::Calibrating => 2,
            Self::Error => 3,
            Self::Unknown(code) => code,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Measuring => "MEASURING",
            Self::Calibrating => "CALIBRATING",
            Self::Error => "ERROR",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

/// Parsed STATUS frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub state: DeviceState,
    pub active_sensors: u8,
}

impl StatusReport {
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolViolation> {
        let [state, active_sensors] = fixed::<STATUS_PAYLOAD_LEN>(FrameType::Status, payload)?;
        Ok(Self {
            state: DeviceState::from_u8(state),
            active_sensors,
        })
    }
}

/// Parsed ACK frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ack {
    /// Command being acknowledged.
    pub cmd_id: u8,
    /// Sequence number echoed by the device.
    pub seq: u8,
    /// 0 on success, otherwise a device failure code.
    pub result: u8,
}

impl Ack {
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolViolation> {
        let [cmd_id, seq, result] = fixed::<ACK_PAYLOAD_LEN>(FrameType::Ack, payload)?;
        Ok(Self {
            cmd_id,
            seq,
            result,
        })
    }

    pub fn is_success(&self) -> bool {
        self.result == 0
    }

    /// Whether this ACK answers a command with id `cmd_id`.
    ///
    /// Matching is by command id only. The device echoes the sequence
    /// number but the protocol gives no guarantee about it, so two
    /// outstanding commands with the same id cannot be told apart.
    pub fn acknowledges(&self, cmd_id: u8) -> bool {
        self.cmd_id == cmd_id
    }
}

/// Sensor contact derived from a sample voltage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Contact {
    Pressed,
    Released,
}

impl Contact {
    /// Pressed strictly below the threshold; the threshold itself is released.
    pub fn classify(voltage: f64) -> Self {
        if voltage < PRESS_THRESHOLD_VOLTS {
            Self::Pressed
        } else {
            Self::Released
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pressed => "pressed",
            Self::Released => "released",
        }
    }
}

/// Parsed DATA frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    /// Device clock at sampling time.
    pub timestamp_ms: u32,
    pub adc_raw: u16,
    pub voltage: f64,
    pub contact: Contact,
}

impl Sample {
    pub fn from_adc(timestamp_ms: u32, adc_raw: u16) -> Self {
        let voltage = f64::from(adc_raw) * VOLTS_PER_COUNT;
        Self {
            timestamp_ms,
            adc_raw,
            voltage,
            contact: Contact::classify(voltage),
        }
    }

    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolViolation> {
        let [t0, t1, t2, t3, a0, a1] = fixed::<DATA_PAYLOAD_LEN>(FrameType::Data, payload)?;
        Ok(Self::from_adc(
            u32::from_le_bytes([t0, t1, t2, t3]),
            u16::from_le_bytes([a0, a1]),
        ))
    }
}

/// Something the reader thread observed on the link.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkEvent {
    Status(StatusReport),
    Ack(Ack),
    Sample {
        sample: Sample,
        /// Whether the sample was appended to the active recording.
        recorded: bool,
    },
}

fn fixed<const N: usize>(
    frame_type: FrameType,
    payload: &[u8],
) -> Result<[u8; N], ProtocolViolation> {
    <[u8; N]>::try_from(payload).map_err(|_| ProtocolViolation::PayloadLength {
        frame_type,
        expected: N,
        actual: payload.len(),
    })
}
