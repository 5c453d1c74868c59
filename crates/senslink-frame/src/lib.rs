//! CRC16-checked framing for the senslink sensor protocol.
//!
//! Every frame on the wire is:
//! - a 2-byte sync marker (`A5 5A`)
//! - a 1-byte protocol version and a 1-byte type tag
//! - a 2-byte little-endian payload length and the payload
//! - a 2-byte little-endian CRC-16/CCITT-FALSE over version..payload
//!
//! [`decode_frame`] is a pure function over a byte slice. [`Reassembler`]
//! wraps it for streams: it accepts arbitrary read chunks, drops line noise
//! and corrupt frames, and yields the valid frames in arrival order.

pub mod codec;
pub mod crc;
pub mod dump;
pub mod error;
pub mod frame_type;
pub mod reassembler;

pub use codec::{
    decode_frame, encode_frame, ChecksumPolicy, Decoded, Frame, CRC_SIZE, HEADER_SIZE,
    MAX_FRAME_SIZE, MAX_PAYLOAD, PROTOCOL_VERSION, SYNC,
};
pub use crc::{crc16, crc16_update};
pub use dump::{hex_dump, Direction};
pub use error::{FramingError, Result};
pub use frame_type::FrameType;
pub use reassembler::{Drain, Reassembler, ReassemblerStats};
