use bytes::{BufMut, Bytes, BytesMut};

use crate::crc::{crc16, crc16_update};
use crate::error::{FramingError, Result};
use crate::frame_type::FrameType;

/// Sync marker opening every frame.
pub const SYNC: [u8; 2] = [0xA5, 0x5A];

/// Protocol version written into every outbound frame.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Frame header: sync (2) + version (1) + type (1) + length (2) = 6 bytes.
pub const HEADER_SIZE: usize = 6;

/// Trailing checksum size.
pub const CRC_SIZE: usize = 2;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// Largest possible frame on the wire.
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD + CRC_SIZE;

/// What to do with a frame whose checksum does not match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChecksumPolicy {
    /// Reject the frame and resynchronize.
    #[default]
    Strict,
    /// Accept the frame anyway. For noisy lines where a wrong sample is
    /// preferable to a missing one; the reassembler still counts it.
    Lenient,
}

/// A complete protocol frame.
///
/// Built either from a type and payload (outbound) or by the decoder from
/// wire bytes (inbound). Fields are read-only once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    version: u8,
    frame_type: FrameType,
    payload: Bytes,
    checksum: u16,
}

impl Frame {
    /// Build an outbound frame at the current protocol version.
    pub fn new(frame_type: FrameType, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        let len = payload_len(&payload)?;
        let checksum = frame_checksum(PROTOCOL_VERSION, frame_type.as_u8(), len, &payload);
        Ok(Self {
            version: PROTOCOL_VERSION,
            frame_type,
            payload,
            checksum,
        })
    }

    /// Protocol version the frame was written with.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Type tag.
    pub fn frame_type(&self) -> FrameType {
        self.frame_type
    }

    /// Payload bytes.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Checksum carried by the frame (as received, for decoded frames).
    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    /// Whether the carried checksum matches the contents.
    pub fn checksum_valid(&self) -> bool {
        self.checksum == self.computed_checksum()
    }

    /// Checksum recomputed from version, type, length and payload.
    pub fn computed_checksum(&self) -> u16 {
        // Payload length is validated on every construction path.
        let len = self.payload.len() as u16;
        frame_checksum(self.version, self.frame_type.as_u8(), len, &self.payload)
    }

    /// Total size on the wire.
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len() + CRC_SIZE
    }

    /// The exact wire bytes of this frame, including its carried checksum.
    pub fn to_wire(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        put_frame(
            &mut dst,
            self.version,
            self.frame_type.as_u8(),
            &self.payload,
            self.checksum,
        );
        dst.freeze()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────────┬─────────┬──────┬──────────┬───────────┬───────────┐
/// │ Sync (2B) │ Version │ Type │ Length   │ Payload   │ CRC16     │
/// │ 0xA5 0x5A │ (1B)    │ (1B) │ (2B LE)  │ (Length)  │ (2B LE)   │
/// └───────────┴─────────┴──────┴──────────┴───────────┴───────────┘
/// ```
/// The CRC covers everything between the sync marker and the CRC itself.
pub fn encode_frame(frame_type: FrameType, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = payload_len(payload)?;
    let checksum = frame_checksum(PROTOCOL_VERSION, frame_type.as_u8(), len, payload);
    put_frame(dst, PROTOCOL_VERSION, frame_type.as_u8(), payload, checksum);
    Ok(())
}

/// Outcome of one decode attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A frame starts at offset 0 and occupies `consumed` bytes.
    Frame { frame: Frame, consumed: usize },
    /// The buffer holds (the start of) a frame that is not complete yet.
    /// Nothing should be discarded.
    NeedMoreData,
    /// The first `discard` bytes cannot start a valid frame and must be
    /// dropped before trying again.
    Invalid { discard: usize, error: FramingError },
}

/// Decode the frame at the start of `src`.
///
/// Stateless: `src` is never modified and the caller applies the returned
/// action. Leading noise is reported as [`Decoded::Invalid`] so that every
/// successful decode starts exactly at a sync marker.
pub fn decode_frame(src: &[u8], policy: ChecksumPolicy) -> Decoded {
    if src.len() < HEADER_SIZE {
        return Decoded::NeedMoreData;
    }

    let Some(start) = src.windows(SYNC.len()).position(|w| w == SYNC) else {
        // Keep a trailing first marker byte, its partner may be in the next read.
        let discard = if src.last() == Some(&SYNC[0]) {
            src.len() - 1
        } else {
            src.len()
        };
        return Decoded::Invalid {
            discard,
            error: FramingError::NoSync { len: src.len() },
        };
    };

    if start > 0 {
        return Decoded::Invalid {
            discard: start,
            error: FramingError::LeadingNoise { len: start },
        };
    }

    let version = src[2];
    let tag = src[3];
    let len = u16::from_le_bytes([src[4], src[5]]);
    let total = HEADER_SIZE + usize::from(len) + CRC_SIZE;
    if src.len() < total {
        return Decoded::NeedMoreData;
    }

    let payload = &src[HEADER_SIZE..total - CRC_SIZE];
    let received = u16::from_le_bytes([src[total - 2], src[total - 1]]);
    let computed = frame_checksum(version, tag, len, payload);
    if received != computed && policy == ChecksumPolicy::Strict {
        // The marker may have been a coincidence; rescan from the next byte.
        return Decoded::Invalid {
            discard: 1,
            error: FramingError::ChecksumMismatch { received, computed },
        };
    }

    let Ok(frame_type) = FrameType::try_from(tag) else {
        return Decoded::Invalid {
            discard: total,
            error: FramingError::UnknownType(tag),
        };
    };

    Decoded::Frame {
        frame: Frame {
            version,
            frame_type,
            payload: Bytes::copy_from_slice(payload),
            checksum: received,
        },
        consumed: total,
    }
}

fn payload_len(payload: &[u8]) -> Result<u16> {
    u16::try_from(payload.len()).map_err(|_| FramingError::PayloadTooLarge {
        size: payload.len(),
        max: MAX_PAYLOAD,
    })
}

fn frame_checksum(version: u8, tag: u8, len: u16, payload: &[u8]) -> u16 {
    let [lo, hi] = len.to_le_bytes();
    crc16_update(crc16(&[version, tag, lo, hi]), payload)
}

fn put_frame(dst: &mut BytesMut, version: u8, tag: u8, payload: &[u8], checksum: u16) {
    dst.reserve(HEADER_SIZE + payload.len() + CRC_SIZE);
    dst.put_slice(&SYNC);
    dst.put_u8(version);
    dst.put_u8(tag);
    dst.put_u16_le(payload.len() as u16);
    dst.put_slice(payload);
    dst.put_u16_le(checksum);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(frame_type: FrameType, payload: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_frame(frame_type, payload, &mut buf).unwrap();
        buf
    }

    fn expect_frame(decoded: Decoded) -> (Frame, usize) {
        match decoded {
            Decoded::Frame { frame, consumed } => (frame, consumed),
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_layout() {
        let buf = encoded(FrameType::Status, &[0x01, 0x02]);
        let crc = crc16(&[0x01, 0x01, 0x02, 0x00, 0x01, 0x02]).to_le_bytes();
        assert_eq!(
            buf.as_ref(),
            &[0xA5, 0x5A, 0x01, 0x01, 0x02, 0x00, 0x01, 0x02, crc[0], crc[1]]
        );
    }

    #[test]
    fn test_encode_decode_roundtrip_all_types() {
        for frame_type in [
            FrameType::Status,
            FrameType::Data,
            FrameType::Command,
            FrameType::Ack,
        ] {
            let buf = encoded(frame_type, b"payload");
            let (frame, consumed) = expect_frame(decode_frame(&buf, ChecksumPolicy::Strict));
            assert_eq!(consumed, buf.len());
            assert_eq!(frame.frame_type(), frame_type);
            assert_eq!(frame.payload().as_ref(), b"payload");
            assert_eq!(frame.version(), PROTOCOL_VERSION);
            assert!(frame.checksum_valid());
        }
    }

    #[test]
    fn test_empty_payload() {
        let buf = encoded(FrameType::Ack, b"");
        assert_eq!(buf.len(), HEADER_SIZE + CRC_SIZE);
        let (frame, consumed) = expect_frame(decode_frame(&buf, ChecksumPolicy::Strict));
        assert_eq!(consumed, HEADER_SIZE + CRC_SIZE);
        assert!(frame.payload().is_empty());
    }

    #[test]
    fn test_maximum_payload() {
        let payload: Vec<u8> = (0..MAX_PAYLOAD).map(|i| (i % 251) as u8).collect();
        let buf = encoded(FrameType::Data, &payload);
        assert_eq!(buf.len(), MAX_FRAME_SIZE);
        let (frame, consumed) = expect_frame(decode_frame(&buf, ChecksumPolicy::Strict));
        assert_eq!(consumed, MAX_FRAME_SIZE);
        assert_eq!(frame.payload().as_ref(), payload.as_slice());
    }

    #[test]
    fn test_payload_too_large() {
        let payload = vec![0u8; MAX_PAYLOAD + 1];
        let mut buf = BytesMut::new();
        let err = encode_frame(FrameType::Data, &payload, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            FramingError::PayloadTooLarge { size, .. } if size == MAX_PAYLOAD + 1
        ));
        assert!(buf.is_empty());
        assert!(Frame::new(FrameType::Data, payload).is_err());
    }

    #[test]
    fn test_every_proper_prefix_needs_more_data() {
        let buf = encoded(FrameType::Data, &[0x10, 0, 0, 0, 0x40, 0x4B]);
        for cut in 0..buf.len() {
            assert_eq!(
                decode_frame(&buf[..cut], ChecksumPolicy::Strict),
                Decoded::NeedMoreData,
                "prefix of {cut} bytes"
            );
        }
    }

    #[test]
    fn test_no_sync_discards_everything() {
        let noise = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66];
        assert_eq!(
            decode_frame(&noise, ChecksumPolicy::Strict),
            Decoded::Invalid {
                discard: noise.len(),
                error: FramingError::NoSync { len: noise.len() },
            }
        );
    }

    #[test]
    fn test_no_sync_keeps_trailing_marker_byte() {
        let noise = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0xA5];
        match decode_frame(&noise, ChecksumPolicy::Strict) {
            Decoded::Invalid { discard, .. } => assert_eq!(discard, noise.len() - 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_leading_noise_reported() {
        let mut buf = BytesMut::from(&[0xFF, 0x00, 0x5A][..]);
        buf.extend_from_slice(&encoded(FrameType::Status, &[0, 1]));
        assert_eq!(
            decode_frame(&buf, ChecksumPolicy::Strict),
            Decoded::Invalid {
                discard: 3,
                error: FramingError::LeadingNoise { len: 3 },
            }
        );
        let (frame, _) = expect_frame(decode_frame(&buf[3..], ChecksumPolicy::Strict));
        assert_eq!(frame.payload().as_ref(), &[0, 1]);
    }

    #[test]
    fn test_checksum_mismatch_discards_one_byte() {
        let mut buf = encoded(FrameType::Status, &[0x01, 0x02]);
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;
        match decode_frame(&buf, ChecksumPolicy::Strict) {
            Decoded::Invalid {
                discard: 1,
                error: FramingError::ChecksumMismatch { .. },
            } => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_lenient_policy_accepts_bad_checksum() {
        let mut buf = encoded(FrameType::Status, &[0x01, 0x02]);
        buf[6] = 0x03;
        let (frame, consumed) = expect_frame(decode_frame(&buf, ChecksumPolicy::Lenient));
        assert_eq!(consumed, buf.len());
        assert_eq!(frame.payload().as_ref(), &[0x03, 0x02]);
        assert!(!frame.checksum_valid());
        assert_eq!(frame.to_wire().as_ref(), buf.as_ref());
    }

    #[test]
    fn test_single_bit_flips_are_rejected() {
        let clean = encoded(FrameType::Data, &[0x10, 0x00, 0x00, 0x00, 0x40, 0x4B]);
        for byte in 0..clean.len() {
            for bit in 0..8 {
                let mut corrupt = clean.clone();
                corrupt[byte] ^= 1 << bit;
                let decoded = decode_frame(&corrupt, ChecksumPolicy::Strict);

                // A flipped length field may announce more bytes than exist.
                let len = usize::from(u16::from_le_bytes([corrupt[4], corrupt[5]]));
                if (4..6).contains(&byte) && HEADER_SIZE + len + CRC_SIZE > clean.len() {
                    assert!(
                        matches!(decoded, Decoded::NeedMoreData),
                        "flip of bit {bit} in byte {byte}: {decoded:?}"
                    );
                } else {
                    assert!(
                        matches!(decoded, Decoded::Invalid { .. }),
                        "flip of bit {bit} in byte {byte}: {decoded:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_unknown_type_drops_whole_frame() {
        let mut buf = BytesMut::new();
        put_frame(&mut buf, PROTOCOL_VERSION, 0x7E, &[1, 2, 3], 0);
        let checksum = frame_checksum(PROTOCOL_VERSION, 0x7E, 3, &[1, 2, 3]);
        buf.truncate(buf.len() - CRC_SIZE);
        buf.put_u16_le(checksum);

        assert_eq!(
            decode_frame(&buf, ChecksumPolicy::Strict),
            Decoded::Invalid {
                discard: buf.len(),
                error: FramingError::UnknownType(0x7E),
            }
        );
    }

    #[test]
    fn test_foreign_version_is_carried_through() {
        let mut buf = BytesMut::new();
        let checksum = frame_checksum(0x02, FrameType::Ack.as_u8(), 3, &[1, 2, 0]);
        put_frame(&mut buf, 0x02, FrameType::Ack.as_u8(), &[1, 2, 0], checksum);

        let (frame, _) = expect_frame(decode_frame(&buf, ChecksumPolicy::Strict));
        assert_eq!(frame.version(), 0x02);
        assert!(frame.checksum_valid());
    }

    #[test]
    fn test_frame_to_wire_matches_encoder() {
        let frame = Frame::new(FrameType::Command, vec![0x02, 0x07]).unwrap();
        assert_eq!(frame.wire_size(), HEADER_SIZE + 2 + CRC_SIZE);
        assert_eq!(
            frame.to_wire().as_ref(),
            encoded(FrameType::Command, &[0x02, 0x07]).as_ref()
        );
    }

    #[test]
    fn test_trailing_bytes_not_consumed() {
        let mut buf = encoded(FrameType::Status, &[0, 3]);
        let frame_len = buf.len();
        buf.extend_from_slice(&[0xA5, 0x5A, 0x01]);
        let (_, consumed) = expect_frame(decode_frame(&buf, ChecksumPolicy::Strict));
        assert_eq!(consumed, frame_len);
    }
}
