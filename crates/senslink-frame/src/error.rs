/// Errors that can occur while encoding or decoding frames.
///
/// Decoding never fails hard: these values travel inside
/// [`Decoded::Invalid`](crate::Decoded::Invalid) and tell the reassembler
/// what it dropped. Only [`FramingError::PayloadTooLarge`] is returned as an
/// `Err`, by the encoder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    /// No sync marker anywhere in the buffer.
    #[error("no sync marker in {len} buffered bytes")]
    NoSync { len: usize },

    /// Bytes before the first sync marker.
    #[error("{len} bytes of noise before sync marker")]
    LeadingNoise { len: usize },

    /// The trailing checksum does not match the frame contents.
    #[error("checksum mismatch (frame carries 0x{received:04X}, computed 0x{computed:04X})")]
    ChecksumMismatch { received: u16, computed: u16 },

    /// A well-formed frame with a type tag this host does not know.
    #[error("unknown frame type 0x{0:02X}")]
    UnknownType(u8),

    /// The payload does not fit the 16-bit length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FramingError>;
