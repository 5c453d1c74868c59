use bytes::{Buf, BytesMut};
use tracing::{debug, trace, warn};

use crate::codec::{decode_frame, ChecksumPolicy, Decoded, Frame, MAX_FRAME_SIZE};
use crate::error::FramingError;

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// Counters describing what the reassembler has seen so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblerStats {
    /// Frames yielded.
    pub frames: u64,
    /// Bytes dropped as noise or as parts of rejected frames.
    pub discarded_bytes: u64,
    /// Checksum mismatches (rejected, or accepted under the lenient policy).
    pub checksum_failures: u64,
    /// Well-formed frames dropped for an unknown type tag.
    pub unknown_types: u64,
}

/// Turns an arbitrarily chunked byte stream into frames.
///
/// Bytes go in through [`feed`](Self::feed); complete frames come out of
/// [`drain`](Self::drain) in arrival order. Noise and corrupt frames are
/// dropped and decoding resumes at the next sync marker.
///
/// Once the buffer passes [`MAX_FRAME_SIZE`](crate::MAX_FRAME_SIZE),
/// `feed` drops leading bytes that cannot start a frame. An undrained
/// buffer therefore only grows past that size behind a complete frame
/// waiting for [`drain`](Self::drain).
#[derive(Debug)]
pub struct Reassembler {
    buf: BytesMut,
    policy: ChecksumPolicy,
    stats: ReassemblerStats,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    /// Create a reassembler that rejects frames with bad checksums.
    pub fn new() -> Self {
        Self::with_policy(ChecksumPolicy::Strict)
    }

    /// Create a reassembler with an explicit checksum policy.
    pub fn with_policy(policy: ChecksumPolicy) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            policy,
            stats: ReassemblerStats::default(),
        }
    }

    /// Append bytes read from the transport.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() > MAX_FRAME_SIZE {
            self.shed_garbage();
        }
    }

    /// Yield every frame that is complete in the buffer.
    ///
    /// The iterator stops at the first incomplete frame and keeps it for
    /// the next [`feed`](Self::feed). Frames not pulled from the iterator
    /// stay buffered.
    pub fn drain(&mut self) -> Drain<'_> {
        Drain { inner: self }
    }

    /// Number of bytes waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Counters since construction.
    pub fn stats(&self) -> ReassemblerStats {
        self.stats
    }

    /// Checksum policy in effect.
    pub fn policy(&self) -> ChecksumPolicy {
        self.policy
    }

    /// Drop all buffered bytes.
    pub fn clear(&mut self) {
        self.stats.discarded_bytes += self.buf.len() as u64;
        self.buf.clear();
    }

    fn next_frame(&mut self) -> Option<Frame> {
        loop {
            match decode_frame(&self.buf, self.policy) {
                Decoded::NeedMoreData => return None,
                Decoded::Invalid { discard, error } => {
                    self.record_discard(discard, &error);
                    self.buf.advance(discard);
                }
                Decoded::Frame { frame, consumed } => {
                    self.buf.advance(consumed);
                    if !frame.checksum_valid() {
                        self.stats.checksum_failures += 1;
                        warn!(
                            frame_type = %frame.frame_type(),
                            received = frame.checksum(),
                            computed = frame.computed_checksum(),
                            "accepting frame with bad checksum"
                        );
                    }
                    self.stats.frames += 1;
                    return Some(frame);
                }
            }
        }
    }

    /// Drop invalid regions at the front; stop at a frame or a partial one.
    fn shed_garbage(&mut self) {
        while let Decoded::Invalid { discard, error } = decode_frame(&self.buf, self.policy) {
            self.record_discard(discard, &error);
            self.buf.advance(discard);
        }
    }

    fn record_discard(&mut self, discard: usize, error: &FramingError) {
        self.stats.discarded_bytes += discard as u64;
        match error {
            FramingError::ChecksumMismatch { .. } => {
                self.stats.checksum_failures += 1;
                debug!(%error, "dropping corrupt frame");
            }
            FramingError::UnknownType(_) => {
                self.stats.unknown_types += 1;
                debug!(%error, discarded = discard, "dropping frame");
            }
            _ => trace!(%error, discarded = discard, "resynchronizing"),
        }
    }
}

/// Lazy sequence of the frames currently complete in a [`Reassembler`].
#[derive(Debug)]
pub struct Drain<'a> {
    inner: &'a mut Reassembler,
}

impl Iterator for Drain<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.inner.next_frame()
    }
}
