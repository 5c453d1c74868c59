use std::time::Duration;

use senslink_frame::ChecksumPolicy;

/// Default pause between polls when the transport has nothing to read.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Default size of a single transport read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4 * 1024;

/// Default time to wait for the reader thread to acknowledge a control
/// request (attach or detach a recording sink).
pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_secs(2);

/// Link behavior settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Sleep between reads when no data is available.
    pub poll_interval: Duration,
    /// Maximum bytes taken from the transport per read.
    pub read_chunk_size: usize,
    /// Treatment of inbound frames with a bad checksum.
    pub checksum: ChecksumPolicy,
    /// Wait limit for reader thread acknowledgements.
    pub control_timeout: Duration,
    /// Start with the debug tap enabled.
    pub debug: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            checksum: ChecksumPolicy::Strict,
            control_timeout: DEFAULT_CONTROL_TIMEOUT,
            debug: false,
        }
    }
}
