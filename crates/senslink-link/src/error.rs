use std::path::PathBuf;

use senslink_frame::FrameType;

/// Errors returned by link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error. Fatal to the reader thread.
    #[error("transport error: {0}")]
    Transport(#[from] senslink_transport::TransportError),

    /// Frame encoding error.
    #[error("frame error: {0}")]
    Frame(#[from] senslink_frame::FramingError),

    /// Recording sink error.
    #[error("recording error: {0}")]
    Sink(#[from] SinkError),

    /// The reader thread has exited; the link can no longer receive.
    #[error("reader thread stopped")]
    ReaderStopped,

    /// The reader thread did not answer a control request in time.
    #[error("reader did not respond within {0:?}")]
    Timeout(std::time::Duration),

    /// The reader thread could not be started.
    #[error("failed to spawn reader thread: {0}")]
    Spawn(std::io::Error),
}

/// Errors raised by a recording sink.
///
/// These never propagate into the reader loop: appends that fail are logged
/// and counted, and the sample is dropped.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The recording file could not be created.
    #[error("failed to create {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A record could not be written.
    #[error("failed to write record: {0}")]
    Write(std::io::Error),

    /// Buffered records could not be flushed on close.
    #[error("failed to flush recording: {0}")]
    Flush(std::io::Error),
}

/// A frame that decoded cleanly but makes no sense to the host.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    /// A frame type the device never sends.
    #[error("unexpected {0} frame from device")]
    UnexpectedType(FrameType),

    /// The payload length does not match the layout for its type.
    #[error("{frame_type} payload is {actual} bytes, expected {expected}")]
    PayloadLength {
        frame_type: FrameType,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, LinkError>;
