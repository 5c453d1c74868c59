use std::io::{ErrorKind, Write};

use crate::error::{Result, TransportError};

/// A byte-oriented link to the device.
///
/// Reads never block for long: implementations either report what is
/// already buffered or wait at most a short driver timeout, returning `0`
/// when nothing arrived. This lets the reader loop poll its stop flag.
pub trait Transport: Send + Sized {
    /// Read the bytes that are currently available into `buf`.
    ///
    /// Returns `Ok(0)` when no data is pending. Errors are fatal to the
    /// reader loop.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write the whole buffer and flush it.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Open a second handle on the same connection.
    ///
    /// The link keeps one handle for writes and gives the clone to its
    /// reader thread.
    fn try_clone(&self) -> Result<Self>;

    /// Close the connection.
    fn close(self) -> Result<()>;

    /// Human-readable name for logs and diagnostics.
    fn describe(&self) -> String;
}

/// Write every byte to `out` and flush, retrying interrupted and
/// would-block writes.
pub(crate) fn write_fully<W: Write + ?Sized>(out: &mut W, bytes: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match out.write(&bytes[offset..]) {
            Ok(0) => return Err(TransportError::Closed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }

    loop {
        match out.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
}

/// True for read errors that only mean "nothing arrived before the timeout".
pub(crate) fn is_idle(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}
