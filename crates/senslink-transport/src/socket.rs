use std::io::Read;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{is_idle, write_fully, Transport};

/// Read timeout applied to sockets so reads return to the poll loop.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// A stream socket carrying the device byte stream.
///
/// Used with serial-to-network bridges (TCP) and for driving the link from
/// a simulated device (Unix stream pairs).
pub struct SocketTransport {
    inner: SocketInner,
}

enum SocketInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    Tcp(TcpStream),
}

impl SocketTransport {
    /// Wrap a connected Unix stream.
    #[cfg(unix)]
    pub fn unix(stream: std::os::unix::net::UnixStream) -> Result<Self> {
        stream.set_read_timeout(Some(DEFAULT_READ_TIMEOUT))?;
        Ok(Self {
            inner: SocketInner::Unix(stream),
        })
    }

    /// Wrap a connected TCP stream.
    pub fn tcp(stream: TcpStream) -> Result<Self> {
        stream.set_read_timeout(Some(DEFAULT_READ_TIMEOUT))?;
        stream.set_nodelay(true)?;
        Ok(Self {
            inner: SocketInner::Tcp(stream),
        })
    }

    /// Connect to a serial bridge listening at `addr`.
    pub fn connect_tcp(addr: &str, timeout: Duration) -> Result<Self> {
        let open_err = |source: std::io::Error| TransportError::Open {
            target: addr.to_string(),
            source,
        };
        let resolved = addr
            .to_socket_addrs()
            .map_err(open_err)?
            .next()
            .ok_or_else(|| {
                open_err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "address resolved to nothing",
                ))
            })?;
        let stream = TcpStream::connect_timeout(&resolved, timeout).map_err(open_err)?;
        debug!(%addr, "connected to serial bridge");
        Self::tcp(stream)
    }

    /// Override the read timeout (poll granularity).
    pub fn set_read_timeout(&self, timeout: Duration) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            SocketInner::Unix(stream) => stream.set_read_timeout(Some(timeout))?,
            SocketInner::Tcp(stream) => stream.set_read_timeout(Some(timeout))?,
        }
        Ok(())
    }

    fn read_raw(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            SocketInner::Unix(stream) => stream.read(buf),
            SocketInner::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Transport for SocketTransport {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.read_raw(buf) {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => Ok(n),
            Err(err) if is_idle(err.kind()) => Ok(0),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            SocketInner::Unix(stream) => write_fully(stream, bytes),
            SocketInner::Tcp(stream) => write_fully(stream, bytes),
        }
    }

    fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            #[cfg(unix)]
            SocketInner::Unix(stream) => SocketInner::Unix(stream.try_clone()?),
            SocketInner::Tcp(stream) => SocketInner::Tcp(stream.try_clone()?),
        };
        Ok(Self { inner })
    }

    fn close(self) -> Result<()> {
        let result = match &self.inner {
            #[cfg(unix)]
            SocketInner::Unix(stream) => stream.shutdown(Shutdown::Both),
            SocketInner::Tcp(stream) => stream.shutdown(Shutdown::Both),
        };
        match result {
            Ok(()) => Ok(()),
            // Peer already gone.
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn describe(&self) -> String {
        match &self.inner {
            #[cfg(unix)]
            SocketInner::Unix(_) => "unix-stream".to_string(),
            SocketInner::Tcp(stream) => match stream.peer_addr() {
                Ok(addr) => format!("tcp:{addr}"),
                Err(_) => "tcp".to_string(),
            },
        }
    }
}

impl std::fmt::Debug for SocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketTransport")
            .field("endpoint", &self.describe())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    #[cfg(unix)]
    fn read_available_returns_zero_when_idle() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut transport = SocketTransport::unix(left).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(transport.read_available(&mut buf).unwrap(), 0);
    }

    #[test]
    #[cfg(unix)]
    fn read_available_returns_pending_bytes() {
        let (left, mut right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut transport = SocketTransport::unix(left).unwrap();
        right.write_all(b"\xA5\x5A\x01").unwrap();

        let mut buf = [0u8; 16];
        let n = transport.read_available(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"\xA5\x5A\x01");
    }

    #[test]
    #[cfg(unix)]
    fn peer_hangup_is_closed() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut transport = SocketTransport::unix(left).unwrap();
        drop(right);

        let mut buf = [0u8; 16];
        let err = transport.read_available(&mut buf).unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    #[cfg(unix)]
    fn clone_shares_the_connection() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = SocketTransport::unix(left).unwrap();
        let mut reader_side = SocketTransport::unix(right).unwrap();
        let mut clone = writer.try_clone().unwrap();

        writer.write_all(b"one").unwrap();
        clone.write_all(b"two").unwrap();

        let mut got = Vec::new();
        let mut buf = [0u8; 16];
        while got.len() < 6 {
            let n = reader_side.read_available(&mut buf).unwrap();
            got.extend_from_slice(&buf[..n]);
        }
        assert_eq!(got, b"onetwo");
    }

    #[test]
    fn tcp_roundtrip() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"hello").unwrap();
        });

        let mut transport = SocketTransport::connect_tcp(&addr, Duration::from_secs(2)).unwrap();
        assert!(transport.describe().starts_with("tcp:"));
        server.join().unwrap();

        let mut got = Vec::new();
        let mut buf = [0u8; 16];
        while got.len() < 5 {
            let n = transport.read_available(&mut buf).unwrap();
            got.extend_from_slice(&buf[..n]);
        }
        assert_eq!(got, b"hello");
        transport.close().unwrap();
    }

    #[test]
    fn connect_tcp_refused_is_open_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = SocketTransport::connect_tcp(&addr, Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, TransportError::Open { .. }));
    }
}
