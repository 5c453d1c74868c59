/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the named port or address.
    #[error("failed to open {target}: {source}")]
    Open {
        target: String,
        source: std::io::Error,
    },

    /// The serial driver reported an error.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// An I/O error occurred on the transport.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote end closed the connection.
    #[error("transport closed by peer")]
    Closed,
}

impl TransportError {
    /// The underlying I/O error kind, when there is one.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            Self::Open { source, .. } | Self::Io(source) => Some(source.kind()),
            Self::Serial(err) => match err.kind() {
                serialport::ErrorKind::Io(kind) => Some(kind),
                serialport::ErrorKind::NoDevice => Some(std::io::ErrorKind::NotFound),
                _ => None,
            },
            Self::Closed => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
