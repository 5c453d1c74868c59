//! Byte transports for the senslink sensor link.
//!
//! The link engine only needs a handful of operations from the wire: read
//! whatever bytes are currently available, write a complete buffer, hand a
//! second handle to the reader thread and close. [`Transport`] captures
//! exactly that, with two implementations:
//! - [`SerialTransport`] over a serial port (the device's native link)
//! - [`SocketTransport`] over a Unix or TCP stream (serial bridges, tests)

pub mod error;
pub mod serial;
pub mod socket;
pub mod traits;

pub use error::{Result, TransportError};
pub use serial::{list_ports, PortInfo, SerialConfig, SerialTransport, DEFAULT_BAUD_RATE};
pub use socket::SocketTransport;
pub use traits::Transport;
