//! Host-side link to serial sensor devices.
//!
//! senslink talks to a sensor over a serial line using a small CRC16-checked
//! frame protocol. It recovers from line noise, issues commands, classifies
//! measurement samples and records them to CSV.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial ports and socket bridges
//! - [`frame`]: wire format, checksum and stream reassembly
//! - [`link`]: the session engine (reader thread, dispatch, recording)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::mpsc;
//!
//! use senslink::link::{Command, Link, LinkConfig, LinkEvent};
//! use senslink::transport::{SerialConfig, SerialTransport};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let port = SerialTransport::open(&SerialConfig::new("/dev/ttyUSB0"))?;
//! let (events, rx) = mpsc::channel::<LinkEvent>();
//! let mut link = Link::open(port, events, LinkConfig::default())?;
//!
//! link.send(Command::GetStatus)?;
//! if let Ok(event) = rx.recv() {
//!     println!("{event:?}");
//! }
//! link.close()?;
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use senslink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use senslink_frame::*;
}

/// Re-export link session types.
pub mod link {
    pub use senslink_link::*;
}
