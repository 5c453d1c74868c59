//! Host-side link session for senslink sensor devices.
//!
//! A [`Link`] owns an open transport. It issues commands from the caller's
//! thread and runs a reader thread that reassembles inbound frames and
//! dispatches them in wire order: status reports and acknowledgements
//! become [`LinkEvent`]s, measurement samples become events and, while
//! recording, rows in a [`RecordingSink`].

pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod link;
pub mod message;
pub mod reader;
pub mod recording;
pub mod session;
pub mod tap;

pub use command::{Command, CommandEncoder};
pub use config::LinkConfig;
pub use dispatcher::{Dispatcher, EventHandler};
pub use error::{LinkError, ProtocolViolation, Result, SinkError};
pub use link::Link;
pub use message::{Ack, Contact, DeviceState, LinkEvent, Sample, StatusReport};
pub use recording::{CsvRecorder, MemorySink, RecordingSink, SampleRecord};
pub use session::{LinkStats, SessionFlags, StatsSnapshot};
pub use tap::{DebugTap, TracingTap};
