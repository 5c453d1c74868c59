use std::io::Read;
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{is_idle, write_fully, Transport};

/// Baud rate the sensor firmware ships with.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Driver read timeout. Short, so a blocked read never delays shutdown.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial port settings. The line is always 8N1 without flow control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Port name, e.g. `/dev/ttyUSB0` or `COM2`.
    pub port: String,
    /// Line speed in baud.
    pub baud_rate: u32,
    /// Read/write timeout handed to the driver.
    pub timeout: Duration,
}

impl SerialConfig {
    /// Settings for `port` at the default baud rate.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

/// A serial port opened for the sensor link.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialTransport {
    /// Open the port described by `config` and discard stale input.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.timeout)
            .open()
            .map_err(|err| TransportError::Open {
                target: config.port.clone(),
                source: err.into(),
            })?;

        port.clear(serialport::ClearBuffer::Input)?;
        info!(port = %config.port, baud = config.baud_rate, "opened serial port");

        Ok(Self {
            port,
            name: config.port.clone(),
        })
    }
}

impl Transport for SerialTransport {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let pending = self.port.bytes_to_read()? as usize;
        if pending == 0 || buf.is_empty() {
            return Ok(0);
        }

        let want = pending.min(buf.len());
        match self.port.read(&mut buf[..want]) {
            Ok(n) => Ok(n),
            Err(err) if is_idle(err.kind()) => Ok(0),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        write_fully(&mut self.port, bytes)
    }

    fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            port: self.port.try_clone()?,
            name: self.name.clone(),
        })
    }

    fn close(self) -> Result<()> {
        // The driver releases the device when the last handle drops.
        debug!(port = %self.name, "closing serial port");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("serial:{}", self.name)
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port", &self.name)
            .finish()
    }
}

/// A serial port found on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Name to pass to [`SerialConfig::new`].
    pub name: String,
    /// Bus type: `usb`, `pci`, `bluetooth` or `unknown`.
    pub kind: &'static str,
    /// USB product string, when the port is a USB adapter.
    pub product: Option<String>,
    /// USB `vid:pid`, when the port is a USB adapter.
    pub usb_id: Option<String>,
}

/// Enumerate the serial ports visible to this process.
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|port| {
            let (kind, product, usb_id) = match port.port_type {
                SerialPortType::UsbPort(usb) => (
                    "usb",
                    usb.product,
                    Some(format!("{:04x}:{:04x}", usb.vid, usb.pid)),
                ),
                SerialPortType::PciPort => ("pci", None, None),
                SerialPortType::BluetoothPort => ("bluetooth", None, None),
                SerialPortType::Unknown => ("unknown", None, None),
            };
            PortInfo {
                name: port.port_name,
                kind,
                product,
                usb_id,
            }
        })
        .collect())
}
