//! Serial port link and the connector that opens it.

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::SerialPort;
use serram_protocol::{Link, ReadMode};

use crate::config::BridgeConfig;
use crate::error::HostResult;

/// Opens links to the device. The connection manager calls this again after
/// every transport failure.
pub trait Connector {
    /// Link type produced.
    type Link: Link;

    /// Try once to open the link.
    fn open(&mut self) -> HostResult<Self::Link>;

    /// Human readable target, for logs.
    fn target(&self) -> String;
}

/// A serial port switched between a short poll timeout and a longer
/// command timeout.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    poll_timeout: Duration,
    command_timeout: Duration,
}

impl SerialLink {
    /// Wrap an open port and put it in poll mode.
    pub fn new(
        mut port: Box<dyn SerialPort>,
        poll_timeout: Duration,
        command_timeout: Duration,
    ) -> HostResult<Self> {
        port.set_timeout(poll_timeout)?;
        Ok(SerialLink {
            port,
            poll_timeout,
            command_timeout,
        })
    }
}

impl Read for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl Link for SerialLink {
    fn set_read_mode(&mut self, mode: ReadMode) -> io::Result<()> {
        let timeout = match mode {
            ReadMode::Poll => self.poll_timeout,
            ReadMode::Blocking => self.command_timeout,
        };
        self.port.set_timeout(timeout).map_err(io::Error::from)
    }
}

/// Opens the configured serial device.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    port: String,
    baud: u32,
    poll_timeout: Duration,
    command_timeout: Duration,
}

impl SerialConnector {
    /// Create a connector for the given port and baud rate.
    pub fn new(port: impl Into<String>, baud: u32) -> Self {
        let defaults = BridgeConfig::default();
        SerialConnector {
            port: port.into(),
            baud,
            poll_timeout: defaults.poll_timeout(),
            command_timeout: defaults.command_timeout(),
        }
    }

    /// Create a connector from the bridge configuration.
    pub fn from_config(config: &BridgeConfig) -> Self {
        SerialConnector {
            port: config.port.clone(),
            baud: config.baud,
            poll_timeout: config.poll_timeout(),
            command_timeout: config.command_timeout(),
        }
    }
}

impl Connector for SerialConnector {
    type Link = SerialLink;

    fn open(&mut self) -> HostResult<SerialLink> {
        let port = serialport::new(&self.port, self.baud)
            .timeout(self.poll_timeout)
            .open()?;
        SerialLink::new(port, self.poll_timeout, self.command_timeout)
    }

    fn target(&self) -> String {
        format!("{} @ {} baud", self.port, self.baud)
    }
}
