//! Bridge configuration.
//!
//! Values come from built-in defaults, then an optional YAML file, then
//! command line flags. Every field may be omitted from the file.
//!
//! ```yaml
//! port: /dev/ttyUSB0
//! baud: 115200
//! init_value: 0xFF
//! passthrough:
//!   port: /dev/ttyUSB1
//!   baud: 9600
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serram_protocol::{SessionConfig, DEFAULT_INIT_VALUE};

use crate::error::{HostError, HostResult};

/// Default serial device of the microcontroller.
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";
/// Default baud rate for both the device and the passthrough port.
pub const DEFAULT_BAUD: u32 = 115_200;

fn default_baud() -> u32 {
    DEFAULT_BAUD
}

/// Second serial device used as input source and passthrough sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassthroughConfig {
    /// Serial device path.
    pub port: String,
    /// Baud rate.
    #[serde(default = "default_baud")]
    pub baud: u32,
}

/// Complete bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Serial device of the microcontroller.
    pub port: String,
    /// Baud rate of the microcontroller link.
    pub baud: u32,
    /// Byte opening every control frame.
    pub init_value: u8,
    /// Optional passthrough device. When absent, stdin/stdout are used.
    pub passthrough: Option<PassthroughConfig>,
    /// Delay between attempts to open the port.
    pub reconnect_delay_ms: u64,
    /// Wait after opening the port before talking to the device.
    /// Opening a port resets many boards.
    pub settle_delay_ms: u64,
    /// Interval between handshake requests while waiting for the device.
    pub handshake_interval_ms: u64,
    /// Read timeout while polling for device output.
    pub poll_timeout_ms: u64,
    /// Read timeout while receiving a command payload.
    pub command_timeout_ms: u64,
    /// Echo an `init` frame back when the device sends `init`.
    pub ack_init: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            port: DEFAULT_PORT.to_string(),
            baud: DEFAULT_BAUD,
            init_value: DEFAULT_INIT_VALUE,
            passthrough: None,
            reconnect_delay_ms: 500,
            settle_delay_ms: 1000,
            handshake_interval_ms: 500,
            poll_timeout_ms: 10,
            command_timeout_ms: 2000,
            ack_init: false,
        }
    }
}

/// Timing knobs of the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionTiming {
    /// Back-off between failed opens.
    pub reconnect_delay: Duration,
    /// Pause after a successful open.
    pub settle_delay: Duration,
    /// Interval between handshake requests.
    pub handshake_interval: Duration,
}

impl Default for ConnectionTiming {
    fn default() -> Self {
        BridgeConfig::default().timing()
    }
}

impl BridgeConfig {
    /// Parse a YAML document. Missing fields keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> HostResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a YAML configuration file.
    pub fn load(path: &Path) -> HostResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Check values that would otherwise fail later in confusing ways.
    pub fn validate(&self) -> HostResult<()> {
        if self.port.is_empty() {
            return Err(HostError::Config("serial port must not be empty".into()));
        }
        if self.baud == 0 {
            return Err(HostError::Config("baud rate must be positive".into()));
        }
        if self.command_timeout_ms == 0 {
            return Err(HostError::Config(
                "command timeout must be positive".into(),
            ));
        }
        if let Some(pass) = &self.passthrough {
            if pass.baud == 0 {
                return Err(HostError::Config(
                    "passthrough baud rate must be positive".into(),
                ));
            }
            if pass.port == self.port {
                return Err(HostError::Config(format!(
                    "passthrough port {} is the device port",
                    pass.port
                )));
            }
        }
        Ok(())
    }

    /// Whether the init value is a byte that commonly appears in console
    /// text. Such a byte in device output would be taken as a frame start.
    pub fn init_value_is_text(&self) -> bool {
        let b = self.init_value;
        b.is_ascii_graphic() || b.is_ascii_whitespace()
    }

    /// Connection manager timing.
    pub fn timing(&self) -> ConnectionTiming {
        ConnectionTiming {
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            handshake_interval: Duration::from_millis(self.handshake_interval_ms),
        }
    }

    /// Protocol session settings.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            init_value: self.init_value,
            ack_init: self.ack_init,
        }
    }

    /// Read timeout while polling.
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Read timeout while receiving a command payload.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}
