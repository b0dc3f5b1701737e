//! Command line arguments.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{BridgeConfig, PassthroughConfig, DEFAULT_BAUD};

/// Serve memory and console input to a microcontroller over serial.
#[derive(Debug, Parser)]
#[command(name = "serram", version, about)]
pub struct Args {
    /// Serial device connected to the microcontroller.
    #[arg(short = 'p', long)]
    pub port: Option<String>,

    /// Serial baud rate.
    #[arg(short = 'b', long)]
    pub baud: Option<u32>,

    /// Byte that starts a control frame (decimal or 0x-prefixed hex).
    #[arg(short = 'i', long, value_parser = parse_byte)]
    pub init_value: Option<u8>,

    /// Serial pass-through device used instead of stdin/stdout.
    #[arg(short = 'l', long = "pass")]
    pub pass: Option<String>,

    /// Baud rate of the pass-through device.
    #[arg(short = 'r', long = "passbaud")]
    pub pass_baud: Option<u32>,

    /// Echo an init frame back when the device initializes.
    #[arg(long)]
    pub ack_init: bool,

    /// YAML configuration file. Flags override its values.
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Overlay the flags that were given on top of `config`.
    pub fn apply(&self, mut config: BridgeConfig) -> BridgeConfig {
        if let Some(port) = &self.port {
            config.port = port.clone();
        }
        if let Some(baud) = self.baud {
            config.baud = baud;
        }
        if let Some(init_value) = self.init_value {
            config.init_value = init_value;
        }
        if let Some(port) = &self.pass {
            let baud = config
                .passthrough
                .as_ref()
                .map(|p| p.baud)
                .unwrap_or(DEFAULT_BAUD);
            config.passthrough = Some(PassthroughConfig {
                port: port.clone(),
                baud,
            });
        }
        if let (Some(baud), Some(pass)) = (self.pass_baud, config.passthrough.as_mut()) {
            pass.baud = baud;
        }
        if self.ack_init {
            config.ack_init = true;
        }
        config
    }
}

/// Parse a byte given as decimal (`255`) or hex (`0xFF`).
pub fn parse_byte(s: &str) -> Result<u8, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid byte value '{}': {}", s, e))
}
