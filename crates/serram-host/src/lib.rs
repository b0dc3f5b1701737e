//! Host-side serial bridge for serram devices.
//!
//! Connects to a microcontroller running serram firmware, serves its memory
//! pool and console input, and forwards everything else it prints to a
//! passthrough sink (stdout or a second serial port).
//!
//! The pieces:
//!
//! - [`ConnectionManager`] owns the serial link and the protocol session and
//!   reconnects on failure
//! - [`spawn_poller`] runs the manager on its own thread and moves queued
//!   input into the mailbox
//! - [`forward_lines`] turns stdin or a passthrough port into input chunks

pub mod bridge;
pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod input;
pub mod link;
pub mod shutdown;

pub use bridge::{run_poll_loop, spawn_poller};
pub use cli::Args;
pub use config::{BridgeConfig, ConnectionTiming, PassthroughConfig};
pub use connection::{
    BridgeStats, ConnectionManager, ConnectionState, MAX_TICK_BYTES, MAX_TICK_DURATION,
};
pub use error::{HostError, HostResult};
pub use input::forward_lines;
pub use link::{Connector, SerialConnector, SerialLink};
pub use shutdown::ShutdownSignal;
