//! Serial RAM host protocol
//!
//! This crate implements the host side of the in-band command protocol spoken
//! by microcontroller firmware that borrows memory and console input from a
//! host over a serial link. The device never sees a separate control channel:
//! control frames are interleaved with ordinary output (debug prints, logs)
//! on the same byte stream.
//!
//! # Protocol Overview
//!
//! Every control frame starts with the configured init value (`0xFF` by
//! default) followed by a single command byte:
//!
//! ```text
//! +------------+---------+---------------------------+
//! | init_value | command | payload (command specific) |
//! +------------+---------+---------------------------+
//! ```
//!
//! Any byte received outside a frame is passed through untouched. All
//! integers in payloads and replies are 4-byte little-endian `i32`.
//!
//! | code | command          | device → host payload      | host → device reply           |
//! |------|------------------|----------------------------|-------------------------------|
//! | 0    | `init`           | -                          | optional `[init_value, 0]`    |
//! | 1    | `initPool`       | `size`                     | -                             |
//! | 2    | `read`           | `index`, `size`            | `size` pool bytes             |
//! | 3    | `write`          | `index`, `size`, bytes     | -                             |
//! | 4    | `inputAvailable` | -                          | `len`                         |
//! | 5    | `inputRequest`   | `requested`                | `count`, `count` bytes        |
//! | 6    | `inputPeek`      | -                          | `0` or `1, byte`              |
//! | 7    | `ping`           | -                          | `[init_value, 7]`             |
//!
//! # Example
//!
//! `MemoryLink` is only built with the `test-util` feature.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use serram_protocol::{InputMailbox, MemoryLink, Session, SessionConfig};
//!
//! let mailbox = Arc::new(InputMailbox::new());
//! let mut session = Session::new(SessionConfig::default(), mailbox);
//! let mut link = MemoryLink::new();
//! let mut sink = Vec::new();
//!
//! session.process_byte(b'h', &mut link, &mut sink)?;
//! assert_eq!(sink, b"h");
//! ```

mod classifier;
mod commands;
mod constants;
mod error;
mod link;
mod mailbox;
#[cfg(any(test, feature = "test-util"))]
mod memory_link;
mod pool;
mod session;
mod wire;

pub use classifier::*;
pub use commands::*;
pub use constants::*;
pub use error::*;
pub use link::*;
pub use mailbox::*;
#[cfg(any(test, feature = "test-util"))]
pub use memory_link::*;
pub use pool::*;
pub use session::*;
pub use wire::*;
