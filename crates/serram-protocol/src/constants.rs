//! Protocol constants
//!
//! Command codes are part of the wire contract shared with the device
//! firmware. Their numeric order must never change.

// ============================================================================
// Framing
// ============================================================================

/// Default byte marking the start of a control frame.
pub const DEFAULT_INIT_VALUE: u8 = 0xFF;

/// Width of every integer carried in a payload or reply.
pub const INT_SIZE: usize = 4;

// ============================================================================
// Command Codes (device → host)
// ============================================================================

/// Handshake. Marks the connection initialized and drops the memory pool.
pub const CMD_INIT: u8 = 0;
/// Allocate a fresh zero-filled memory pool.
pub const CMD_INIT_POOL: u8 = 1;
/// Read a range of the memory pool.
pub const CMD_READ: u8 = 2;
/// Write a range of the memory pool.
pub const CMD_WRITE: u8 = 3;
/// Query the number of bytes waiting in the input mailbox.
pub const CMD_INPUT_AVAILABLE: u8 = 4;
/// Pull bytes from the front of the input mailbox.
pub const CMD_INPUT_REQUEST: u8 = 5;
/// Look at the front of the input mailbox without consuming it.
pub const CMD_INPUT_PEEK: u8 = 6;
/// Round-trip latency check.
pub const CMD_PING: u8 = 7;

// ============================================================================
// Reply Values
// ============================================================================

/// `inputPeek` reply flag when the mailbox is empty.
pub const PEEK_EMPTY: u8 = 0;
/// `inputPeek` reply flag preceding the front byte.
pub const PEEK_PRESENT: u8 = 1;
