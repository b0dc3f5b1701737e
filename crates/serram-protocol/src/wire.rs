//! Fixed-width integer and frame encoding.
//!
//! Integers are 4-byte little-endian, matching the byte order the device
//! firmware assembles them in.

use std::io::{self, Read, Write};

use bytes::{Buf, BufMut};

use crate::commands::Command;
use crate::constants::INT_SIZE;

/// Read one protocol integer. A short read is an error.
pub fn read_i32<R: Read + ?Sized>(reader: &mut R) -> io::Result<i32> {
    let mut raw = [0u8; INT_SIZE];
    reader.read_exact(&mut raw)?;
    Ok((&raw[..]).get_i32_le())
}

/// Write one protocol integer.
pub fn write_i32<W: Write + ?Sized>(writer: &mut W, value: i32) -> io::Result<()> {
    writer.write_all(&encode_i32(value))
}

/// Encode one protocol integer.
pub fn encode_i32(value: i32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(INT_SIZE);
    buf.put_i32_le(value);
    buf
}

/// Encode a two-byte control frame.
pub fn encode_frame(init_value: u8, command: Command) -> [u8; 2] {
    [init_value, command.code()]
}
