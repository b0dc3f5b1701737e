//! In-memory link for tests and device simulation.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::link::{Link, ReadMode};

#[derive(Debug)]
struct MemoryLinkState {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    mode: ReadMode,
    mode_switches: usize,
    fail_next_read: Option<io::ErrorKind>,
    fail_next_mode_switch: Option<io::ErrorKind>,
    closed: bool,
}

/// A [`Link`] backed by shared in-memory buffers.
///
/// Clones share state, so a test can keep one handle to feed device bytes
/// and inspect replies while another handle is owned by the code under test.
/// Reads with nothing pending fail with `TimedOut`, like a serial port whose
/// read timeout expired.
#[derive(Debug, Clone)]
pub struct MemoryLink {
    state: Arc<Mutex<MemoryLinkState>>,
}

impl Default for MemoryLink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLink {
    /// Create an open link in poll mode with empty buffers.
    pub fn new() -> Self {
        MemoryLink {
            state: Arc::new(Mutex::new(MemoryLinkState {
                rx: VecDeque::new(),
                tx: Vec::new(),
                mode: ReadMode::Poll,
                mode_switches: 0,
                fail_next_read: None,
                fail_next_mode_switch: None,
                closed: false,
            })),
        }
    }

    /// Queue bytes as if the device had sent them.
    pub fn push_rx(&self, data: &[u8]) {
        self.state.lock().rx.extend(data.iter().copied());
    }

    /// Bytes sent by the host since the last call.
    pub fn take_tx(&self) -> Vec<u8> {
        std::mem::take(&mut self.state.lock().tx)
    }

    /// Bytes received but not yet read.
    pub fn pending_rx(&self) -> usize {
        self.state.lock().rx.len()
    }

    /// Current read mode.
    pub fn read_mode(&self) -> ReadMode {
        self.state.lock().mode
    }

    /// Number of `set_read_mode` calls so far.
    pub fn mode_switches(&self) -> usize {
        self.state.lock().mode_switches
    }

    /// Make the next read fail with the given error kind.
    pub fn fail_next_read(&self, kind: io::ErrorKind) {
        self.state.lock().fail_next_read = Some(kind);
    }

    /// Make the next `set_read_mode` fail with the given error kind.
    pub fn fail_next_mode_switch(&self, kind: io::ErrorKind) {
        self.state.lock().fail_next_mode_switch = Some(kind);
    }

    /// Simulate the device disappearing. All further I/O fails.
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

fn disconnected() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "memory link closed")
}

impl Read for MemoryLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if let Some(kind) = state.fail_next_read.take() {
            return Err(io::Error::new(kind, "injected read failure"));
        }
        if state.closed {
            return Err(disconnected());
        }
        if buf.is_empty() {
            return Ok(0);
        }
        if state.rx.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }

        let n = buf.len().min(state.rx.len());
        for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MemoryLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(disconnected());
        }
        state.tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.state.lock().closed {
            return Err(disconnected());
        }
        Ok(())
    }
}

impl Link for MemoryLink {
    fn set_read_mode(&mut self, mode: ReadMode) -> io::Result<()> {
        let mut state = self.state.lock();
        if let Some(kind) = state.fail_next_mode_switch.take() {
            return Err(io::Error::new(kind, "injected mode switch failure"));
        }
        state.mode = mode;
        state.mode_switches += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_buffers() {
        let device = MemoryLink::new();
        let mut host = device.clone();

        device.push_rx(b"abc");
        let mut buf = [0u8; 2];
        assert_eq!(host.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"ab");
        assert_eq!(device.pending_rx(), 1);

        host.write_all(b"reply").unwrap();
        assert_eq!(device.take_tx(), b"reply");
        assert!(device.take_tx().is_empty());
    }

    #[test]
    fn test_empty_read_times_out() {
        let mut link = MemoryLink::new();
        let mut buf = [0u8; 1];
        let err = link.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_close_fails_io() {
        let mut link = MemoryLink::new();
        link.push_rx(b"x");
        link.close();

        let mut buf = [0u8; 1];
        assert_eq!(link.read(&mut buf).unwrap_err().kind(), io::ErrorKind::BrokenPipe);
        assert!(link.write(b"y").is_err());
    }

    #[test]
    fn test_injected_mode_switch_failure() {
        let mut link = MemoryLink::new();
        link.fail_next_mode_switch(io::ErrorKind::PermissionDenied);

        let err = link.set_read_mode(ReadMode::Blocking).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(link.read_mode(), ReadMode::Poll);
        assert_eq!(link.mode_switches(), 0);

        link.set_read_mode(ReadMode::Blocking).unwrap();
        assert_eq!(link.read_mode(), ReadMode::Blocking);
    }
}
