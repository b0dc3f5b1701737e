//! Protocol session and command dispatcher.
//!
//! A [`Session`] holds every piece of host-side protocol state: the frame
//! classifier, the handshake flag, the memory pool and a handle to the input
//! mailbox. Bytes from the link are fed in one at a time with
//! [`Session::process_byte`]; passthrough bytes go to the sink and completed
//! frames are dispatched against the link.
//!
//! The session outlives any single link. After a reconnect the caller invokes
//! [`Session::reset_link_state`], which forgets the handshake and any
//! half-received frame but keeps the pool and the mailbox.

use std::io::{self, Read, Write};
use std::sync::Arc;

use log::{debug, trace, warn};

use crate::classifier::{Classified, FrameClassifier, FramingState};
use crate::commands::Command;
use crate::constants::*;
use crate::error::{DispatchError, DispatchResult};
use crate::link::{BlockingGuard, Link};
use crate::mailbox::InputMailbox;
use crate::pool::MemoryPool;
use crate::wire::{encode_frame, read_i32, write_i32};

/// Session settings fixed for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Byte that opens a control frame.
    pub init_value: u8,
    /// Echo an `init` frame back when the device sends `init`.
    pub ack_init: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            init_value: DEFAULT_INIT_VALUE,
            ack_init: false,
        }
    }
}

/// Counters accumulated by a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Bytes forwarded to the passthrough sink.
    pub passthrough_bytes: u64,
    /// Known commands executed.
    pub commands: u64,
    /// Frames whose command byte was not recognized.
    pub unknown_commands: u64,
    /// Commands ignored because the session or pool was not ready.
    pub rejected_commands: u64,
}

/// Result of feeding one byte to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOutcome {
    /// The byte was written to the sink.
    Passthrough,
    /// The byte opened a frame.
    FrameStart,
    /// A frame completed. `None` if the command byte was unknown.
    Dispatched(Option<Command>),
}

/// Host-side protocol state for one device.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    classifier: FrameClassifier,
    initialized: bool,
    pool: Option<MemoryPool>,
    mailbox: Arc<InputMailbox>,
    stats: SessionStats,
}

impl Session {
    /// Create a session that serves `mailbox` to the device.
    pub fn new(config: SessionConfig, mailbox: Arc<InputMailbox>) -> Self {
        Session {
            config,
            classifier: FrameClassifier::new(config.init_value),
            initialized: false,
            pool: None,
            mailbox,
            stats: SessionStats::default(),
        }
    }

    /// Session settings.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether the device has completed the handshake on the current link.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The memory pool, if the device has allocated one.
    pub fn pool(&self) -> Option<&MemoryPool> {
        self.pool.as_ref()
    }

    /// Shared input mailbox.
    pub fn mailbox(&self) -> &Arc<InputMailbox> {
        &self.mailbox
    }

    /// Framing state of the classifier.
    pub fn framing_state(&self) -> FramingState {
        self.classifier.state()
    }

    /// Accumulated counters.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// The frame the host sends to start a handshake.
    pub fn handshake_frame(&self) -> [u8; 2] {
        encode_frame(self.config.init_value, Command::Init)
    }

    /// Forget per-link state after the link was torn down.
    pub fn reset_link_state(&mut self) {
        self.classifier.reset();
        self.initialized = false;
    }

    /// Feed one byte received from `link`.
    pub fn process_byte<L, W>(
        &mut self,
        byte: u8,
        link: &mut L,
        sink: &mut W,
    ) -> DispatchResult<ByteOutcome>
    where
        L: Link + ?Sized,
        W: Write + ?Sized,
    {
        match self.classifier.classify(byte) {
            Classified::Passthrough(b) => {
                sink.write_all(&[b]).map_err(DispatchError::Sink)?;
                self.stats.passthrough_bytes += 1;
                Ok(ByteOutcome::Passthrough)
            }
            Classified::FrameStart => {
                trace!("frame start");
                Ok(ByteOutcome::FrameStart)
            }
            Classified::Command(code) => self.dispatch(code, link).map(ByteOutcome::Dispatched),
        }
    }

    /// Execute the command with the given code.
    ///
    /// The link is held in blocking mode for the duration of the command and
    /// always returned to poll mode, whether the handler succeeds or not.
    pub fn dispatch<L: Link + ?Sized>(
        &mut self,
        code: u8,
        link: &mut L,
    ) -> DispatchResult<Option<Command>> {
        let mut link = BlockingGuard::new(link)?;

        let Some(command) = Command::from_code(code) else {
            debug!("ignoring unknown command 0x{:02X}", code);
            self.stats.unknown_commands += 1;
            return Ok(None);
        };

        debug!("handle command {}", command);
        match command {
            Command::Init => self.handle_init(&mut *link)?,
            Command::InitPool => self.handle_init_pool(&mut *link)?,
            Command::Read => self.handle_read(&mut *link)?,
            Command::Write => self.handle_write(&mut *link)?,
            Command::InputAvailable => self.handle_input_available(&mut *link)?,
            Command::InputRequest => self.handle_input_request(&mut *link)?,
            Command::InputPeek => self.handle_input_peek(&mut *link)?,
            Command::Ping => self.handle_ping(&mut *link)?,
        }
        link.flush()?;

        self.stats.commands += 1;
        Ok(Some(command))
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_init<L: Link + ?Sized>(&mut self, link: &mut L) -> DispatchResult<()> {
        self.initialized = true;
        if self.pool.take().is_some() {
            debug!("init discarded existing memory pool");
        }
        if self.config.ack_init {
            link.write_all(&self.handshake_frame())?;
        }
        Ok(())
    }

    fn handle_init_pool<L: Link + ?Sized>(&mut self, link: &mut L) -> DispatchResult<()> {
        let size = read_i32(link)?;
        if !self.initialized {
            warn!("initPool({}) before init, ignoring", size);
            self.stats.rejected_commands += 1;
            return Ok(());
        }

        let len = usize::try_from(size).map_err(|_| DispatchError::InvalidPoolSize(size))?;
        self.pool = Some(MemoryPool::new(len));
        debug!("init pool: {} bytes", len);
        Ok(())
    }

    fn handle_read<L: Link + ?Sized>(&mut self, link: &mut L) -> DispatchResult<()> {
        let index = read_i32(link)?;
        let size = read_i32(link)?;

        let Some(pool) = self.pool.as_ref() else {
            warn!("tried to read uninitialized memory pool");
            self.stats.rejected_commands += 1;
            return Ok(());
        };

        let data = pool.read(index, size)?;
        link.write_all(data)?;
        trace!("read pool: index {} size {}", index, size);
        Ok(())
    }

    fn handle_write<L: Link + ?Sized>(&mut self, link: &mut L) -> DispatchResult<()> {
        let index = read_i32(link)?;
        let size = read_i32(link)?;

        let Some(pool) = self.pool.as_mut() else {
            warn!("tried to write uninitialized memory pool");
            self.stats.rejected_commands += 1;
            return discard(link, size);
        };

        let range = pool.checked_range(index, size)?;
        let mut data = vec![0u8; range.len()];
        link.read_exact(&mut data)?;
        pool.write(index, &data)?;
        trace!("write pool: index {} size {}", index, size);
        Ok(())
    }

    fn handle_input_available<L: Link + ?Sized>(&mut self, link: &mut L) -> DispatchResult<()> {
        let len = self.mailbox.len();
        write_i32(link, clamp_len(len))?;
        Ok(())
    }

    fn handle_input_request<L: Link + ?Sized>(&mut self, link: &mut L) -> DispatchResult<()> {
        let requested = read_i32(link)?;
        let max = usize::try_from(requested).unwrap_or(0);
        let bytes = self.mailbox.drain(max);

        write_i32(link, clamp_len(bytes.len()))?;
        link.write_all(&bytes)?;
        debug!("input request: {} requested, {} sent", requested, bytes.len());
        Ok(())
    }

    fn handle_input_peek<L: Link + ?Sized>(&mut self, link: &mut L) -> DispatchResult<()> {
        match self.mailbox.peek() {
            Some(byte) => link.write_all(&[PEEK_PRESENT, byte])?,
            None => link.write_all(&[PEEK_EMPTY])?,
        }
        Ok(())
    }

    fn handle_ping<L: Link + ?Sized>(&mut self, link: &mut L) -> DispatchResult<()> {
        link.write_all(&encode_frame(self.config.init_value, Command::Ping))?;
        Ok(())
    }
}

/// Read and drop a payload the session has no use for.
fn discard<L: Link + ?Sized>(link: &mut L, size: i32) -> DispatchResult<()> {
    let len = u64::try_from(size).unwrap_or(0);
    let copied = io::copy(&mut (&mut *link).take(len), &mut io::sink())?;
    if copied < len {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    Ok(())
}

/// Mailbox lengths are reported as `i32` on the wire.
fn clamp_len(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::ReadMode;
    use crate::memory_link::MemoryLink;
    use crate::wire::encode_i32;

    const INIT: u8 = 0xFF;

    fn new_session() -> (Session, MemoryLink) {
        let mailbox = Arc::new(InputMailbox::new());
        let session = Session::new(
            SessionConfig {
                init_value: INIT,
                ack_init: false,
            },
            mailbox,
        );
        (session, MemoryLink::new())
    }

    /// Feed every pending byte on `link` through the session.
    fn pump(session: &mut Session, link: &mut MemoryLink, sink: &mut Vec<u8>) -> DispatchResult<()> {
        let mut byte = [0u8; 1];
        while link.pending_rx() > 0 {
            io::Read::read_exact(link, &mut byte)?;
            session.process_byte(byte[0], link, sink)?;
        }
        Ok(())
    }

    fn frame(cmd: u8, payload: &[i32]) -> Vec<u8> {
        let mut out = vec![INIT, cmd];
        for value in payload {
            out.extend(encode_i32(*value));
        }
        out
    }

    #[test]
    fn test_passthrough_to_sink() {
        let (mut session, mut link) = new_session();
        let mut sink = Vec::new();

        link.push_rx(b"Hello, device!\n");
        pump(&mut session, &mut link, &mut sink).unwrap();

        assert_eq!(sink, b"Hello, device!\n");
        assert!(link.take_tx().is_empty());
        assert_eq!(session.stats().passthrough_bytes, 15);
    }

    #[test]
    fn test_full_scenario() {
        let (mut session, mut link) = new_session();
        let mut sink = Vec::new();

        link.push_rx(&frame(CMD_INIT, &[]));
        pump(&mut session, &mut link, &mut sink).unwrap();
        assert!(session.is_initialized());
        assert!(session.pool().is_none());

        link.push_rx(&frame(CMD_INIT_POOL, &[8]));
        pump(&mut session, &mut link, &mut sink).unwrap();
        assert_eq!(session.pool().unwrap().as_slice(), &[0u8; 8]);

        let mut write = frame(CMD_WRITE, &[2, 3]);
        write.extend_from_slice(&[1, 2, 3]);
        link.push_rx(&write);
        pump(&mut session, &mut link, &mut sink).unwrap();
        assert_eq!(session.pool().unwrap().as_slice(), &[0, 0, 1, 2, 3, 0, 0, 0]);

        link.push_rx(&frame(CMD_READ, &[0, 8]));
        pump(&mut session, &mut link, &mut sink).unwrap();
        assert_eq!(link.take_tx(), vec![0, 0, 1, 2, 3, 0, 0, 0]);

        assert!(sink.is_empty());
        assert_eq!(session.framing_state(), FramingState::Idle);
    }

    #[test]
    fn test_init_pool_then_read_returns_zeroes() {
        let (mut session, mut link) = new_session();
        let mut sink = Vec::new();

        link.push_rx(&frame(CMD_INIT, &[]));
        link.push_rx(&frame(CMD_INIT_POOL, &[16]));
        link.push_rx(&frame(CMD_READ, &[0, 16]));
        pump(&mut session, &mut link, &mut sink).unwrap();

        assert_eq!(link.take_tx(), vec![0u8; 16]);
    }

    #[test]
    fn test_second_init_discards_pool() {
        let (mut session, mut link) = new_session();
        let mut sink = Vec::new();

        link.push_rx(&frame(CMD_INIT, &[]));
        link.push_rx(&frame(CMD_INIT_POOL, &[4]));
        pump(&mut session, &mut link, &mut sink).unwrap();
        assert!(session.pool().is_some());

        link.push_rx(&frame(CMD_INIT, &[]));
        pump(&mut session, &mut link, &mut sink).unwrap();
        assert!(session.is_initialized());
        assert!(session.pool().is_none());
    }

    #[test]
    fn test_init_ack() {
        let mailbox = Arc::new(InputMailbox::new());
        let mut session = Session::new(
            SessionConfig {
                init_value: 0xA5,
                ack_init: true,
            },
            mailbox,
        );
        let mut link = MemoryLink::new();

        session.dispatch(CMD_INIT, &mut link).unwrap();
        assert_eq!(link.take_tx(), vec![0xA5, CMD_INIT]);
    }

    #[test]
    fn test_init_pool_before_init_is_ignored() {
        let (mut session, mut link) = new_session();
        let mut sink = Vec::new();

        link.push_rx(&frame(CMD_INIT_POOL, &[8]));
        link.push_rx(b"ok");
        pump(&mut session, &mut link, &mut sink).unwrap();

        assert!(session.pool().is_none());
        // The size payload was consumed, not passed through
        assert_eq!(sink, b"ok");
        assert_eq!(session.stats().rejected_commands, 1);
    }

    #[test]
    fn test_read_write_without_pool_is_noop() {
        let (mut session, mut link) = new_session();
        let mut sink = Vec::new();

        link.push_rx(&frame(CMD_INIT, &[]));
        link.push_rx(&frame(CMD_READ, &[0, 4]));
        let mut write = frame(CMD_WRITE, &[0, 2]);
        write.extend_from_slice(b"zz");
        link.push_rx(&write);
        link.push_rx(b"!");
        pump(&mut session, &mut link, &mut sink).unwrap();

        assert!(link.take_tx().is_empty());
        assert_eq!(sink, b"!");
        assert_eq!(session.stats().rejected_commands, 2);
    }

    #[test]
    fn test_out_of_range_read_is_error() {
        let (mut session, mut link) = new_session();
        let mut sink = Vec::new();

        link.push_rx(&frame(CMD_INIT, &[]));
        link.push_rx(&frame(CMD_INIT_POOL, &[4]));
        link.push_rx(&frame(CMD_READ, &[2, 4]));
        let err = pump(&mut session, &mut link, &mut sink).unwrap_err();

        assert!(matches!(err, DispatchError::Pool(_)));
        assert!(!err.is_transport());
        assert!(link.take_tx().is_empty());
        assert_eq!(link.read_mode(), ReadMode::Poll);
    }

    #[test]
    fn test_out_of_range_write_is_error() {
        let (mut session, mut link) = new_session();
        let mut sink = Vec::new();

        link.push_rx(&frame(CMD_INIT, &[]));
        link.push_rx(&frame(CMD_INIT_POOL, &[4]));
        pump(&mut session, &mut link, &mut sink).unwrap();

        let mut write = frame(CMD_WRITE, &[3, 2]);
        write.extend_from_slice(&[7, 7]);
        link.push_rx(&write);
        let err = pump(&mut session, &mut link, &mut sink).unwrap_err();

        assert!(matches!(err, DispatchError::Pool(_)));
        assert_eq!(session.pool().unwrap().as_slice(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_negative_pool_size() {
        let (mut session, mut link) = new_session();
        session.dispatch(CMD_INIT, &mut link).unwrap();

        link.push_rx(&encode_i32(-5));
        let err = session.dispatch(CMD_INIT_POOL, &mut link).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidPoolSize(-5)));
    }

    #[test]
    fn test_mailbox_commands() {
        let (mut session, mut link) = new_session();
        session.mailbox().append(b"abcde");

        session.dispatch(CMD_INPUT_AVAILABLE, &mut link).unwrap();
        assert_eq!(link.take_tx(), encode_i32(5));

        link.push_rx(&encode_i32(3));
        session.dispatch(CMD_INPUT_REQUEST, &mut link).unwrap();
        let mut expected = encode_i32(3);
        expected.extend_from_slice(b"abc");
        assert_eq!(link.take_tx(), expected);

        session.dispatch(CMD_INPUT_AVAILABLE, &mut link).unwrap();
        assert_eq!(link.take_tx(), encode_i32(2));

        link.push_rx(&encode_i32(10));
        session.dispatch(CMD_INPUT_REQUEST, &mut link).unwrap();
        let mut expected = encode_i32(2);
        expected.extend_from_slice(b"de");
        assert_eq!(link.take_tx(), expected);

        link.push_rx(&encode_i32(10));
        session.dispatch(CMD_INPUT_REQUEST, &mut link).unwrap();
        assert_eq!(link.take_tx(), encode_i32(0));
    }

    #[test]
    fn test_input_request_negative_count() {
        let (mut session, mut link) = new_session();
        session.mailbox().append(b"abc");

        link.push_rx(&encode_i32(-1));
        session.dispatch(CMD_INPUT_REQUEST, &mut link).unwrap();
        assert_eq!(link.take_tx(), encode_i32(0));
        assert_eq!(session.mailbox().len(), 3);
    }

    #[test]
    fn test_input_peek() {
        let (mut session, mut link) = new_session();

        session.dispatch(CMD_INPUT_PEEK, &mut link).unwrap();
        assert_eq!(link.take_tx(), vec![PEEK_EMPTY]);

        session.mailbox().append(b"q");
        session.dispatch(CMD_INPUT_PEEK, &mut link).unwrap();
        let first = link.take_tx();
        session.dispatch(CMD_INPUT_PEEK, &mut link).unwrap();
        let second = link.take_tx();

        assert_eq!(first, vec![PEEK_PRESENT, b'q']);
        assert_eq!(first, second);
        assert_eq!(session.mailbox().len(), 1);
    }

    #[test]
    fn test_ping() {
        let (mut session, mut link) = new_session();
        let result = session.dispatch(CMD_PING, &mut link).unwrap();

        assert_eq!(result, Some(Command::Ping));
        assert_eq!(link.take_tx(), vec![INIT, CMD_PING]);
    }

    #[test]
    fn test_unknown_command_is_absorbed() {
        let (mut session, mut link) = new_session();
        let mut sink = Vec::new();

        link.push_rx(&[INIT, 0x42, b'x']);
        pump(&mut session, &mut link, &mut sink).unwrap();

        assert_eq!(sink, b"x");
        assert!(link.take_tx().is_empty());
        assert_eq!(session.stats().unknown_commands, 1);
        assert_eq!(session.framing_state(), FramingState::Idle);
    }

    #[test]
    fn test_blocking_mode_restored_after_short_read() {
        let (mut session, mut link) = new_session();
        session.dispatch(CMD_INIT, &mut link).unwrap();

        // Device disappears halfway through the size field
        link.push_rx(&[8, 0]);
        let err = session.dispatch(CMD_INIT_POOL, &mut link).unwrap_err();

        assert!(err.is_transport());
        assert_eq!(link.read_mode(), ReadMode::Poll);
        // Two switches per dispatch
        assert_eq!(link.mode_switches(), 4);
    }

    #[test]
    fn test_reset_link_state_keeps_pool_and_mailbox() {
        let (mut session, mut link) = new_session();
        let mut sink = Vec::new();

        session.mailbox().append(b"keep");
        link.push_rx(&frame(CMD_INIT, &[]));
        link.push_rx(&frame(CMD_INIT_POOL, &[2]));
        link.push_rx(&[INIT]);
        pump(&mut session, &mut link, &mut sink).unwrap();
        assert_eq!(session.framing_state(), FramingState::AwaitingCommand);

        session.reset_link_state();

        assert!(!session.is_initialized());
        assert_eq!(session.framing_state(), FramingState::Idle);
        assert_eq!(session.pool().map(|p| p.len()), Some(2));
        assert_eq!(session.mailbox().snapshot(), b"keep");
    }
}
