//! Connection manager.
//!
//! Owns the link to the device and the protocol session, and drives the
//! connection state machine:
//!
//! ```text
//! Disconnected -> Connecting -> Handshaking -> Initialized
//!       ^                                          |
//!       +------------ transport fault -------------+
//! ```
//!
//! While `Handshaking` the host sends an `init` request every
//! `handshake_interval` from inside [`ConnectionManager::update`]. Device
//! firmware waits for this request before sending its own `init`, which moves
//! the state to `Initialized`.
//!
//! A device that did not reset across a reconnect never sends `init` again.
//! Handshake requests stop as soon as any known command arrives on the new
//! link, so a request can only collide with the first command of such a device.
//!
//! A fault while polling tears the link down and reopens it with the same
//! parameters. The memory pool and the input mailbox survive; the handshake
//! does not.
//!
//! Each tick handles at most [`MAX_TICK_BYTES`] bytes and returns after
//! [`MAX_TICK_DURATION`] or once shutdown is requested, so a device that
//! polls continuously cannot starve the caller's input hand-off.

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serram_protocol::{
    ByteOutcome, Command, DispatchError, InputMailbox, Link, ReadMode, Session, SessionConfig,
    SessionStats,
};
use tracing::{debug, info, warn};

use crate::config::ConnectionTiming;
use crate::error::{HostError, HostResult};
use crate::link::Connector;
use crate::shutdown::ShutdownSignal;

/// Upper bound on bytes handled by one [`ConnectionManager::update`].
pub const MAX_TICK_BYTES: usize = 4096;

/// Upper bound on time spent reading in one [`ConnectionManager::update`].
pub const MAX_TICK_DURATION: Duration = Duration::from_millis(50);

/// Lifecycle state of the device connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No link.
    Disconnected,
    /// Trying to open the link.
    Connecting,
    /// Link open, waiting for the device's `init`.
    Handshaking,
    /// Device has sent `init` on this link.
    Initialized,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Handshaking => "handshaking",
            ConnectionState::Initialized => "initialized",
        };
        f.write_str(name)
    }
}

/// Counters for a bridge run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Protocol session counters.
    pub session: SessionStats,
    /// Number of times the link was torn down and reopened.
    pub reconnects: u64,
    /// Handshake requests sent.
    pub handshakes_sent: u64,
}

/// Owns the device link and restarts it on failure.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    timing: ConnectionTiming,
    link: Option<C::Link>,
    session: Session,
    sink: Box<dyn Write + Send>,
    state: ConnectionState,
    shutdown: ShutdownSignal,
    last_handshake: Option<Instant>,
    sending_handshakes: bool,
    reconnects: u64,
    handshakes_sent: u64,
}

impl<C: Connector> ConnectionManager<C> {
    /// Create a disconnected manager. Passthrough bytes are written to `sink`.
    pub fn new(
        connector: C,
        timing: ConnectionTiming,
        session_config: SessionConfig,
        mailbox: Arc<InputMailbox>,
        sink: Box<dyn Write + Send>,
        shutdown: ShutdownSignal,
    ) -> Self {
        ConnectionManager {
            connector,
            timing,
            link: None,
            session: Session::new(session_config, mailbox),
            sink,
            state: ConnectionState::Disconnected,
            shutdown,
            last_handshake: None,
            sending_handshakes: false,
            reconnects: 0,
            handshakes_sent: 0,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The protocol session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Shared input mailbox.
    pub fn mailbox(&self) -> &Arc<InputMailbox> {
        self.session.mailbox()
    }

    /// Number of reconnects so far.
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects
    }

    /// Counters for this run.
    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            session: self.session.stats(),
            reconnects: self.reconnects,
            handshakes_sent: self.handshakes_sent,
        }
    }

    /// Signal used to stop connect retries.
    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Ask a pending connect to give up.
    pub fn quit(&self) {
        self.shutdown.trigger();
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            info!("connection {} -> {}", self.state, state);
            self.state = state;
        }
    }

    /// Open the link, retrying until it succeeds or shutdown is requested.
    pub fn connect(&mut self) -> HostResult<()> {
        self.link = None;
        self.session.reset_link_state();
        self.set_state(ConnectionState::Connecting);

        info!("waiting until {} can be opened", self.connector.target());
        let link = loop {
            if self.shutdown.is_triggered() {
                return Err(HostError::Shutdown);
            }
            match self.open_link() {
                Ok(link) => break link,
                Err(e) => {
                    debug!("open {} failed: {}", self.connector.target(), e);
                    if !self.shutdown.sleep(self.timing.reconnect_delay) {
                        return Err(HostError::Shutdown);
                    }
                }
            }
        };

        // Opening the port may reset the board
        if !self.shutdown.sleep(self.timing.settle_delay) {
            return Err(HostError::Shutdown);
        }

        self.link = Some(link);
        self.last_handshake = None;
        self.sending_handshakes = true;
        self.set_state(ConnectionState::Handshaking);
        Ok(())
    }

    fn open_link(&mut self) -> HostResult<C::Link> {
        let mut link = self.connector.open()?;
        link.set_read_mode(ReadMode::Poll)?;
        Ok(link)
    }

    /// One polling tick: send a handshake request if still handshaking, then read and handle
    /// the bytes the device has already sent, up to the tick budget.
    ///
    /// Transport faults and device protocol violations reconnect. Only a
    /// failing sink or a shutdown during reconnect is returned as an error.
    pub fn update(&mut self) -> HostResult<()> {
        if self.link.is_none() {
            return self.connect();
        }

        match self.poll_link() {
            Ok(()) => Ok(()),
            Err(DispatchError::Sink(e)) => Err(HostError::Sink(e)),
            Err(e) => {
                if e.is_transport() {
                    warn!("link failure: {}", e);
                } else {
                    warn!("device protocol violation, restarting session: {}", e);
                }
                self.reconnect()
            }
        }
    }

    fn reconnect(&mut self) -> HostResult<()> {
        self.link = None;
        self.set_state(ConnectionState::Disconnected);
        self.reconnects += 1;
        warn!("reconnecting (attempt {})", self.reconnects);
        self.connect()
    }

    fn poll_link(&mut self) -> Result<(), DispatchError> {
        let Some(link) = self.link.as_mut() else {
            return Ok(());
        };

        if self.state == ConnectionState::Handshaking && self.sending_handshakes {
            let due = self
                .last_handshake
                .map_or(true, |at| at.elapsed() >= self.timing.handshake_interval);
            if due {
                debug!("sending handshake request");
                link.write_all(&self.session.handshake_frame())?;
                link.flush()?;
                self.last_handshake = Some(Instant::now());
                self.handshakes_sent += 1;
            }
        }

        let started = Instant::now();
        let mut handled = 0;
        let mut byte = [0u8; 1];
        loop {
            match link.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    let outcome = self.session.process_byte(byte[0], link, &mut self.sink)?;
                    if let ByteOutcome::Dispatched(Some(command)) = outcome {
                        if self.sending_handshakes {
                            debug!("device sent {}, handshake requests stopped", command);
                            self.sending_handshakes = false;
                        }
                        let initialized = self.state == ConnectionState::Initialized;
                        if command == Command::Init && !initialized {
                            info!("connection {} -> {}", self.state, ConnectionState::Initialized);
                            self.state = ConnectionState::Initialized;
                        }
                    }
                    handled += 1;
                    if handled >= MAX_TICK_BYTES
                        || started.elapsed() >= MAX_TICK_DURATION
                        || self.shutdown.is_triggered()
                    {
                        break;
                    }
                }
                Err(e) if is_idle(&e) => break,
                Err(e) => return Err(e.into()),
            }
        }

        self.sink.flush().map_err(DispatchError::Sink)
    }
}

/// Read errors that only mean nothing is pending.
fn is_idle(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
