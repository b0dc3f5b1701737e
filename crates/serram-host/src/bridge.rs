//! Poll loop tying the connection manager to the input hand-off queue.
//!
//! The poll thread is the only thread touching the link. Producers never
//! write to the mailbox directly; they push chunks into a channel that the
//! poll thread moves into the mailbox between ticks.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, TryRecvError};
use tracing::{debug, info};

use crate::connection::{BridgeStats, ConnectionManager};
use crate::error::{HostError, HostResult};
use crate::link::Connector;
use crate::shutdown::ShutdownSignal;

/// Run until shutdown is requested.
///
/// Each iteration runs one connection tick and then moves at most one
/// queued input chunk into the mailbox.
pub fn run_poll_loop<C: Connector>(
    manager: &mut ConnectionManager<C>,
    input: &Receiver<Vec<u8>>,
) -> HostResult<()> {
    let shutdown = manager.shutdown_signal().clone();
    let mut input_open = true;

    while !shutdown.is_triggered() {
        match manager.update() {
            Ok(()) => {}
            Err(HostError::Shutdown) => break,
            Err(e) => return Err(e),
        }

        if input_open {
            match input.try_recv() {
                Ok(chunk) => {
                    debug!("queueing {} input bytes", chunk.len());
                    manager.mailbox().append(&chunk);
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    debug!("input channel closed");
                    input_open = false;
                }
            }
        }
    }

    Ok(())
}

/// Connect and run the poll loop on a dedicated thread.
///
/// The thread returns the run counters. A shutdown during the initial
/// connect is a clean exit.
pub fn spawn_poller<C>(
    mut manager: ConnectionManager<C>,
    input: Receiver<Vec<u8>>,
) -> HostResult<JoinHandle<HostResult<BridgeStats>>>
where
    C: Connector + Send + 'static,
    C::Link: Send,
{
    let handle = thread::Builder::new()
        .name("serram-poll".to_string())
        .spawn(move || {
            match manager.connect() {
                Ok(()) => run_poll_loop(&mut manager, &input)?,
                Err(HostError::Shutdown) => {}
                Err(e) => return Err(e),
            }
            let stats = manager.stats();
            info!(
                "poll loop stopped: {} passthrough bytes, {} commands, {} reconnects",
                stats.session.passthrough_bytes, stats.session.commands, stats.reconnects
            );
            Ok(stats)
        })?;
    Ok(handle)
}
