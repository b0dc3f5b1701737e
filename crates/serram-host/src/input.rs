//! Input producers feeding the hand-off queue.

use std::io::{self, BufRead};

use crossbeam_channel::Sender;
use tracing::{debug, trace};

use crate::shutdown::ShutdownSignal;

/// Forward `reader` line by line (newline included) until end of input,
/// shutdown, or the receiver going away. Returns the number of lines sent.
///
/// Read timeouts are retried, so a serial port with a read timeout can be
/// used as the source. A partial line survives a timeout.
pub fn forward_lines<R: BufRead>(
    mut reader: R,
    tx: &Sender<Vec<u8>>,
    shutdown: &ShutdownSignal,
) -> io::Result<u64> {
    let mut line = Vec::new();
    let mut sent = 0;

    while !shutdown.is_triggered() {
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => {
                debug!("input reached end of stream");
                break;
            }
            Ok(_) => {
                trace!("input line: {} bytes", line.len());
                if tx.send(std::mem::take(&mut line)).is_err() {
                    break;
                }
                sent += 1;
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => {}
            Err(e) => return Err(e),
        }
    }

    // A final line without newline
    if !line.is_empty() && tx.send(line).is_ok() {
        sent += 1;
    }
    Ok(sent)
}
