//! Byte link abstraction.
//!
//! The dispatcher never owns the link. It borrows it for the duration of one
//! command and switches it into blocking mode so payloads can be read with
//! `read_exact`, then back to poll mode when the command ends.

use std::io::{self, Read, Write};
use std::ops::{Deref, DerefMut};

use log::warn;

/// Read behavior of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Reads return almost immediately when no data is pending.
    Poll,
    /// Reads wait for the device, up to a command timeout.
    Blocking,
}

/// A bidirectional byte stream to the device.
pub trait Link: Read + Write {
    /// Switch read behavior.
    fn set_read_mode(&mut self, mode: ReadMode) -> io::Result<()>;
}

/// Holds a link in blocking mode and puts it back in poll mode on drop,
/// including when the command handler bails out with an error.
pub struct BlockingGuard<'a, L: Link + ?Sized> {
    link: &'a mut L,
}

impl<'a, L: Link + ?Sized> BlockingGuard<'a, L> {
    /// Switch `link` to blocking mode.
    pub fn new(link: &'a mut L) -> io::Result<Self> {
        link.set_read_mode(ReadMode::Blocking)?;
        Ok(BlockingGuard { link })
    }
}

impl<L: Link + ?Sized> Deref for BlockingGuard<'_, L> {
    type Target = L;

    fn deref(&self) -> &L {
        self.link
    }
}

impl<L: Link + ?Sized> DerefMut for BlockingGuard<'_, L> {
    fn deref_mut(&mut self) -> &mut L {
        self.link
    }
}

impl<L: Link + ?Sized> Drop for BlockingGuard<'_, L> {
    fn drop(&mut self) {
        if let Err(e) = self.link.set_read_mode(ReadMode::Poll) {
            warn!("failed to restore poll mode on link: {}", e);
        }
    }
}
