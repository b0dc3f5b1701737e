//! Input mailbox shared between the input producer and the dispatcher.
//!
//! The lock guards only in-memory queue operations. Callers copy bytes out
//! and release it before touching the link.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// FIFO of input bytes waiting to be pulled by the device.
#[derive(Debug, Default)]
pub struct InputMailbox {
    queue: Mutex<VecDeque<u8>>,
}

impl InputMailbox {
    /// Create an empty mailbox.
    pub fn new() -> Self {
        InputMailbox::default()
    }

    /// Queue bytes at the back.
    pub fn append(&self, bytes: &[u8]) {
        self.queue.lock().extend(bytes.iter().copied());
    }

    /// Number of queued bytes.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Front byte, left in place.
    pub fn peek(&self) -> Option<u8> {
        self.queue.lock().front().copied()
    }

    /// Remove up to `max` bytes from the front.
    ///
    /// The count and the bytes are taken under one lock, so the returned
    /// length is exactly what was removed.
    pub fn drain(&self, max: usize) -> Vec<u8> {
        let mut queue = self.queue.lock();
        let count = max.min(queue.len());
        queue.drain(..count).collect()
    }

    /// Copy of the queued bytes.
    pub fn snapshot(&self) -> Vec<u8> {
        self.queue.lock().iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let mailbox = InputMailbox::new();
        mailbox.append(b"hello\n");
        mailbox.append(b"world\n");

        assert_eq!(mailbox.len(), 12);
        assert_eq!(mailbox.drain(3), b"hel");
        assert_eq!(mailbox.drain(100), b"lo\nworld\n");
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_drain_clamps_to_length() {
        let mailbox = InputMailbox::new();
        mailbox.append(&[1, 2]);

        assert_eq!(mailbox.drain(5), vec![1, 2]);
        assert_eq!(mailbox.drain(5), Vec::<u8>::new());
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mailbox = InputMailbox::new();
        assert_eq!(mailbox.peek(), None);

        mailbox.append(b"xy");
        assert_eq!(mailbox.peek(), Some(b'x'));
        assert_eq!(mailbox.peek(), Some(b'x'));
        assert_eq!(mailbox.len(), 2);
    }

    #[test]
    fn test_concurrent_append_and_drain() {
        let mailbox = Arc::new(InputMailbox::new());

        let producer = {
            let mailbox = mailbox.clone();
            thread::spawn(move || {
                for i in 0..1000u32 {
                    mailbox.append(&[(i % 256) as u8]);
                }
            })
        };

        let mut received = Vec::new();
        while received.len() < 1000 {
            received.extend(mailbox.drain(7));
        }
        producer.join().unwrap();

        let expected: Vec<u8> = (0..1000u32).map(|i| (i % 256) as u8).collect();
        assert_eq!(received, expected);
    }
}
