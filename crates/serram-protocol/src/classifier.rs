//! Byte classifier separating control frames from passthrough output.
//!
//! The device shares one serial stream between its own console output and
//! control frames. The classifier looks at one byte at a time:
//!
//! - in `Idle`, the init value opens a frame and any other byte passes through
//! - in `AwaitingCommand`, the byte is a command code and the frame closes
//!
//! There is no escaping. A passthrough byte equal to the init value always
//! opens a frame, so the init value must be a byte the device never prints.

/// Framing state of the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramingState {
    /// Between frames.
    #[default]
    Idle,
    /// Init value seen, next byte is a command.
    AwaitingCommand,
}

/// What a single byte turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classified {
    /// Ordinary output, to be forwarded to the sink.
    Passthrough(u8),
    /// The init value opening a frame. Produces no output.
    FrameStart,
    /// A command code closing a frame.
    Command(u8),
}

/// Stateful per-byte frame detector.
#[derive(Debug, Clone)]
pub struct FrameClassifier {
    init_value: u8,
    state: FramingState,
}

impl FrameClassifier {
    /// Create a classifier for the given init value.
    pub fn new(init_value: u8) -> Self {
        FrameClassifier {
            init_value,
            state: FramingState::Idle,
        }
    }

    /// The byte that opens a frame.
    pub fn init_value(&self) -> u8 {
        self.init_value
    }

    /// Current framing state.
    pub fn state(&self) -> FramingState {
        self.state
    }

    /// Classify one byte and advance the state.
    pub fn classify(&mut self, byte: u8) -> Classified {
        match self.state {
            FramingState::AwaitingCommand => {
                self.state = FramingState::Idle;
                Classified::Command(byte)
            }
            FramingState::Idle if byte == self.init_value => {
                self.state = FramingState::AwaitingCommand;
                Classified::FrameStart
            }
            FramingState::Idle => Classified::Passthrough(byte),
        }
    }

    /// Drop any half-received frame.
    pub fn reset(&mut self) {
        self.state = FramingState::Idle;
    }
}
