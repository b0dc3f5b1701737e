//! Commands the device can issue to the host.

use std::fmt;

use crate::constants::*;

/// Commands carried in the second byte of a control frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Handshake from the device.
    Init,
    /// Allocate the memory pool. Payload: `size`.
    InitPool,
    /// Read from the pool. Payload: `index`, `size`.
    Read,
    /// Write to the pool. Payload: `index`, `size`, then `size` bytes.
    Write,
    /// Report mailbox length.
    InputAvailable,
    /// Drain bytes from the mailbox. Payload: `requested`.
    InputRequest,
    /// Peek at the mailbox front.
    InputPeek,
    /// Echo a ping frame.
    Ping,
}

impl Command {
    /// All commands in wire order.
    pub const ALL: [Command; 8] = [
        Command::Init,
        Command::InitPool,
        Command::Read,
        Command::Write,
        Command::InputAvailable,
        Command::InputRequest,
        Command::InputPeek,
        Command::Ping,
    ];

    /// Decode a command byte. Returns `None` for codes the host does not know.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            CMD_INIT => Some(Command::Init),
            CMD_INIT_POOL => Some(Command::InitPool),
            CMD_READ => Some(Command::Read),
            CMD_WRITE => Some(Command::Write),
            CMD_INPUT_AVAILABLE => Some(Command::InputAvailable),
            CMD_INPUT_REQUEST => Some(Command::InputRequest),
            CMD_INPUT_PEEK => Some(Command::InputPeek),
            CMD_PING => Some(Command::Ping),
            _ => None,
        }
    }

    /// The wire code of this command.
    pub fn code(self) -> u8 {
        match self {
            Command::Init => CMD_INIT,
            Command::InitPool => CMD_INIT_POOL,
            Command::Read => CMD_READ,
            Command::Write => CMD_WRITE,
            Command::InputAvailable => CMD_INPUT_AVAILABLE,
            Command::InputRequest => CMD_INPUT_REQUEST,
            Command::InputPeek => CMD_INPUT_PEEK,
            Command::Ping => CMD_PING,
        }
    }

    /// Protocol name, as used in device firmware and logs.
    pub fn name(self) -> &'static str {
        match self {
            Command::Init => "init",
            Command::InitPool => "initPool",
            Command::Read => "read",
            Command::Write => "write",
            Command::InputAvailable => "inputAvailable",
            Command::InputRequest => "inputRequest",
            Command::InputPeek => "inputPeek",
            Command::Ping => "ping",
        }
    }
}

impl From<Command> for u8 {
    fn from(command: Command) -> Self {
        command.code()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.code())
    }
}
