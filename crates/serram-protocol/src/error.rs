//! Protocol error types.

use std::io;

use thiserror::Error;

/// Errors from direct memory pool access.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The requested range does not lie within the pool.
    #[error("pool access out of range: index {index}, size {size}, pool length {pool_len}")]
    OutOfRange {
        /// Requested start index.
        index: i64,
        /// Requested length.
        size: i64,
        /// Current pool length.
        pool_len: usize,
    },
}

/// Errors that abort a command while it is being dispatched.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The link failed or returned short data mid-command.
    #[error("link transport error: {0}")]
    Transport(#[from] io::Error),

    /// The passthrough sink could not accept data.
    #[error("passthrough sink error: {0}")]
    Sink(#[source] io::Error),

    /// The device addressed memory outside the pool.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The device asked for a pool with a negative size.
    #[error("invalid pool size: {0}")]
    InvalidPoolSize(i32),
}

impl DispatchError {
    /// Whether this error came from the link itself rather than from the
    /// device misusing the protocol.
    pub fn is_transport(&self) -> bool {
        matches!(self, DispatchError::Transport(_))
    }
}

/// Result type alias for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
