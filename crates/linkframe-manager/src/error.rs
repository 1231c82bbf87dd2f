use std::time::Duration;

use linkframe_frame::FrameError;

use crate::state::ManagerState;

/// Errors that can occur in connection manager operations.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// The transport could not reach the peer.
    #[error("connect failed: {0}")]
    Connect(#[from] linkframe_transport::TransportError),

    /// The transport connect did not finish within the configured limit.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Writing or flushing a frame failed.
    #[error("write failed: {0}")]
    Write(FrameError),

    /// The command encodes to more bytes than one frame can carry.
    #[error("command too large ({size} bytes encoded, max {max})")]
    OversizedCommand { size: usize, max: usize },

    /// The operation is not valid in the current lifecycle state.
    #[error("invalid state: expected {expected}, found {actual}")]
    InvalidState {
        expected: ManagerState,
        actual: ManagerState,
    },

    /// `initialize` was called over a live or connecting link.
    #[error("link is {0}; terminate it before re-initializing")]
    AlreadyActive(ManagerState),

    /// `terminate` ran while the operation was in flight.
    #[error("link terminated")]
    Terminated,
}

impl ManagerError {
    /// Map a send-path frame error, keeping the size guard distinct from
    /// transport failures.
    pub(crate) fn from_send(err: FrameError) -> Self {
        match err {
            FrameError::OversizedCommand { size, max } => Self::OversizedCommand { size, max },
            other => Self::Write(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ManagerError>;
