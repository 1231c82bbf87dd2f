use crate::encoding::TextEncoding;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The encoded command does not fit in a single-byte length prefix
    /// (or exceeds the configured limit).
    #[error("command too large ({size} bytes encoded, max {max})")]
    OversizedCommand { size: usize, max: usize },

    /// The stream ended after the length prefix but before the full payload.
    #[error("connection closed mid-frame ({received} of {expected} payload bytes)")]
    Truncated { expected: usize, received: usize },

    /// The stream ended cleanly on a frame boundary.
    #[error("connection closed")]
    ConnectionClosed,

    /// The payload bytes are not valid text in the negotiated encoding.
    #[error("payload is not valid {encoding}: {reason}")]
    InvalidText {
        encoding: TextEncoding,
        reason: String,
    },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// True for the ordinary ways a link goes away: a clean close or a
    /// close in the middle of a frame.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::Truncated { .. })
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
