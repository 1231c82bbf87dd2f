use std::time::Duration;

use linkframe_frame::FrameConfig;

/// Configuration for a [`crate::ConnectionManager`].
///
/// Both timeouts default to `None`: a transport that never answers blocks
/// `connect`, and a silent peer keeps the reader waiting, until `terminate`.
#[derive(Debug, Clone, Default)]
pub struct ManagerConfig {
    /// Framing options shared by the reader and the writer.
    pub frame: FrameConfig,
    /// Upper bound on the transport connect.
    pub connect_timeout: Option<Duration>,
    /// Upper bound on the wait for each inbound frame. Expiry ends the
    /// receive loop.
    pub read_timeout: Option<Duration>,
}
