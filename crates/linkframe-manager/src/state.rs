use std::fmt;

/// Lifecycle state of a [`crate::ConnectionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagerState {
    /// No transport allocated yet.
    Uninitialized,
    /// Transport allocated, reader primed but not running.
    Initialized,
    /// Transport connect in progress.
    Connecting,
    /// Link up; reader running and writer armed.
    Connected,
    /// Link torn down. Only `initialize` leaves this state.
    Terminated,
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// State of the background receive loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderState {
    NotStarted,
    Running,
    /// `terminate` ran; the loop has not observed it yet. Only `terminate`
    /// sets this: a loop that ends on its own (peer close, read or decode
    /// error, idle timeout) goes straight from `Running` to `Stopped`.
    CancelRequested,
    /// The loop body has exited.
    Stopped,
}

impl ReaderState {
    /// True once there is no loop left to wait for.
    pub fn is_idle(self) -> bool {
        matches!(self, Self::NotStarted | Self::Stopped)
    }
}

impl fmt::Display for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not-started",
            Self::Running => "running",
            Self::CancelRequested => "cancel-requested",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
