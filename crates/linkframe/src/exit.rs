use std::fmt;
use std::io;

use linkframe_frame::FrameError;
use linkframe_manager::ManagerError;
use linkframe_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected
        | io::ErrorKind::AddrInUse
        | io::ErrorKind::AddrNotAvailable
        | io::ErrorKind::NotFound
        | io::ErrorKind::PermissionDenied => TRANSPORT_ERROR,
        io::ErrorKind::InvalidInput => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::PathTooLong { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::OversizedCommand { .. } | FrameError::InvalidText { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed | FrameError::Truncated { .. } => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}

pub fn manager_error(context: &str, err: ManagerError) -> CliError {
    match err {
        ManagerError::Connect(err) => transport_error(context, err),
        ManagerError::ConnectTimeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        ManagerError::Write(err) => frame_error(context, err),
        ManagerError::OversizedCommand { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ManagerError::Terminated => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn refused_connect_is_transport_error() {
        let err = manager_error(
            "connect failed",
            ManagerError::Connect(TransportError::Connect {
                address: "127.0.0.1:1".to_string(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            }),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.message.starts_with("connect failed: "));
    }

    #[test]
    fn oversized_command_is_data_invalid() {
        let err = manager_error(
            "send failed",
            ManagerError::OversizedCommand { size: 300, max: 255 },
        );
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn connect_timeout_is_timeout() {
        let err = manager_error(
            "connect failed",
            ManagerError::ConnectTimeout(Duration::from_secs(5)),
        );
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn closed_link_on_write_is_failure() {
        let err = manager_error(
            "send failed",
            ManagerError::Write(FrameError::ConnectionClosed),
        );
        assert_eq!(err.code, FAILURE);
    }
}
