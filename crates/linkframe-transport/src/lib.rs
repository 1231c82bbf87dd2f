//! Duplex byte-stream transport abstraction.
//!
//! Provides a unified interface over the links a host can use to reach a
//! microcontroller peer:
//! - TCP (serial-over-TCP bridges, simulators)
//! - Unix domain sockets (local daemons that own the radio device)
//! - In-memory duplex pipes (tests, embedded simulators)
//!
//! This is the lowest layer of linkframe. Everything else builds on top of
//! the [`Transport`] trait and the [`Connection`] halves it produces.

pub mod error;
pub mod memory;
pub mod tcp;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use memory::{DuplexTransport, DEFAULT_DUPLEX_BUFFER};
pub use tcp::{TcpLinkListener, TcpTransport};
pub use traits::{Connection, Transport};

#[cfg(unix)]
pub use uds::UnixTransport;
