//! Length-prefixed text messaging with microcontroller peers.
//!
//! A host and a small device exchange short text messages over any duplex
//! byte stream (an RFCOMM bridge, a TCP serial adapter, a local socket).
//! Each message is one length byte followed by up to 255 bytes of text.
//!
//! # Crate Structure
//!
//! - [`transport`] - Duplex stream abstraction (TCP, Unix sockets, in-memory)
//! - [`frame`] - Wire format, text encodings, async reader and writer
//! - [`manager`] - Connection lifecycle and background receive loop (behind `manager` feature)

/// Re-export transport types.
pub mod transport {
    pub use linkframe_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use linkframe_frame::*;
}

/// Re-export manager types (requires `manager` feature).
#[cfg(feature = "manager")]
pub mod manager {
    pub use linkframe_manager::*;
}
