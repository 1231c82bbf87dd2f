//! Connection management for length-prefixed text links.
//!
//! This is the "just works" layer. Initialize a manager over a transport,
//! connect to a peer, send commands, and receive notifications through a
//! registered handler while a background task runs the receive loop.
//!
//! ```ignore
//! use linkframe_manager::{ConnectionManager, ManagerConfig};
//! use linkframe_transport::TcpTransport;
//!
//! let manager = ConnectionManager::<TcpTransport>::new(ManagerConfig::default());
//! let mut messages = manager.message_channel();
//! manager.initialize()?;
//! manager.connect(&"192.168.4.1:23".to_string()).await?;
//! manager.send("LED ON").await?;
//! while let Some(message) = messages.recv().await {
//!     println!("{message}");
//! }
//! manager.terminate().await;
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod manager;
pub mod state;

mod receiver;

pub use config::ManagerConfig;
pub use error::{ManagerError, Result};
pub use handler::{channel_handler, ChannelHandler, MessageHandler};
pub use manager::ConnectionManager;
pub use state::{ManagerState, ReaderState};
