use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use linkframe_frame::{FrameError, FrameReader, FrameWriter};
use linkframe_transport::Transport;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::ManagerConfig;
use crate::error::{ManagerError, Result};
use crate::handler::{channel_handler, HandlerSlot, MessageHandler};
use crate::receiver::ReaderTask;
use crate::state::{ManagerState, ReaderState};

type TransportFactory<T> = Box<dyn Fn() -> T + Send + Sync>;

/// Everything created by `initialize` and torn down by `terminate`.
///
/// Guarded by a std mutex that is never held across an await point.
struct Lifecycle<T> {
    state: ManagerState,
    transport: Option<T>,
    cancel: CancellationToken,
    reader_state: Arc<watch::Sender<ReaderState>>,
    peer: Option<String>,
}

impl<T> Lifecycle<T> {
    fn new(state: ManagerState, transport: Option<T>) -> Self {
        let (reader_state, _) = watch::channel(ReaderState::NotStarted);
        Self {
            state,
            transport,
            cancel: CancellationToken::new(),
            reader_state: Arc::new(reader_state),
            peer: None,
        }
    }
}

/// Write half plus the token of the connection it belongs to.
struct ArmedWriter<W> {
    writer: FrameWriter<W>,
    cancel: CancellationToken,
    /// Set while a frame is going out. Still set on entry to `send` means the
    /// previous caller dropped its future mid-frame and the peer is waiting
    /// for payload bytes that will never come.
    dirty: bool,
}

impl<W> ArmedWriter<W> {
    fn new(writer: FrameWriter<W>, cancel: CancellationToken) -> Self {
        Self {
            writer,
            cancel,
            dirty: false,
        }
    }
}

/// Owns one link to a peer: its transport, its receive loop and its send path.
///
/// Lifecycle: `initialize` → `connect` → (`send`, messages to the handler) →
/// `terminate`. All methods take `&self`, so the manager can sit in an `Arc`
/// and be driven from several tasks; sends are serialized internally.
pub struct ConnectionManager<T: Transport> {
    factory: TransportFactory<T>,
    config: ManagerConfig,
    lifecycle: Mutex<Lifecycle<T>>,
    writer: tokio::sync::Mutex<Option<ArmedWriter<T::Writer>>>,
    handler: HandlerSlot,
}

impl<T: Transport + Default> ConnectionManager<T> {
    /// Create a manager whose transport is built with `T::default()`.
    pub fn new(config: ManagerConfig) -> Self {
        Self::with_factory(T::default, config)
    }
}

impl<T: Transport + Clone + Sync> ConnectionManager<T> {
    /// Create a manager that clones `transport` on every `initialize`.
    pub fn with_transport(transport: T, config: ManagerConfig) -> Self {
        Self::with_factory(move || transport.clone(), config)
    }
}

impl<T: Transport> ConnectionManager<T> {
    /// Create a manager with an explicit transport factory.
    pub fn with_factory(
        factory: impl Fn() -> T + Send + Sync + 'static,
        config: ManagerConfig,
    ) -> Self {
        Self {
            factory: Box::new(factory),
            config,
            lifecycle: Mutex::new(Lifecycle::new(ManagerState::Uninitialized, None)),
            writer: tokio::sync::Mutex::new(None),
            handler: HandlerSlot::default(),
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle<T>> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a fresh transport and prime the reader.
    ///
    /// A no-op when already initialized. Rejected while connecting or
    /// connected. Allowed after `terminate`, which starts a new link.
    pub fn initialize(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle();
        match lifecycle.state {
            ManagerState::Initialized => {
                debug!("already initialized; ignoring");
                Ok(())
            }
            state @ (ManagerState::Connecting | ManagerState::Connected) => {
                warn!(%state, "refusing to re-initialize an active link");
                Err(ManagerError::AlreadyActive(state))
            }
            ManagerState::Uninitialized | ManagerState::Terminated => {
                let transport = (self.factory)();
                debug!(transport = transport.transport_name(), "initialized link");
                *lifecycle = Lifecycle::new(ManagerState::Initialized, Some(transport));
                Ok(())
            }
        }
    }

    /// Connect to `address` and start the receive loop.
    ///
    /// Only valid after `initialize`. On failure the manager returns to
    /// `Initialized` and the reader stays `NotStarted`, so the caller may
    /// retry. If `terminate` runs while this is pending, the connect is
    /// abandoned and `ManagerError::Terminated` is returned.
    pub async fn connect(&self, address: &T::Address) -> Result<()> {
        let (mut transport, cancel) = {
            let mut lifecycle = self.lifecycle();
            if lifecycle.state != ManagerState::Initialized {
                return Err(ManagerError::InvalidState {
                    expected: ManagerState::Initialized,
                    actual: lifecycle.state,
                });
            }
            let transport = lifecycle
                .transport
                .take()
                .ok_or(ManagerError::InvalidState {
                    expected: ManagerState::Initialized,
                    actual: ManagerState::Uninitialized,
                })?;
            lifecycle.state = ManagerState::Connecting;
            (transport, lifecycle.cancel.clone())
        };

        debug!(?address, transport = transport.transport_name(), "connecting");
        let connect_timeout = self.config.connect_timeout;
        let result = tokio::select! {
            result = transport.connect(address) => result.map_err(ManagerError::from),
            _ = cancel.cancelled() => Err(ManagerError::Terminated),
            _ = sleep_or_pending(connect_timeout) => {
                Err(ManagerError::ConnectTimeout(connect_timeout.unwrap_or_default()))
            }
        };

        let connection = match result {
            Ok(connection) => connection,
            Err(err) => {
                let mut lifecycle = self.lifecycle();
                if lifecycle.state == ManagerState::Connecting && !cancel.is_cancelled() {
                    lifecycle.state = ManagerState::Initialized;
                    lifecycle.transport = Some(transport);
                }
                warn!(?address, error = %err, "connect failed");
                return Err(err);
            }
        };

        let peer = connection.peer.clone();
        let (reader, writer) = connection.into_split();

        {
            let mut slot = self.writer.lock().await;
            if cancel.is_cancelled() {
                debug!(%peer, "terminated while connecting; dropping link");
                return Err(ManagerError::Terminated);
            }
            *slot = Some(ArmedWriter::new(
                FrameWriter::with_config(writer, self.config.frame.clone()),
                cancel.clone(),
            ));
        }

        let mut lifecycle = self.lifecycle();
        if lifecycle.state != ManagerState::Connecting || cancel.is_cancelled() {
            // The armed writer carries a cancelled token; `send` discards it.
            debug!(%peer, "terminated while connecting; dropping link");
            return Err(ManagerError::Terminated);
        }

        lifecycle.reader_state.send_replace(ReaderState::Running);
        let task = ReaderTask {
            reader: FrameReader::with_config(reader, self.config.frame.clone()),
            handler: self.handler.clone(),
            cancel,
            state: Arc::clone(&lifecycle.reader_state),
            read_timeout: self.config.read_timeout,
            peer: peer.clone(),
        };
        // Detached: the loop observes the token on its own.
        drop(task.spawn());
        lifecycle.transport = Some(transport);
        lifecycle.peer = Some(peer.clone());
        lifecycle.state = ManagerState::Connected;

        info!(%peer, "link connected");
        Ok(())
    }

    /// Close the link and stop the receive loop.
    ///
    /// Releases any pending read or write, then shuts down the write half.
    /// Does not wait for the receive loop to finish; once this returns no new
    /// message reaches the handler (one already inside it may complete).
    /// Safe to call repeatedly and in any state.
    pub async fn terminate(&self) {
        if self.cancel_link() {
            self.release_writer().await;
        }
    }

    /// Synchronous part of `terminate`. Returns false when there was nothing
    /// to tear down.
    fn cancel_link(&self) -> bool {
        let mut lifecycle = self.lifecycle();
        match lifecycle.state {
            ManagerState::Uninitialized => {
                debug!("terminate on uninitialized manager; nothing to do");
                return false;
            }
            ManagerState::Terminated => {
                debug!("already terminated");
                return false;
            }
            _ => {}
        }

        let previous = lifecycle.state;
        lifecycle.state = ManagerState::Terminated;
        lifecycle.transport = None;
        lifecycle.peer = None;
        lifecycle.reader_state.send_if_modified(|state| {
            if *state == ReaderState::Running {
                *state = ReaderState::CancelRequested;
                true
            } else {
                false
            }
        });
        lifecycle.cancel.cancel();
        info!(state = %previous, "terminating link");
        true
    }

    /// Shut down the write half of a cancelled link.
    ///
    /// A newer link may have armed the slot since the link was cancelled;
    /// its token is live, so it is left alone.
    async fn release_writer(&self) {
        let armed = {
            let mut slot = self.writer.lock().await;
            if slot
                .as_ref()
                .is_some_and(|armed| armed.cancel.is_cancelled())
            {
                slot.take()
            } else {
                None
            }
        };
        if let Some(mut armed) = armed {
            if let Err(err) = armed.writer.shutdown().await {
                debug!(error = %err, "write half shutdown failed");
            }
        }
    }

    /// Send one command to the peer.
    ///
    /// Returns the number of payload bytes written (excluding the length
    /// byte). Returns `Ok(0)` without error when no link is up. Concurrent
    /// calls are serialized, so frames never interleave on the wire.
    ///
    /// Dropping the returned future mid-frame leaves a partial frame on the
    /// wire. The link cannot recover from that: every later `send` fails
    /// with `ManagerError::Write` until `terminate`.
    pub async fn send(&self, command: &str) -> Result<usize> {
        let mut slot = self.writer.lock().await;
        if slot
            .as_ref()
            .is_some_and(|armed| armed.cancel.is_cancelled())
        {
            *slot = None;
        }
        let Some(armed) = slot.as_mut() else {
            debug!("not connected; nothing sent");
            return Ok(0);
        };

        if armed.dirty {
            warn!("previous send abandoned mid-frame; link is out of sync");
            return Err(ManagerError::Write(FrameError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "previous send abandoned mid-frame",
            ))));
        }

        let cancel = armed.cancel.clone();
        armed.dirty = true;
        let result = tokio::select! {
            result = armed.writer.send(command) => result,
            _ = cancel.cancelled() => return Err(ManagerError::Terminated),
        };

        match result {
            Ok(written) => {
                armed.dirty = false;
                trace!(bytes = written, "sent command");
                Ok(written)
            }
            Err(err) => {
                // Size checks fail before any byte is written.
                if matches!(err, FrameError::OversizedCommand { .. }) {
                    armed.dirty = false;
                }
                let err = ManagerError::from_send(err);
                warn!(error = %err, "send failed");
                Err(err)
            }
        }
    }

    /// Register the message consumer, replacing any previous one.
    pub fn set_handler(&self, handler: impl MessageHandler + 'static) {
        self.handler.set(Arc::new(handler));
    }

    /// Remove the message consumer; later messages are dropped.
    pub fn clear_handler(&self) {
        self.handler.clear();
    }

    /// Register a channel-backed consumer and return its receiver.
    pub fn message_channel(&self) -> mpsc::UnboundedReceiver<String> {
        let (handler, rx) = channel_handler();
        self.set_handler(handler);
        rx
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ManagerState {
        self.lifecycle().state
    }

    /// True while connected.
    pub fn is_connected(&self) -> bool {
        self.state() == ManagerState::Connected
    }

    /// Current receive loop state.
    pub fn reader_state(&self) -> ReaderState {
        *self.lifecycle().reader_state.borrow()
    }

    /// Watch receive loop state changes for the current link.
    pub fn reader_state_watch(&self) -> watch::Receiver<ReaderState> {
        self.lifecycle().reader_state.subscribe()
    }

    /// Wait until the current link's receive loop is not running.
    ///
    /// Returns immediately if it never started.
    pub async fn wait_reader_stopped(&self) {
        let mut rx = self.reader_state_watch();
        // An error means the sender is gone, which only happens once the
        // loop is over.
        let _ = rx.wait_for(|state| state.is_idle()).await;
    }

    /// Description of the connected peer.
    pub fn peer(&self) -> Option<String> {
        self.lifecycle().peer.clone()
    }

    /// Configuration this manager was built with.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }
}

impl<T: Transport> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        let lifecycle = self
            .lifecycle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        lifecycle.cancel.cancel();
    }
}

async fn sleep_or_pending(limit: Option<std::time::Duration>) {
    match limit {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending().await,
    }
}
