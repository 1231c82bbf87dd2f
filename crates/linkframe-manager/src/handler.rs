//! Message-received notification.
//!
//! One consumer per manager. Closures taking a `String` are handlers; for
//! async consumers, [`channel_handler`] turns delivery into an mpsc stream.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::trace;

/// Receives decoded messages, one call per frame, in wire order.
///
/// Called on the receive loop's task: the next frame is not read until this
/// returns, so slow handlers apply backpressure to the link. A panic ends the
/// receive loop.
pub trait MessageHandler: Send + Sync {
    fn on_message(&self, message: String);
}

impl<F> MessageHandler for F
where
    F: Fn(String) + Send + Sync,
{
    fn on_message(&self, message: String) {
        self(message)
    }
}

/// Forwards messages into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<String>,
}

impl MessageHandler for ChannelHandler {
    fn on_message(&self, message: String) {
        if self.tx.send(message).is_err() {
            trace!("message receiver dropped; discarding message");
        }
    }
}

/// Create a channel-backed handler and the receiver that drains it.
pub fn channel_handler() -> (ChannelHandler, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelHandler { tx }, rx)
}

/// Registration slot shared between the manager and its receive loop.
#[derive(Clone, Default)]
pub(crate) struct HandlerSlot {
    inner: Arc<RwLock<Option<Arc<dyn MessageHandler>>>>,
}

impl HandlerSlot {
    pub(crate) fn set(&self, handler: Arc<dyn MessageHandler>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    pub(crate) fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Snapshot of the current handler; the lock is not held while calling it.
    pub(crate) fn current(&self) -> Option<Arc<dyn MessageHandler>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn closures_are_handlers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler = move |message: String| sink.lock().unwrap().push(message);

        handler.on_message("A".to_string());
        handler.on_message("BC".to_string());
        assert_eq!(*seen.lock().unwrap(), vec!["A", "BC"]);
    }

    #[test]
    fn channel_handler_forwards() {
        let (handler, mut rx) = channel_handler();
        handler.on_message("ready".to_string());
        assert_eq!(rx.try_recv().unwrap(), "ready");
    }

    #[test]
    fn channel_handler_tolerates_dropped_receiver() {
        let (handler, rx) = channel_handler();
        drop(rx);
        handler.on_message("lost".to_string());
    }

    #[test]
    fn slot_replaces_and_clears() {
        let slot = HandlerSlot::default();
        assert!(slot.current().is_none());

        let (first, mut first_rx) = channel_handler();
        let (second, mut second_rx) = channel_handler();
        slot.set(Arc::new(first));
        slot.set(Arc::new(second));

        slot.current().unwrap().on_message("x".to_string());
        assert!(first_rx.try_recv().is_err());
        assert_eq!(second_rx.try_recv().unwrap(), "x");

        slot.clear();
        assert!(slot.current().is_none());
    }
}
