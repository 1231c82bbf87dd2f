//! Background receive loop.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use linkframe_frame::{FrameError, FrameReader};
use tokio::io::AsyncRead;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::handler::HandlerSlot;
use crate::state::ReaderState;

/// Why the receive loop stopped.
#[derive(Debug)]
enum LoopEnd {
    Cancelled,
    Closed,
    Truncated { expected: usize, received: usize },
    Failed(FrameError),
    IdleTimeout(Duration),
    HandlerPanicked(String),
}

impl From<FrameError> for LoopEnd {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::ConnectionClosed => Self::Closed,
            FrameError::Truncated { expected, received } => Self::Truncated { expected, received },
            other => Self::Failed(other),
        }
    }
}

/// One receive loop bound to one connection.
pub(crate) struct ReaderTask<R> {
    pub(crate) reader: FrameReader<R>,
    pub(crate) handler: HandlerSlot,
    pub(crate) cancel: CancellationToken,
    pub(crate) state: Arc<watch::Sender<ReaderState>>,
    pub(crate) read_timeout: Option<Duration>,
    pub(crate) peer: String,
}

impl<R> ReaderTask<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    /// Launch the loop as an independent task. The caller must already have
    /// moved the state to `Running`.
    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let (end, delivered) = self.receive_loop().await;

        match &end {
            LoopEnd::Cancelled => debug!(peer = %self.peer, "receive loop cancelled"),
            LoopEnd::Closed => debug!(peer = %self.peer, "peer closed the link"),
            LoopEnd::Truncated { expected, received } => debug!(
                peer = %self.peer,
                expected,
                received,
                "link closed mid-frame"
            ),
            LoopEnd::Failed(err @ FrameError::InvalidText { .. }) => warn!(
                peer = %self.peer,
                error = %err,
                "undecodable payload; stopping receive loop"
            ),
            LoopEnd::Failed(err) => warn!(
                peer = %self.peer,
                error = %err,
                "read failed; stopping receive loop"
            ),
            LoopEnd::IdleTimeout(limit) => warn!(
                peer = %self.peer,
                timeout = ?limit,
                "no frame within read timeout; stopping receive loop"
            ),
            LoopEnd::HandlerPanicked(reason) => error!(
                peer = %self.peer,
                panic = %reason,
                "message handler panicked; stopping receive loop"
            ),
        }

        self.state.send_replace(ReaderState::Stopped);
        debug!(peer = %self.peer, delivered, "receive loop stopped");
    }

    async fn receive_loop(&mut self) -> (LoopEnd, u64) {
        let mut delivered = 0u64;
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return (LoopEnd::Cancelled, delivered),
                result = next_message(&mut self.reader, self.read_timeout) => result,
            };
            let message = match next {
                Ok(message) => message,
                Err(end) => return (end, delivered),
            };

            // `terminate` may have run while the frame was being read.
            if self.cancel.is_cancelled() {
                trace!("dropping message received after terminate");
                return (LoopEnd::Cancelled, delivered);
            }

            let Some(handler) = self.handler.current() else {
                debug!(len = message.len(), "no message handler registered; dropping message");
                continue;
            };

            trace!(len = message.len(), "delivering message");
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler.on_message(message))) {
                return (LoopEnd::HandlerPanicked(panic_reason(panic.as_ref())), delivered);
            }
            delivered += 1;
        }
    }
}

async fn next_message<R>(
    reader: &mut FrameReader<R>,
    read_timeout: Option<Duration>,
) -> Result<String, LoopEnd>
where
    R: AsyncRead + Unpin,
{
    let result = match read_timeout {
        Some(limit) => match tokio::time::timeout(limit, reader.read_message()).await {
            Ok(result) => result,
            Err(_) => return Err(LoopEnd::IdleTimeout(limit)),
        },
        None => reader.read_message().await,
    };
    result.map_err(LoopEnd::from)
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(reason) = panic.downcast_ref::<&str>() {
        (*reason).to_string()
    } else if let Some(reason) = panic.downcast_ref::<String>() {
        reason.clone()
    } else {
        "unknown panic".to_string()
    }
}
