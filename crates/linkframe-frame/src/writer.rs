use std::io::ErrorKind;

use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::codec::{encode_command, encode_frame, Frame, FrameConfig, HEADER_SIZE, MAX_PAYLOAD};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = HEADER_SIZE + MAX_PAYLOAD;

/// Writes complete frames to any `AsyncWrite` stream.
///
/// The length byte and payload go out in one buffered write followed by a
/// flush. Callers sharing a writer must serialize access themselves.
pub struct FrameWriter<W> {
    inner: W,
    buf: BytesMut,
    config: FrameConfig,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: W) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: W, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and send a text command.
    ///
    /// Returns the number of payload bytes written, excluding the length
    /// byte. Under [`crate::OversizePolicy::Truncate`] this is the truncated
    /// length.
    pub async fn send(&mut self, command: &str) -> Result<usize> {
        let payload = encode_command(command, &self.config)?;
        self.write_payload(&payload).await?;
        Ok(payload.len())
    }

    /// Write a complete frame.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.write_payload(frame.payload.as_ref()).await
    }

    async fn write_payload(&mut self, payload: &[u8]) -> Result<()> {
        let max = self.config.effective_max_payload();
        if payload.len() > max {
            return Err(FrameError::OversizedCommand {
                size: payload.len(),
                max,
            });
        }

        self.buf.clear();
        encode_frame(payload, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]).await {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush().await
    }

    /// Flush the underlying stream.
    pub async fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush().await {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Shut down the write side of the stream, signalling EOF to the peer.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await.map_err(FrameError::Io)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
