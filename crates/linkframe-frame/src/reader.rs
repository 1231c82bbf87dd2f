use std::io::ErrorKind;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::codec::{decode_frame, Frame, FrameConfig, HEADER_SIZE, MAX_PAYLOAD};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = HEADER_SIZE + MAX_PAYLOAD;

/// Reads complete frames from any `AsyncRead` stream.
///
/// Handles partial reads internally; callers always get complete frames.
/// [`FrameReader::read_frame`] is cancel safe: dropping it mid-read loses no
/// bytes, so it can sit inside `tokio::select!` or a timeout.
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
    config: FrameConfig,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: R, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF falls on a frame
    /// boundary and `Err(FrameError::Truncated)` when it falls inside one.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf) {
                return Ok(frame);
            }

            self.buf.reserve(INITIAL_BUFFER_CAPACITY);
            let read = match self.inner.read_buf(&mut self.buf).await {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(self.eof_error());
            }
        }
    }

    /// Read the next frame and decode it as text.
    pub async fn read_message(&mut self) -> Result<String> {
        let frame = self.read_frame().await?;
        frame.text(self.config.encoding)
    }

    fn eof_error(&self) -> FrameError {
        match self.buf.first() {
            None => FrameError::ConnectionClosed,
            Some(&len) => FrameError::Truncated {
                expected: len as usize,
                received: self.buf.len() - HEADER_SIZE,
            },
        }
    }

    /// Bytes received but not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
