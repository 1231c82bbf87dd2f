use std::fmt;
use std::future::Future;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

/// A connected duplex stream, already split into independent halves.
///
/// The read half is owned by exactly one receive loop; the write half is
/// owned by the send path. Dropping both halves closes the link.
pub struct Connection<R, W> {
    /// Input side of the stream.
    pub reader: R,
    /// Output side of the stream.
    pub writer: W,
    /// Human-readable description of the remote end, for diagnostics.
    pub peer: String,
}

impl<R, W> Connection<R, W> {
    /// Bundle two halves into a connection.
    pub fn new(reader: R, writer: W, peer: impl Into<String>) -> Self {
        Self {
            reader,
            writer,
            peer: peer.into(),
        }
    }

    /// Split the connection back into `(reader, writer)`.
    pub fn into_split(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl<R, W> fmt::Debug for Connection<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

/// A link transport that can establish one duplex byte stream to a peer.
///
/// This is the seam between the framing layer and whatever carries the bytes:
/// a radio socket, TCP, a Unix socket, or an in-memory pipe in tests.
pub trait Transport: Send + 'static {
    /// Peer address understood by this transport.
    type Address: fmt::Debug + Send + Sync;
    /// Input half produced by [`Transport::connect`].
    type Reader: AsyncRead + Unpin + Send + 'static;
    /// Output half produced by [`Transport::connect`].
    type Writer: AsyncWrite + Unpin + Send + 'static;

    /// Connect to `address`. May suspend for as long as the underlying
    /// transport needs; no timeout is applied here.
    fn connect(
        &mut self,
        address: &Self::Address,
    ) -> impl Future<Output = Result<Connection<Self::Reader, Self::Writer>>> + Send;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}
