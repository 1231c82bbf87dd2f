use std::net::SocketAddr;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{Connection, Transport};

/// TCP transport.
///
/// Stands in for a serial-port-profile radio link when the peer sits behind a
/// TCP bridge (or a simulator). Commands are short, so Nagle is disabled by
/// default.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    nodelay: bool,
}

impl TcpTransport {
    /// Create a TCP transport with `TCP_NODELAY` enabled.
    pub fn new() -> Self {
        Self { nodelay: true }
    }

    /// Override `TCP_NODELAY`.
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for TcpTransport {
    type Address = String;
    type Reader = OwnedReadHalf;
    type Writer = OwnedWriteHalf;

    async fn connect(
        &mut self,
        address: &String,
    ) -> Result<Connection<OwnedReadHalf, OwnedWriteHalf>> {
        let stream =
            TcpStream::connect(address.as_str())
                .await
                .map_err(|e| TransportError::Connect {
                    address: address.clone(),
                    source: e,
                })?;
        stream.set_nodelay(self.nodelay)?;
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| address.clone());
        debug!(%peer, "connected over tcp");

        let (reader, writer) = stream.into_split();
        Ok(Connection::new(reader, writer, peer))
    }

    fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

/// Accepts TCP links, for running a simulated peer.
pub struct TcpLinkListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpLinkListener {
    /// Bind a listener. Use port 0 to let the OS pick one.
    pub async fn bind(address: &str) -> Result<Self> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|e| TransportError::Bind {
                address: address.to_string(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "listening for tcp links");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept the next link.
    pub async fn accept(&self) -> Result<Connection<OwnedReadHalf, OwnedWriteHalf>> {
        let (stream, addr) = self.listener.accept().await.map_err(TransportError::Accept)?;
        stream.set_nodelay(true)?;
        debug!(peer = %addr, "accepted tcp link");
        let (reader, writer) = stream.into_split();
        Ok(Connection::new(reader, writer, addr.to_string()))
    }

    /// The bound address (with the OS-assigned port resolved).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn test_bind_accept_connect() {
        let listener = TcpLinkListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().to_string();

        let server = tokio::spawn(async move {
            let conn = listener.accept().await.unwrap();
            let (mut reader, _writer) = conn.into_split();
            let mut buf = [0u8; 5];
            reader.read_exact(&mut buf).await.unwrap();
            buf
        });

        let mut transport = TcpTransport::new();
        let conn = transport.connect(&address).await.unwrap();
        assert_eq!(conn.peer, address);
        let (_reader, mut writer) = conn.into_split();
        writer.write_all(b"hello").await.unwrap();

        assert_eq!(&server.await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_connect_refused_reports_address() {
        // Bind then drop so the port is (very likely) closed.
        let listener = TcpLinkListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().to_string();
        drop(listener);

        let mut transport = TcpTransport::new();
        let err = transport.connect(&address).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect { address: a, .. } if a == address));
    }

    #[tokio::test]
    async fn test_bind_invalid_address() {
        let result = TcpLinkListener::bind("not an address").await;
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }

    #[test]
    fn test_transport_name() {
        assert_eq!(TcpTransport::default().transport_name(), "tcp");
    }
}
