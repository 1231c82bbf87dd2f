use std::io::ErrorKind;
use std::sync::{Arc, Mutex};

use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{Connection, Transport};

/// Default in-memory buffer size per direction.
pub const DEFAULT_DUPLEX_BUFFER: usize = 4 * 1024;

/// In-memory transport backed by [`tokio::io::duplex`].
///
/// [`DuplexTransport::pair`] returns the transport plus the remote end of the
/// pipe, which plays the peer. The local end is handed out by the first
/// successful `connect`; clones share the same slot, so a cloned transport
/// cannot connect twice.
#[derive(Debug, Clone)]
pub struct DuplexTransport {
    local: Arc<Mutex<Option<DuplexStream>>>,
    reachable: bool,
}

impl DuplexTransport {
    /// Create a connected pair: the transport and the peer's end.
    pub fn pair(max_buf_size: usize) -> (Self, DuplexStream) {
        let (local, remote) = tokio::io::duplex(max_buf_size);
        let transport = Self {
            local: Arc::new(Mutex::new(Some(local))),
            reachable: true,
        };
        (transport, remote)
    }

    /// A transport whose peer never answers; every `connect` is refused.
    pub fn unreachable() -> Self {
        Self {
            local: Arc::new(Mutex::new(None)),
            reachable: false,
        }
    }

    fn take_local(&self) -> Option<DuplexStream> {
        self.local.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl Transport for DuplexTransport {
    type Address = String;
    type Reader = ReadHalf<DuplexStream>;
    type Writer = WriteHalf<DuplexStream>;

    async fn connect(
        &mut self,
        address: &String,
    ) -> Result<Connection<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>> {
        if !self.reachable {
            return Err(TransportError::Connect {
                address: address.clone(),
                source: std::io::Error::new(ErrorKind::ConnectionRefused, "peer unreachable"),
            });
        }

        let stream = self.take_local().ok_or(TransportError::Shutdown)?;
        debug!(%address, "connected in-memory link");
        let (reader, writer) = tokio::io::split(stream);
        Ok(Connection::new(reader, writer, address.clone()))
    }

    fn transport_name(&self) -> &'static str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn connect_hands_out_local_end() {
        let (mut transport, mut remote) = DuplexTransport::pair(DEFAULT_DUPLEX_BUFFER);
        let conn = transport.connect(&"mcu".to_string()).await.unwrap();
        assert_eq!(conn.peer, "mcu");

        let (mut reader, mut writer) = conn.into_split();
        writer.write_all(b"\x01A").await.unwrap();
        let mut buf = [0u8; 2];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"\x01A");

        remote.write_all(b"\x00").await.unwrap();
        assert_eq!(reader.read_u8().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn second_connect_is_shutdown() {
        let (transport, _remote) = DuplexTransport::pair(DEFAULT_DUPLEX_BUFFER);
        let mut first = transport.clone();
        let mut second = transport;

        first.connect(&"a".to_string()).await.unwrap();
        let err = second.connect(&"a".to_string()).await.unwrap_err();
        assert!(matches!(err, TransportError::Shutdown));
    }

    #[tokio::test]
    async fn unreachable_refuses() {
        let err = DuplexTransport::unreachable()
            .connect(&"nowhere".to_string())
            .await
            .unwrap_err();
        match err {
            TransportError::Connect { address, source } => {
                assert_eq!(address, "nowhere");
                assert_eq!(source.kind(), ErrorKind::ConnectionRefused);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
