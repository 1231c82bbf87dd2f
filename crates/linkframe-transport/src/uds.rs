use std::path::PathBuf;

use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{Connection, Transport};

/// Unix domain socket transport.
///
/// Useful when a local daemon owns the radio device and re-exports the
/// serial stream as a socket.
#[derive(Debug, Clone, Default)]
pub struct UnixTransport;

impl UnixTransport {
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    pub fn new() -> Self {
        Self
    }
}

impl Transport for UnixTransport {
    type Address = PathBuf;
    type Reader = OwnedReadHalf;
    type Writer = OwnedWriteHalf;

    async fn connect(
        &mut self,
        address: &PathBuf,
    ) -> Result<Connection<OwnedReadHalf, OwnedWriteHalf>> {
        let path_bytes = address.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                address: address.display().to_string(),
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        let stream = UnixStream::connect(address)
            .await
            .map_err(|e| TransportError::Connect {
                address: address.display().to_string(),
                source: e,
            })?;
        debug!(path = ?address, "connected to unix domain socket");

        let (reader, writer) = stream.into_split();
        Ok(Connection::new(reader, writer, address.display().to_string()))
    }

    fn transport_name(&self) -> &'static str {
        "unix-domain-socket"
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    use super::*;

    #[tokio::test]
    async fn test_connect_and_write() {
        let dir = std::env::temp_dir().join(format!("linkframe-uds-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let sock_path = dir.join("link.sock");
        let _ = std::fs::remove_file(&sock_path);

        let listener = UnixListener::bind(&sock_path).unwrap();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 3];
            stream.read_exact(&mut buf).await.unwrap();
            buf
        });

        let mut transport = UnixTransport::new();
        let conn = transport.connect(&sock_path).await.unwrap();
        let (_reader, mut writer) = conn.into_split();
        writer.write_all(b"\x02ok").await.unwrap();

        assert_eq!(&server.await.unwrap(), b"\x02ok");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_path_too_long() {
        let long_path = PathBuf::from("/tmp/".to_string() + &"a".repeat(200) + ".sock");
        let result = UnixTransport::new().connect(&long_path).await;
        assert!(matches!(result, Err(TransportError::PathTooLong { .. })));
    }

    #[tokio::test]
    async fn test_connect_missing_socket() {
        let path = std::env::temp_dir().join(format!(
            "linkframe-missing-{}.sock",
            std::process::id()
        ));
        let result = UnixTransport::new().connect(&path).await;
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }
}
