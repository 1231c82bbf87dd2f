use std::time::Duration;

use linkframe_manager::{ConnectionManager, ManagerConfig};
use linkframe_transport::{TcpTransport, Transport};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::cmd::{parse_duration, LinkOptions, SendArgs};
use crate::exit::{manager_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT};
use crate::output::{print_message, OutputFormat};

pub async fn run(args: SendArgs, link: LinkOptions, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let config = ManagerConfig {
        frame: link.frame_config(),
        connect_timeout: Some(timeout),
        read_timeout: None,
    };
    let manager = ConnectionManager::<TcpTransport>::new(config);
    let mut replies = manager.message_channel();

    manager
        .initialize()
        .map_err(|err| manager_error("initialize failed", err))?;
    manager
        .connect(&args.address)
        .await
        .map_err(|err| manager_error("connect failed", err))?;

    let result = exchange(&manager, &mut replies, &args, link, format, timeout).await;
    manager.terminate().await;
    result
}

async fn exchange<T: Transport>(
    manager: &ConnectionManager<T>,
    replies: &mut UnboundedReceiver<String>,
    args: &SendArgs,
    link: LinkOptions,
    format: OutputFormat,
    timeout: Duration,
) -> CliResult<i32> {
    let written = manager
        .send(&args.command)
        .await
        .map_err(|err| manager_error("send failed", err))?;
    tracing::info!(bytes = written, "command sent");

    let peer = manager.peer().unwrap_or_else(|| args.address.clone());
    for received in 0..args.wait {
        match next_reply(manager, replies, timeout).await? {
            Some(message) => print_message(&message, &peer, link.encoding, format),
            None => {
                return Err(CliError::new(
                    FAILURE,
                    format!("link closed after {received} of {} replies", args.wait),
                ))
            }
        }
    }

    Ok(SUCCESS)
}

/// Next reply, `None` once the receive loop has stopped and nothing is left.
async fn next_reply<T: Transport>(
    manager: &ConnectionManager<T>,
    replies: &mut UnboundedReceiver<String>,
    timeout: Duration,
) -> CliResult<Option<String>> {
    tokio::select! {
        biased;
        message = replies.recv() => Ok(message),
        _ = manager.wait_reader_stopped() => Ok(replies.try_recv().ok()),
        _ = tokio::time::sleep(timeout) => Err(CliError::new(
            TIMEOUT,
            format!("no reply within {timeout:?}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use linkframe_transport::{DuplexTransport, DEFAULT_DUPLEX_BUFFER};
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    use super::*;

    async fn connected() -> (
        ConnectionManager<DuplexTransport>,
        UnboundedReceiver<String>,
        DuplexStream,
    ) {
        let (transport, remote) = DuplexTransport::pair(DEFAULT_DUPLEX_BUFFER);
        let manager = ConnectionManager::with_transport(transport, ManagerConfig::default());
        let replies = manager.message_channel();
        manager.initialize().expect("initialize should succeed");
        manager
            .connect(&"mcu".to_string())
            .await
            .expect("connect should succeed");
        (manager, replies, remote)
    }

    #[tokio::test]
    async fn next_reply_returns_pending_message() {
        let (manager, mut replies, mut remote) = connected().await;
        remote.write_all(b"\x02OK").await.unwrap();

        let reply = next_reply(&manager, &mut replies, Duration::from_secs(2))
            .await
            .expect("reply should arrive");
        assert_eq!(reply.as_deref(), Some("OK"));
        manager.terminate().await;
    }

    #[tokio::test]
    async fn next_reply_times_out() {
        let (manager, mut replies, _remote) = connected().await;
        let err = next_reply(&manager, &mut replies, Duration::from_millis(20))
            .await
            .expect_err("silent peer should time out");
        assert_eq!(err.code, TIMEOUT);
        manager.terminate().await;
    }

    #[tokio::test]
    async fn next_reply_drains_message_sent_before_close() {
        let (manager, mut replies, mut remote) = connected().await;
        remote.write_all(b"\x03bye").await.unwrap();
        drop(remote);

        let first = next_reply(&manager, &mut replies, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(first.as_deref(), Some("bye"));
        let second = next_reply(&manager, &mut replies, Duration::from_secs(2))
            .await
            .unwrap();
        assert!(second.is_none());
        manager.terminate().await;
    }

    #[tokio::test]
    async fn exchange_sends_then_collects_replies() {
        let (manager, mut replies, mut remote) = connected().await;
        let args = SendArgs {
            address: "mcu".to_string(),
            command: "PING".to_string(),
            wait: 1,
            timeout: "2s".to_string(),
        };
        let link = LinkOptions {
            encoding: Default::default(),
            oversize: Default::default(),
        };

        let peer = tokio::spawn(async move {
            let mut request = [0u8; 5];
            remote.read_exact(&mut request).await.unwrap();
            assert_eq!(&request, b"\x04PING");
            remote.write_all(b"\x04PONG").await.unwrap();
            remote
        });

        let code = exchange(
            &manager,
            &mut replies,
            &args,
            link,
            OutputFormat::Raw,
            Duration::from_secs(2),
        )
        .await
        .expect("exchange should succeed");
        assert_eq!(code, SUCCESS);
        let _remote = peer.await.unwrap();
        manager.terminate().await;
    }
}
