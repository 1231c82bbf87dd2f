use futures_util::{SinkExt, StreamExt};
use linkframe_frame::{Frame, FrameError, LinkCodec};
use linkframe_transport::{Connection, TcpLinkListener};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::cmd::{EchoArgs, LinkOptions};
use crate::exit::{frame_error, io_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_listening, OutputFormat};

/// How a peer session ended.
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    /// The peer went away; wait for the next one.
    Disconnected,
    /// The echo budget is spent.
    CountReached,
}

pub async fn run(args: EchoArgs, link: LinkOptions, format: OutputFormat) -> CliResult<i32> {
    let listener = TcpLinkListener::bind(&args.address)
        .await
        .map_err(|err| transport_error("bind failed", err))?;
    print_listening(listener.local_addr(), format);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut remaining = args.count;
    loop {
        let connection = tokio::select! {
            signal = &mut shutdown => {
                return signal
                    .map(|()| SUCCESS)
                    .map_err(|err| io_error("signal handler setup failed", err));
            }
            accepted = listener.accept() => {
                accepted.map_err(|err| transport_error("accept failed", err))?
            }
        };

        let peer = connection.peer.clone();
        tracing::info!(%peer, "peer connected");

        let end = tokio::select! {
            signal = &mut shutdown => {
                return signal
                    .map(|()| SUCCESS)
                    .map_err(|err| io_error("signal handler setup failed", err));
            }
            end = echo_session(connection, link, &mut remaining) => end?,
        };

        match end {
            SessionEnd::CountReached => return Ok(SUCCESS),
            SessionEnd::Disconnected => tracing::info!(%peer, "peer disconnected"),
        }
    }
}

/// Echo every frame from one peer back to it, unchanged.
///
/// Payloads that do not decode end the session, the same way the host side
/// treats them.
async fn echo_session<R, W>(
    connection: Connection<R, W>,
    link: LinkOptions,
    remaining: &mut Option<usize>,
) -> CliResult<SessionEnd>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let codec = LinkCodec::with_config(link.frame_config());
    let (reader, writer) = connection.into_split();
    let mut inbound = FramedRead::new(reader, codec.clone());
    let mut outbound = FramedWrite::new(writer, codec);

    if *remaining == Some(0) {
        return Ok(SessionEnd::CountReached);
    }

    while let Some(next) = inbound.next().await {
        let frame: Frame = match next {
            Ok(frame) => frame,
            Err(err) if err.is_disconnect() => {
                tracing::debug!(error = %err, "peer closed mid-frame");
                return Ok(SessionEnd::Disconnected);
            }
            Err(FrameError::Io(err)) => {
                tracing::warn!(error = %err, "read failed; dropping peer");
                return Ok(SessionEnd::Disconnected);
            }
            Err(err) => return Err(frame_error("receive failed", err)),
        };

        match frame.text(link.encoding) {
            Ok(text) => tracing::info!(size = frame.len(), message = %text, "echoing message"),
            Err(err) => {
                tracing::warn!(error = %err, "undecodable payload; dropping peer");
                return Ok(SessionEnd::Disconnected);
            }
        }

        if let Err(err) = outbound.send(frame).await {
            if matches!(err, FrameError::Io(_)) || err.is_disconnect() {
                tracing::warn!(error = %err, "echo failed; dropping peer");
                return Ok(SessionEnd::Disconnected);
            }
            return Err(frame_error("echo send failed", err));
        }

        if let Some(left) = remaining {
            *left = left.saturating_sub(1);
            if *left == 0 {
                return Ok(SessionEnd::CountReached);
            }
        }
    }

    Ok(SessionEnd::Disconnected)
}
