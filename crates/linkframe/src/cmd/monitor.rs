use linkframe_manager::{ConnectionManager, ManagerConfig};
use linkframe_transport::TcpTransport;

use crate::cmd::{parse_duration, LinkOptions, MonitorArgs};
use crate::exit::{io_error, manager_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub async fn run(args: MonitorArgs, link: LinkOptions, format: OutputFormat) -> CliResult<i32> {
    let config = ManagerConfig {
        frame: link.frame_config(),
        connect_timeout: Some(parse_duration(&args.timeout)?),
        read_timeout: None,
    };
    let manager = ConnectionManager::<TcpTransport>::new(config);
    let mut messages = manager.message_channel();

    manager
        .initialize()
        .map_err(|err| manager_error("initialize failed", err))?;
    manager
        .connect(&args.address)
        .await
        .map_err(|err| manager_error("connect failed", err))?;
    let peer = manager.peer().unwrap_or_else(|| args.address.clone());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut printed = 0usize;
    let outcome = loop {
        if args.count.is_some_and(|count| printed >= count) {
            break Ok(SUCCESS);
        }

        tokio::select! {
            biased;
            signal = &mut shutdown => {
                break match signal {
                    Ok(()) => {
                        tracing::info!(printed, "interrupted; closing link");
                        Ok(SUCCESS)
                    }
                    Err(err) => Err(io_error("signal handler setup failed", err)),
                };
            }
            Some(message) = messages.recv() => {
                print_message(&message, &peer, link.encoding, format);
                printed = printed.saturating_add(1);
            }
            _ = manager.wait_reader_stopped() => {
                while let Ok(message) = messages.try_recv() {
                    print_message(&message, &peer, link.encoding, format);
                    printed = printed.saturating_add(1);
                }
                tracing::info!(printed, "receive loop stopped");
                break match args.count {
                    Some(count) if printed < count => Err(CliError::new(
                        FAILURE,
                        format!("link closed after {printed} of {count} messages"),
                    )),
                    _ => Ok(SUCCESS),
                };
            }
        }
    };

    manager.terminate().await;
    outcome
}
