//! Drive a simulated microcontroller over an in-memory link.
//!
//! The "device" answers `LED ON`, `LED OFF` and `TEMP?`; everything else
//! gets `ERR`. Run with `cargo run -p linkframe --example led-console`.

use linkframe::frame::{FrameError, FrameReader, FrameWriter};
use linkframe::manager::{ConnectionManager, ManagerConfig};
use linkframe::transport::{DuplexTransport, DEFAULT_DUPLEX_BUFFER};
use tokio::io::DuplexStream;

async fn device(stream: DuplexStream) -> Result<(), FrameError> {
    let (reader, writer) = tokio::io::split(stream);
    let mut commands = FrameReader::new(reader);
    let mut replies = FrameWriter::new(writer);
    let mut led = false;

    loop {
        let command = match commands.read_message().await {
            Ok(command) => command,
            Err(err) if err.is_disconnect() => return Ok(()),
            Err(err) => return Err(err),
        };
        let reply = match command.as_str() {
            "LED ON" => {
                led = true;
                "OK LED=1".to_string()
            }
            "LED OFF" => {
                led = false;
                "OK LED=0".to_string()
            }
            "TEMP?" => format!("TEMP 21.5 LED={}", u8::from(led)),
            _ => "ERR".to_string(),
        };
        replies.send(&reply).await?;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (transport, device_end) = DuplexTransport::pair(DEFAULT_DUPLEX_BUFFER);
    let device = tokio::spawn(device(device_end));

    let manager = ConnectionManager::with_transport(transport, ManagerConfig::default());
    let mut replies = manager.message_channel();
    manager.initialize()?;
    manager.connect(&"led-board".to_string()).await?;

    for command in ["LED ON", "TEMP?", "LED OFF", "REBOOT"] {
        let written = manager.send(command).await?;
        let reply = replies.recv().await.ok_or("receive loop stopped")?;
        println!("> {command} ({written} bytes)\n< {reply}");
    }

    manager.terminate().await;
    manager.wait_reader_stopped().await;
    device.await??;
    Ok(())
}
