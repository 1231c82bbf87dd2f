use std::io::{IsTerminal, Write};
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use linkframe_frame::TextEncoding;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    event: &'static str,
    peer: &'a str,
    encoding: String,
    size: usize,
    message: &'a str,
    timestamp: String,
}

/// Print one received message.
pub fn print_message(message: &str, peer: &str, encoding: TextEncoding, format: OutputFormat) {
    let size = encoding.measure(message);
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                event: "message-received",
                peer,
                encoding: encoding.to_string(),
                size,
                message,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PEER", "SIZE", "MESSAGE"])
                .add_row(vec![peer.to_string(), size.to_string(), message.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("peer={peer} size={size} message={message:?}");
        }
        OutputFormat::Raw => {
            print_line(message);
        }
    }
}

#[derive(Serialize)]
struct ListeningOutput {
    event: &'static str,
    address: String,
}

/// Announce the bound address of a listening peer, so scripts can connect.
pub fn print_listening(address: SocketAddr, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ListeningOutput {
                event: "listening",
                address: address.to_string(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty | OutputFormat::Raw => {
            println!("listening on {address}");
        }
    }
    let _ = std::io::stdout().flush();
}

fn print_line(text: &str) {
    let mut out = std::io::stdout().lock();
    let _ = writeln!(out, "{text}");
    let _ = out.flush();
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
