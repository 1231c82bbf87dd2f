use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use linkframe_frame::{FrameConfig, OversizePolicy, TextEncoding};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod echo;
pub mod monitor;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one command to a peer, optionally waiting for replies.
    Send(SendArgs),
    /// Connect to a peer and print every message it sends.
    Monitor(MonitorArgs),
    /// Run a simulated peer that echoes each command back.
    Echo(EchoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, link: LinkOptions, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, link, format).await,
        Command::Monitor(args) => monitor::run(args, link, format).await,
        Command::Echo(args) => echo::run(args, link, format).await,
        Command::Version(args) => version::run(args),
    }
}

/// Link settings shared by every subcommand that touches the wire.
#[derive(Clone, Copy, Debug)]
pub struct LinkOptions {
    pub encoding: TextEncoding,
    pub oversize: OversizePolicy,
}

impl LinkOptions {
    pub fn frame_config(self) -> FrameConfig {
        FrameConfig {
            encoding: self.encoding,
            oversize_policy: self.oversize,
            ..FrameConfig::default()
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum EncodingArg {
    Utf8,
    Utf16le,
    Utf16be,
}

impl From<EncodingArg> for TextEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Utf8 => TextEncoding::Utf8,
            EncodingArg::Utf16le => TextEncoding::Utf16Le,
            EncodingArg::Utf16be => TextEncoding::Utf16Be,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum OversizeArg {
    Reject,
    Truncate,
}

impl From<OversizeArg> for OversizePolicy {
    fn from(arg: OversizeArg) -> Self {
        match arg {
            OversizeArg::Reject => OversizePolicy::Reject,
            OversizeArg::Truncate => OversizePolicy::Truncate,
        }
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Peer address (host:port).
    pub address: String,
    /// Command text to send.
    pub command: String,
    /// Wait for N reply messages and print them.
    #[arg(long, default_value = "0", value_name = "N")]
    pub wait: usize,
    /// Limit for connecting and for each reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Peer address (host:port).
    pub address: String,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Address to bind (host:port; port 0 picks a free one).
    pub address: String,
    /// Exit after echoing N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `5s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }

    #[test]
    fn link_options_build_frame_config() {
        let link = LinkOptions {
            encoding: EncodingArg::Utf16be.into(),
            oversize: OversizeArg::Truncate.into(),
        };
        let config = link.frame_config();
        assert_eq!(config.encoding, TextEncoding::Utf16Be);
        assert_eq!(config.oversize_policy, OversizePolicy::Truncate);
        assert_eq!(config.max_payload_size, 255);
    }
}
