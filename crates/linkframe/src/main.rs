mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::{Command, EncodingArg, LinkOptions, OversizeArg};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "linkframe", version, about = "Length-prefixed text link CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// Text encoding of message payloads. Both ends must agree.
    #[arg(long, value_name = "ENCODING", default_value = "utf8", global = true)]
    encoding: EncodingArg,

    /// What to do with commands longer than one frame.
    #[arg(long, value_name = "POLICY", default_value = "reject", global = true)]
    oversize: OversizeArg,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let link = LinkOptions {
        encoding: cli.encoding.into(),
        oversize: cli.oversize.into(),
    };
    let result = cmd::run(cli.command, link, format).await;

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "linkframe",
            "send",
            "192.168.4.1:23",
            "LED ON",
            "--wait",
            "2",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.command, "LED ON");
                assert_eq!(args.wait, 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn link_flags_are_global() {
        let cli = Cli::try_parse_from([
            "linkframe",
            "monitor",
            "127.0.0.1:7000",
            "--encoding",
            "utf16le",
            "--oversize",
            "truncate",
        ])
        .expect("global flags should parse after the subcommand");

        assert!(matches!(cli.encoding, EncodingArg::Utf16le));
        assert!(matches!(cli.oversize, OversizeArg::Truncate));
    }

    #[test]
    fn send_requires_command() {
        let err = Cli::try_parse_from(["linkframe", "send", "127.0.0.1:7000"])
            .expect_err("missing command should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
