mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "bulkstream",
    version,
    about = "USB bulk sample stream receiver"
)]
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

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

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
    fn parses_replay_subcommand() {
        let cli = Cli::try_parse_from([
            "bulkstream",
            "replay",
            "/tmp/stream.bscp",
            "--queue-depth",
            "8",
            "--self-test",
            "--expect-samples",
            "256",
        ])
        .expect("replay args should parse");

        let Command::Replay(args) = cli.command else {
            panic!("expected replay");
        };
        assert_eq!(args.queue_depth, 8);
        assert!(args.self_test);
        assert_eq!(args.expect_samples, Some(256));
    }

    #[test]
    fn parses_synth_skip_list() {
        let cli = Cli::try_parse_from([
            "bulkstream",
            "synth",
            "/tmp/out.bscp",
            "--skip",
            "3,7",
            "--crc",
        ])
        .expect("synth args should parse");

        let Command::Synth(args) = cli.command else {
            panic!("expected synth");
        };
        assert_eq!(args.skip, vec![3, 7]);
        assert!(args.crc);
        assert_eq!(args.pairs, 64);
    }

    #[test]
    fn rejects_profile_out_of_range() {
        let err = Cli::try_parse_from([
            "bulkstream",
            "replay",
            "/tmp/stream.bscp",
            "--profile",
            "300",
        ])
        .expect_err("profile above u8 should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn global_format_after_subcommand() {
        let cli = Cli::try_parse_from(["bulkstream", "version", "--format", "json"])
            .expect("global flag should parse after subcommand");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }
}
