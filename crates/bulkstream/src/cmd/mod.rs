use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod replay;
pub mod synth;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a receive session over a recorded capture and print its summary.
    Replay(ReplayArgs),
    /// Write a synthetic capture of stereo frame pairs.
    Synth(SynthArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Replay(args) => replay::run(args, format),
        Command::Synth(args) => synth::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Capture file to replay.
    pub capture: PathBuf,
    /// Reads kept in flight (4..=32).
    #[arg(long, default_value = "12")]
    pub queue_depth: usize,
    /// Bytes per read, rounded down to a multiple of 64 (1024..=65536).
    #[arg(long, default_value = "16384")]
    pub transfer_size: usize,
    /// Sampling profile id sent before streaming.
    #[arg(long, default_value = "0")]
    pub profile: u8,
    /// Request full-window mode instead of a region of interest.
    #[arg(long)]
    pub full_mode: bool,
    /// Samples per frame to request from the device.
    #[arg(long, value_name = "N")]
    pub frame_samples: Option<u16>,
    /// Region-of-interest window in microseconds.
    #[arg(long, value_name = "US")]
    pub roi_us: Option<u16>,
    /// Stop after this long (e.g. 10s, 500ms).
    #[arg(long)]
    pub duration: Option<String>,
    /// Verify the opening test frame and first stereo pair.
    #[arg(long)]
    pub self_test: bool,
    /// Sample count the first stereo pair must carry (implies --self-test).
    #[arg(long, value_name = "N")]
    pub expect_samples: Option<u16>,
    /// Request one status record once streaming is up.
    #[arg(long)]
    pub status_once: bool,
    /// Request a status record at this interval (min 50ms).
    #[arg(long, value_name = "DURATION")]
    pub status_interval: Option<String>,
    /// Interval between throughput reports on the log.
    #[arg(long, value_name = "DURATION", default_value = "1s")]
    pub report_interval: String,
    /// Log the first N accepted frames.
    #[arg(long, value_name = "N", default_value = "0")]
    pub dump_frames: usize,
    /// Hex-dump the first N short or non-magic packets.
    #[arg(long, value_name = "N", default_value = "0")]
    pub dump_raw_small: usize,
}

#[derive(Args, Debug)]
pub struct SynthArgs {
    /// Capture file to write.
    pub output: PathBuf,
    /// Stereo pairs to generate.
    #[arg(long, default_value = "64")]
    pub pairs: u32,
    /// Samples per frame.
    #[arg(long, default_value = "256")]
    pub samples: u16,
    /// Sequence number of the first pair.
    #[arg(long, default_value = "0")]
    pub start_sequence: u32,
    /// Set the CRC-present flag and fill the checksum.
    #[arg(long)]
    pub crc: bool,
    /// Open the stream with a synthetic test frame.
    #[arg(long)]
    pub test_frame: bool,
    /// Sequence numbers to leave out (comma-separated).
    #[arg(long, value_delimiter = ',', value_name = "SEQ")]
    pub skip: Vec<u32>,
    /// Append a status record every N pairs.
    #[arg(long, value_name = "N")]
    pub status_every: Option<u32>,
    /// Length of each status record (16..=192).
    #[arg(long, default_value = "64")]
    pub status_len: usize,
    /// Emit diagnostic ("ST2T") status records.
    #[arg(long)]
    pub diagnostic: bool,
    /// Milliseconds between consecutive pair timestamps.
    #[arg(long, default_value = "1")]
    pub timestamp_step: u32,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
