use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bulkstream_pipeline::{LogReporter, PipelineConfig, Session, SessionConfig};
use bulkstream_transport::{read_capture, EndOfScript, MemoryTransport};
use tracing::{info, warn};

use crate::cmd::{parse_duration, ReplayArgs};
use crate::exit::{
    pipeline_error, transport_error, CliError, CliResult, HEALTH_CHECK_FAILED, INTERNAL, SUCCESS,
};
use crate::output::{print_summary, OutputFormat};

pub fn run(args: ReplayArgs, format: OutputFormat) -> CliResult<i32> {
    let config = session_config(&args)?;

    let file = File::open(&args.capture)
        .map_err(|err| transport_error("open capture", err.into()))?;
    let packets = read_capture(&mut BufReader::new(file))
        .map_err(|err| transport_error("read capture", err))?;
    info!(
        capture = %args.capture.display(),
        records = packets.len(),
        "replaying capture"
    );

    // The device "disconnects" once the capture is exhausted, which ends the session.
    let transport = MemoryTransport::from_packets(packets, EndOfScript::Disconnect);

    let stop = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(stop.clone())?;

    let mut session = Session::new(transport, &config);
    let summary = session
        .run(&stop, &mut LogReporter)
        .map_err(|err| pipeline_error("session failed", err))?;

    let capture = args.capture.display().to_string();
    print_summary(&summary, &capture, format);

    match summary.self_test_passed() {
        Some(false) => {
            warn!("self-test did not pass");
            Ok(HEALTH_CHECK_FAILED)
        }
        _ => Ok(SUCCESS),
    }
}

fn session_config(args: &ReplayArgs) -> CliResult<SessionConfig> {
    let run_duration = args.duration.as_deref().map(parse_duration).transpose()?;
    let status_interval = args
        .status_interval
        .as_deref()
        .map(parse_duration)
        .transpose()?;
    let report_interval = parse_duration(&args.report_interval)?;

    Ok(SessionConfig {
        pipeline: PipelineConfig {
            queue_depth: args.queue_depth,
            transfer_size: args.transfer_size,
            self_test: args.self_test || args.expect_samples.is_some(),
            expected_samples: args.expect_samples,
            dump_frames: args.dump_frames,
            dump_raw_small: args.dump_raw_small,
            ..PipelineConfig::default()
        },
        profile: args.profile,
        full_mode: args.full_mode,
        frame_samples: args.frame_samples,
        roi_micros: args.roi_us,
        run_duration,
        status_once: args.status_once,
        status_interval,
        report_interval,
        ..SessionConfig::default()
    })
}

fn install_ctrlc_handler(stop: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
