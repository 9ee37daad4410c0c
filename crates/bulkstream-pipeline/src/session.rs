//! The streaming session: device setup, the poll loop with its timers, and
//! the stop/drain/trailing-status teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use bulkstream_frame::{Channel, Command, StatusRecord};
use bulkstream_transport::{Transport, TransportError};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::Result;
use crate::pipeline::{hex_dump, DrainReport, TransferPipeline};
use crate::stats::IntervalReport;
use crate::summary::{BaselineReport, RingReport, SessionSummary, StatusReport, StopReason};

/// Size of the single read issued for a trailing status packet.
pub const TRAILING_STATUS_LEN: usize = 64;

/// Histogram entries kept in the summary.
const SUMMARY_HISTOGRAM_ENTRIES: usize = 8;

/// Receives observational output while a session runs.
pub trait Reporter {
    fn interval(&mut self, report: &IntervalReport);

    fn status(&mut self, _record: &StatusRecord) {}
}

/// Writes interval reports to the log.
#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn interval(&mut self, r: &IntervalReport) {
        info!(
            frames = r.frames,
            pairs = r.pairs,
            fps = r.frames_per_sec,
            payload_kbps = r.payload_kbps,
            total_kbps = r.total_kbps,
            missing = r.sequence.missing,
            dup_seq = r.sequence.sequence_duplicates,
            back = r.sequence.backward_jumps,
            dup_channel = r.sequence.channel_duplicates,
            crc_bad = r.rejections.crc_mismatch,
            malformed = r.rejections.total() - r.rejections.crc_mismatch,
            len_avg = r.transfers.average_len(),
            len_min = r.transfers.min_len.unwrap_or(0),
            len_max = r.transfers.max_len,
            len_mismatch = r.transfers.length_mismatch,
            ring0 = r.ring_occupancy[0],
            ring1 = r.ring_occupancy[1],
            "interval"
        );
    }
}

struct Timers {
    started: Instant,
    last_report: Instant,
    last_status_request: Instant,
    status_once_sent: bool,
    no_data_warned: bool,
}

impl Timers {
    fn new(now: Instant) -> Self {
        Self {
            started: now,
            last_report: now,
            last_status_request: now,
            status_once_sent: false,
            no_data_warned: false,
        }
    }
}

pub struct Session<T> {
    pipeline: TransferPipeline<T>,
    config: SessionConfig,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, config: &SessionConfig) -> Self {
        let config = config.normalized();
        Self {
            pipeline: TransferPipeline::new(transport, &config.pipeline),
            config,
        }
    }

    /// Stream until `stop` is raised, the run duration passes, or no read is
    /// left in flight. Only a failure to arm the read queue is an error;
    /// everything after that ends in a summary.
    pub fn run<R: Reporter>(
        &mut self,
        stop: &AtomicBool,
        reporter: &mut R,
    ) -> Result<SessionSummary> {
        self.configure_device();
        // Reads go out before START so the opening test frame has somewhere to land.
        self.pipeline.start()?;
        self.command(Command::StartStream);

        let mut timers = Timers::new(Instant::now());
        let reason = loop {
            if stop.load(Ordering::SeqCst) {
                break StopReason::Stopped;
            }
            if let Err(err) = self.pipeline.poll(self.config.poll_timeout) {
                warn!(error = %err, "transport poll failed");
                break StopReason::TransportFailure;
            }
            for record in self.pipeline.take_status_records() {
                reporter.status(&record);
            }

            let now = Instant::now();
            if let Some(limit) = self.config.run_duration {
                if now.saturating_duration_since(timers.started) >= limit {
                    break StopReason::Duration;
                }
            }
            self.tick(now, &mut timers, reporter);

            if !self.pipeline.is_alive() {
                warn!(
                    retired = self.pipeline.retired_slots(),
                    "no transfer left in flight"
                );
                break StopReason::SlotsExhausted;
            }
        };
        info!(reason = reason.as_str(), "stopping stream");

        self.command(Command::StopStream);
        let drain = self.pipeline.shutdown(
            self.config.pipeline.drain_iterations,
            self.config.pipeline.drain_timeout,
        );
        self.read_trailing_status(reporter);

        Ok(self.summary(reason, timers.started.elapsed(), drain))
    }

    fn configure_device(&mut self) {
        self.command(Command::SetProfile(self.config.profile));
        self.command(Command::SetFullMode(self.config.full_mode));
        if let Some(samples) = self.config.frame_samples {
            self.command(Command::SetFrameSamples(samples));
        }
        if let Some(micros) = self.config.roi_micros {
            self.command(Command::SetRoiMicros(micros));
        }
    }

    /// Commands are best effort; a failure is logged and the session goes on.
    fn command(&mut self, command: Command) -> bool {
        match self.pipeline.send_command(command) {
            Ok(()) => true,
            Err(err) => {
                warn!(%command, error = %err, "command failed");
                false
            }
        }
    }

    fn tick<R: Reporter>(&mut self, now: Instant, timers: &mut Timers, reporter: &mut R) {
        let since_start = now.saturating_duration_since(timers.started);

        if !timers.no_data_warned
            && since_start > self.config.no_data_warning
            && self.pipeline.stats().frames() == 0
        {
            warn!(
                secs = since_start.as_secs_f64(),
                "no data received since stream start"
            );
            timers.no_data_warned = true;
        }

        if now.saturating_duration_since(timers.last_report) >= self.config.report_interval {
            let sequence = *self.pipeline.sequence().counters();
            let occupancy = self.pipeline.ring_occupancy();
            let report = self
                .pipeline
                .stats_mut()
                .take_interval(now, sequence, occupancy);
            reporter.interval(&report);
            timers.last_report = now;
        }

        if self.config.status_once
            && !timers.status_once_sent
            && (self.pipeline.stats().test_frames() > 0
                || since_start > self.config.status_once_fallback)
        {
            self.command(Command::GetStatus);
            timers.status_once_sent = true;
        }

        if let Some(interval) = self.config.status_interval {
            if now.saturating_duration_since(timers.last_status_request) >= interval {
                self.command(Command::GetStatus);
                timers.last_status_request = now;
            }
        }
    }

    fn read_trailing_status<R: Reporter>(&mut self, reporter: &mut R) {
        let timeout = self.config.trailing_status_timeout;
        match self
            .pipeline
            .transport_mut()
            .blocking_read(TRAILING_STATUS_LEN, timeout)
        {
            Ok(packet) => match StatusRecord::parse(&packet) {
                Some(record) => {
                    self.pipeline.accept_status(record);
                    for record in self.pipeline.take_status_records() {
                        reporter.status(&record);
                    }
                }
                None => debug!(
                    len = packet.len(),
                    hex = %hex_dump(&packet, TRAILING_STATUS_LEN),
                    "trailing packet is not a status record"
                ),
            },
            Err(TransportError::Timeout(_)) => debug!("no trailing status packet"),
            Err(err) => warn!(error = %err, "trailing status read failed"),
        }
    }

    fn summary(
        &self,
        stop_reason: StopReason,
        elapsed: Duration,
        drain: DrainReport,
    ) -> SessionSummary {
        let p = &self.pipeline;
        let stats = p.stats();
        SessionSummary {
            stop_reason,
            elapsed_secs: elapsed.as_secs_f64(),
            queue_depth: p.queue_depth(),
            transfer_size: p.transfer_size(),
            retired_slots: p.retired_slots(),
            transfers: *stats.transfers(),
            frames: stats.frames(),
            test_frames: stats.test_frames(),
            pairs: stats.pairs(),
            payload_bytes: stats.payload_bytes(),
            status_records: stats.status_records(),
            rejections: *stats.rejections(),
            sequence: *p.sequence().counters(),
            baseline: BaselineReport::from(p.baseline()),
            histogram: stats.histogram().top(SUMMARY_HISTOGRAM_ENTRIES),
            histogram_overflow: stats.histogram().overflow(),
            self_test: p.self_test().map(|monitor| monitor.report()),
            last_status: p.last_status().map(StatusReport::from),
            drain,
            rings: Channel::ALL
                .iter()
                .map(|&channel| RingReport::new(channel, p.ring(channel)))
                .collect(),
        }
    }

    pub fn pipeline(&self) -> &TransferPipeline<T> {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut TransferPipeline<T> {
        &mut self.pipeline
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn into_transport(self) -> T {
        self.pipeline.into_transport()
    }
}

#[cfg(test)]
mod tests {
    use bulkstream_frame::{encode_frame, FrameHeader, StatusCounters, StatusVariant};
    use bulkstream_transport::{EndOfScript, MemoryTransport};
    use bytes::BytesMut;

    use super::*;
    use crate::config::PipelineConfig;

    #[derive(Default)]
    struct Collector {
        intervals: Vec<IntervalReport>,
        statuses: Vec<StatusRecord>,
    }

    impl Reporter for Collector {
        fn interval(&mut self, report: &IntervalReport) {
            self.intervals.push(report.clone());
        }

        fn status(&mut self, record: &StatusRecord) {
            self.statuses.push(record.clone());
        }
    }

    fn frame(sequence: u32, channel: Channel, samples: u16) -> Vec<u8> {
        let header = FrameHeader::new(sequence, channel, samples).with_crc();
        let mut buf = BytesMut::new();
        encode_frame(&header, &vec![0x11; usize::from(samples) * 2], &mut buf)
            .expect("frame should encode");
        buf.to_vec()
    }

    fn test_frame() -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(&FrameHeader::test_frame(0, 8), &[0; 16], &mut buf)
            .expect("test frame should encode");
        buf.to_vec()
    }

    fn status(len: usize, produced: u32) -> Vec<u8> {
        let counters = StatusCounters {
            produced_sequence: produced,
            ..StatusCounters::default()
        };
        let mut buf = BytesMut::new();
        StatusRecord::encode(StatusVariant::Standard, &counters, len, &mut buf)
            .expect("status should encode");
        buf.to_vec()
    }

    fn stereo_stream(pairs: u32, samples: u16) -> Vec<Vec<u8>> {
        let mut packets = vec![test_frame()];
        for seq in 1..=pairs {
            packets.push(frame(seq, Channel::Adc0, samples));
            packets.push(frame(seq, Channel::Adc1, samples));
        }
        packets
    }

    fn config() -> SessionConfig {
        SessionConfig {
            pipeline: PipelineConfig {
                queue_depth: 4,
                transfer_size: 4096,
                ring_arena_size: 256 * 1024,
                drain_iterations: 3,
                drain_timeout: Duration::from_millis(1),
                ..PipelineConfig::default()
            },
            poll_timeout: Duration::from_millis(1),
            trailing_status_timeout: Duration::from_millis(1),
            ..SessionConfig::default()
        }
    }

    fn run(
        transport: MemoryTransport,
        config: &SessionConfig,
    ) -> (SessionSummary, Collector, MemoryTransport) {
        let mut session = Session::new(transport, config);
        let mut collector = Collector::default();
        let stop = AtomicBool::new(false);
        let summary = session
            .run(&stop, &mut collector)
            .expect("session should run");
        (summary, collector, session.into_transport())
    }

    #[test]
    fn replays_a_stream_until_disconnect() {
        let transport = MemoryTransport::from_packets(stereo_stream(10, 64), EndOfScript::Disconnect);
        let (summary, _, transport) = run(transport, &config());

        assert_eq!(transport.remaining_script(), 0);
        assert_eq!(summary.stop_reason, StopReason::SlotsExhausted);
        assert_eq!(summary.frames, 21);
        assert_eq!(summary.test_frames, 1);
        assert_eq!(summary.pairs, 10);
        assert_eq!(summary.sequence.pairs, 10);
        assert_eq!(summary.baseline.sample_count, Some(64));
        assert_eq!(summary.baseline.drift, 0);
        assert_eq!(summary.retired_slots, 4);
        assert_eq!(summary.rings[0].count, 11);
        assert_eq!(summary.rings[1].count, 10);
        assert_eq!(summary.histogram[0].samples, 64);
        assert_eq!(summary.histogram[0].frames, 20);
        assert_eq!(summary.transfers.length_mismatch, 0);
        assert!(summary.self_test.is_none());
    }

    #[test]
    fn setup_commands_precede_start_and_stop_follows() {
        let transport = MemoryTransport::from_packets(stereo_stream(1, 8), EndOfScript::Disconnect);
        let cfg = SessionConfig {
            profile: 3,
            full_mode: true,
            frame_samples: Some(256),
            roi_micros: Some(1500),
            ..config()
        };
        let (_, _, transport) = run(transport, &cfg);

        let opcodes: Vec<u8> = transport.commands().iter().map(|c| c.opcode).collect();
        assert_eq!(opcodes, vec![0x14, 0x13, 0x17, 0x15, 0x20, 0x21]);
        assert_eq!(transport.commands()[0].payload, vec![3]);
        assert_eq!(transport.commands()[1].payload, vec![1]);
        assert_eq!(transport.commands()[2].payload, 256u16.to_le_bytes().to_vec());
        assert_eq!(transport.commands()[3].payload, 1500u16.to_le_bytes().to_vec());
    }

    #[test]
    fn raised_stop_flag_ends_immediately_and_drains() {
        let mut session = Session::new(MemoryTransport::new(), &config());
        let stop = AtomicBool::new(true);
        let summary = session
            .run(&stop, &mut Collector::default())
            .expect("session should run");

        assert_eq!(summary.stop_reason, StopReason::Stopped);
        assert_eq!(summary.drain.requested, 4);
        assert_eq!(summary.drain.cancelled, 4);
        assert_eq!(summary.drain.leaked, 0);
        assert_eq!(summary.frames, 0);
    }

    #[test]
    fn run_duration_stops_an_idle_stream() {
        let cfg = SessionConfig {
            run_duration: Some(Duration::from_millis(20)),
            ..config()
        };
        let (summary, _, _) = run(MemoryTransport::new(), &cfg);
        assert_eq!(summary.stop_reason, StopReason::Duration);
        assert!(summary.elapsed_secs >= 0.02);
    }

    #[test]
    fn status_once_follows_the_test_frame() {
        let transport = MemoryTransport::from_packets(stereo_stream(2, 8), EndOfScript::Disconnect);
        let cfg = SessionConfig {
            status_once: true,
            ..config()
        };
        let (_, _, transport) = run(transport, &cfg);
        let status_requests = transport
            .commands()
            .iter()
            .filter(|c| c.opcode == 0x30)
            .count();
        assert_eq!(status_requests, 1);
    }

    #[test]
    fn periodic_status_requests_repeat() {
        let cfg = SessionConfig {
            run_duration: Some(Duration::from_millis(180)),
            status_interval: Some(Duration::from_millis(50)),
            ..config()
        };
        let (_, _, transport) = run(MemoryTransport::new(), &cfg);
        let status_requests = transport
            .commands()
            .iter()
            .filter(|c| c.opcode == 0x30)
            .count();
        assert!(status_requests >= 2, "only {status_requests} requests sent");
    }

    #[test]
    fn status_records_reach_reporter_and_summary() {
        let mut packets = stereo_stream(1, 8);
        packets.insert(1, status(64, 7));
        let mut transport = MemoryTransport::from_packets(packets, EndOfScript::Disconnect);
        transport.push_trailing(status(64, 42));

        let (summary, collector, _) = run(transport, &config());
        assert_eq!(collector.statuses.len(), 2);
        assert_eq!(collector.statuses[0].counters.produced_sequence, 7);
        assert_eq!(summary.status_records, 2);

        let last = summary.last_status.expect("trailing status should be last");
        assert_eq!(last.produced_sequence, 42);
        assert_eq!(last.signature, "STAT");
        assert!(last.readiness.is_some());
    }

    #[test]
    fn interval_only_reporter_still_sees_status_in_summary() {
        #[derive(Default)]
        struct IntervalsOnly(usize);

        impl Reporter for IntervalsOnly {
            fn interval(&mut self, _report: &IntervalReport) {
                self.0 += 1;
            }
        }

        let mut packets = stereo_stream(1, 8);
        packets.insert(1, status(64, 9));
        let transport = MemoryTransport::from_packets(packets, EndOfScript::Disconnect);
        let mut session = Session::new(transport, &config());
        let mut reporter = IntervalsOnly::default();
        let summary = session
            .run(&AtomicBool::new(false), &mut reporter)
            .expect("session should run");

        assert_eq!(summary.status_records, 1);
        let last = summary.last_status.expect("status should be recorded");
        assert_eq!(last.produced_sequence, 9);
    }

    #[test]
    fn trailing_garbage_is_ignored() {
        let mut transport = MemoryTransport::from_packets(stereo_stream(1, 8), EndOfScript::Disconnect);
        transport.push_trailing(vec![0xEE; 10]);
        let (summary, _, _) = run(transport, &config());
        assert!(summary.last_status.is_none());
    }

    #[test]
    fn self_test_verdict_in_summary() {
        let cfg = SessionConfig {
            pipeline: PipelineConfig {
                self_test: true,
                ..config().pipeline
            },
            ..config()
        };
        let transport = MemoryTransport::from_packets(stereo_stream(3, 8), EndOfScript::Disconnect);
        let (summary, _, _) = run(transport, &cfg);
        assert_eq!(summary.self_test_passed(), Some(true));

        let mut packets = stereo_stream(3, 8);
        packets.remove(0);
        let transport = MemoryTransport::from_packets(packets, EndOfScript::Disconnect);
        let (summary, _, _) = run(transport, &cfg);
        assert_eq!(summary.self_test_passed(), Some(false));
        let report = summary.self_test.expect("self-test report should be present");
        assert_eq!(report.reason, Some("no test frame first"));
    }

    #[test]
    fn interval_reports_cover_every_frame() {
        let cfg = SessionConfig {
            report_interval: Duration::ZERO,
            ..config()
        };
        let transport = MemoryTransport::from_packets(stereo_stream(5, 16), EndOfScript::Disconnect);
        let (summary, collector, _) = run(transport, &cfg);
        assert!(!collector.intervals.is_empty());
        let frames: u64 = collector.intervals.iter().map(|r| r.frames).sum();
        assert_eq!(frames, summary.frames);
    }

    #[test]
    fn failing_commands_do_not_stop_the_session() {
        let mut transport = MemoryTransport::from_packets(stereo_stream(2, 8), EndOfScript::Disconnect);
        transport.fail_commands(true);
        let (summary, _, transport) = run(transport, &config());
        assert_eq!(summary.pairs, 2);
        assert!(transport.commands().is_empty());
    }

    #[test]
    fn unarmed_queue_is_an_error() {
        let mut transport = MemoryTransport::new();
        transport.limit_submissions(0);
        let mut session = Session::new(transport, &config());
        let result = session.run(&AtomicBool::new(false), &mut Collector::default());
        assert!(result.is_err());
    }

    #[test]
    fn summary_serializes() {
        let transport = MemoryTransport::from_packets(stereo_stream(1, 8), EndOfScript::Disconnect);
        let (summary, _, _) = run(transport, &config());
        let json = serde_json::to_value(&summary).expect("summary should serialize");
        assert_eq!(json["stop_reason"], "slots_exhausted");
        assert_eq!(json["pairs"], 1);
        assert_eq!(json["rings"][1]["channel"], "ADC1");
        assert!(json.get("self_test").is_none());
    }
}
