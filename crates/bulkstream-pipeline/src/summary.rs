//! Serializable end-of-session report.

use bulkstream_frame::{Baseline, Channel, FrameRing, StatusRecord, StatusVariant};
use serde::Serialize;

use crate::pipeline::{hex_dump, DrainReport};
use crate::selftest::SelfTestReport;
use crate::sequence::SequenceCounters;
use crate::stats::{HistogramEntry, RejectionCounts, TransferStats};

/// Why the streaming loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The stop flag was raised (signal or caller).
    Stopped,
    /// The configured run duration elapsed.
    Duration,
    /// No read is left in flight.
    SlotsExhausted,
    /// Polling the transport failed.
    TransportFailure,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Stopped => "stopped",
            StopReason::Duration => "duration",
            StopReason::SlotsExhausted => "slots_exhausted",
            StopReason::TransportFailure => "transport_failure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    pub alt_active: bool,
    pub out_armed: bool,
}

/// Flat view of a [`StatusRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub signature: &'static str,
    pub diagnostic: bool,
    pub received_len: usize,
    pub version: u8,
    pub current_samples: u16,
    pub frame_bytes: u16,
    pub test_frames: u16,
    pub produced_sequence: u32,
    pub sent: [u32; 2],
    pub tx_complete: u32,
    pub partial_abort: u32,
    pub size_mismatch: u32,
    pub dma_done: [u32; 2],
    pub frame_write_sequence: u32,
    pub runtime_flags: u16,
    pub raw_hex: String,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readiness: Option<ReadinessReport>,
}

impl From<&StatusRecord> for StatusReport {
    fn from(record: &StatusRecord) -> Self {
        let c = &record.counters;
        Self {
            signature: record.variant.as_str(),
            diagnostic: record.variant == StatusVariant::Diagnostic,
            received_len: record.received_len,
            version: c.version,
            current_samples: c.current_samples,
            frame_bytes: c.frame_bytes,
            test_frames: c.test_frames,
            produced_sequence: c.produced_sequence,
            sent: c.sent,
            tx_complete: c.tx_complete,
            partial_abort: c.partial_abort,
            size_mismatch: c.size_mismatch,
            dma_done: c.dma_done,
            frame_write_sequence: c.frame_write_sequence,
            runtime_flags: c.runtime_flags,
            raw_hex: hex_dump(record.raw(), record.raw().len()),
            truncated: record.is_truncated(),
            readiness: record.readiness().map(|r| ReadinessReport {
                alt_active: r.alt_active,
                out_armed: r.out_armed,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BaselineReport {
    pub frame_len: Option<usize>,
    pub sample_count: Option<u16>,
    pub drift: u64,
}

impl From<&Baseline> for BaselineReport {
    fn from(baseline: &Baseline) -> Self {
        Self {
            frame_len: baseline.frame_len,
            sample_count: baseline.sample_count,
            drift: baseline.drift,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RingReport {
    pub channel: &'static str,
    pub count: usize,
    pub buffered_bytes: usize,
    pub drops: u64,
}

impl RingReport {
    pub fn new(channel: Channel, ring: &FrameRing) -> Self {
        Self {
            channel: channel.name(),
            count: ring.count(),
            buffered_bytes: ring.buffered_bytes(),
            drops: ring.drops(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub stop_reason: StopReason,
    pub elapsed_secs: f64,
    pub queue_depth: usize,
    pub transfer_size: usize,
    pub retired_slots: usize,
    pub transfers: TransferStats,
    pub frames: u64,
    pub test_frames: u64,
    pub pairs: u64,
    pub payload_bytes: u64,
    pub status_records: u64,
    pub rejections: RejectionCounts,
    pub sequence: SequenceCounters,
    pub baseline: BaselineReport,
    /// Most frequent sample counts among non-test frames.
    pub histogram: Vec<HistogramEntry>,
    pub histogram_overflow: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_test: Option<SelfTestReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<StatusReport>,
    pub drain: DrainReport,
    pub rings: Vec<RingReport>,
}

impl SessionSummary {
    /// `None` when the self-test was not enabled.
    pub fn self_test_passed(&self) -> Option<bool> {
        self.self_test.as_ref().map(|report| report.verdict == "PASS")
    }
}
