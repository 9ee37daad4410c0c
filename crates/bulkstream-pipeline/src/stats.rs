//! Throughput and integrity counters.
//!
//! Totals live for the whole session. Interval counters (frames, pairs,
//! bytes) feed the periodic report and are reset by [`StatsAggregator::take_interval`].

use std::time::Instant;

use bulkstream_frame::{FrameMeta, Rejection, HEADER_SIZE};
use serde::Serialize;

use crate::sequence::SequenceCounters;

/// Sample counts below this get their own histogram bin.
pub const HISTOGRAM_BINS: usize = 2048;

/// Per-sample-count frame frequency for non-test frames.
#[derive(Debug, Clone)]
pub struct SampleHistogram {
    bins: Vec<u64>,
    overflow: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistogramEntry {
    pub samples: u16,
    pub frames: u64,
}

impl Default for SampleHistogram {
    fn default() -> Self {
        Self {
            bins: vec![0; HISTOGRAM_BINS],
            overflow: 0,
        }
    }
}

impl SampleHistogram {
    pub fn record(&mut self, samples: u16) {
        match self.bins.get_mut(usize::from(samples)) {
            Some(bin) => *bin += 1,
            None => self.overflow += 1,
        }
    }

    pub fn get(&self, samples: u16) -> u64 {
        self.bins.get(usize::from(samples)).copied().unwrap_or(0)
    }

    /// Frames whose sample count did not fit a bin.
    pub fn overflow(&self) -> u64 {
        self.overflow
    }

    /// The `n` most frequent sample counts, most frequent first.
    pub fn top(&self, n: usize) -> Vec<HistogramEntry> {
        let mut entries: Vec<HistogramEntry> = self
            .bins
            .iter()
            .enumerate()
            .filter(|(_, frames)| **frames > 0)
            .map(|(samples, &frames)| HistogramEntry {
                samples: samples as u16,
                frames,
            })
            .collect();
        entries.sort_by(|a, b| b.frames.cmp(&a.frames).then(a.samples.cmp(&b.samples)));
        entries.truncate(n);
        entries
    }
}

/// Received transfer lengths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TransferStats {
    pub count: u64,
    pub bytes: u64,
    pub min_len: Option<usize>,
    pub max_len: usize,
    /// Accepted frames whose transfer length differed from header + payload.
    pub length_mismatch: u64,
}

impl TransferStats {
    pub fn average_len(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.bytes as f64 / self.count as f64
        }
    }
}

/// Decode rejections by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RejectionCounts {
    pub too_short: u64,
    pub bad_magic: u64,
    pub payload_overflow: u64,
    pub crc_mismatch: u64,
}

impl RejectionCounts {
    pub fn record(&mut self, rejection: &Rejection) {
        match rejection {
            Rejection::TooShortForHeader { .. } => self.too_short += 1,
            Rejection::BadMagic { .. } => self.bad_magic += 1,
            Rejection::PayloadOverflow { .. } => self.payload_overflow += 1,
            Rejection::CrcMismatch { .. } => self.crc_mismatch += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.too_short + self.bad_magic + self.payload_overflow + self.crc_mismatch
    }
}

/// One periodic report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalReport {
    pub elapsed_secs: f64,
    pub frames: u64,
    pub pairs: u64,
    pub frames_per_sec: f64,
    /// Payload only, kB (1000 bytes) per second.
    pub payload_kbps: f64,
    /// Payload plus headers.
    pub total_kbps: f64,
    pub sequence: SequenceCounters,
    pub rejections: RejectionCounts,
    pub transfers: TransferStats,
    /// Unread entries per channel ring.
    pub ring_occupancy: [usize; 2],
}

#[derive(Debug, Clone, Copy, Default)]
struct IntervalCounters {
    frames: u64,
    pairs: u64,
    payload_bytes: u64,
    header_bytes: u64,
}

#[derive(Debug)]
pub struct StatsAggregator {
    transfers: TransferStats,
    rejections: RejectionCounts,
    frames: u64,
    test_frames: u64,
    pairs: u64,
    payload_bytes: u64,
    status_records: u64,
    histogram: SampleHistogram,
    interval: IntervalCounters,
    interval_start: Instant,
}

impl StatsAggregator {
    pub fn new(now: Instant) -> Self {
        Self {
            transfers: TransferStats::default(),
            rejections: RejectionCounts::default(),
            frames: 0,
            test_frames: 0,
            pairs: 0,
            payload_bytes: 0,
            status_records: 0,
            histogram: SampleHistogram::default(),
            interval: IntervalCounters::default(),
            interval_start: now,
        }
    }

    /// Every successful completion, whatever it turns out to contain.
    pub fn record_transfer(&mut self, len: usize) {
        let t = &mut self.transfers;
        t.count += 1;
        t.bytes += len as u64;
        t.min_len = Some(t.min_len.map_or(len, |min| min.min(len)));
        t.max_len = t.max_len.max(len);
    }

    /// An accepted frame that arrived in a `received_len`-byte transfer.
    pub fn record_frame(&mut self, meta: &FrameMeta, received_len: usize) {
        self.frames += 1;
        self.payload_bytes += meta.payload_len as u64;
        self.interval.frames += 1;
        self.interval.payload_bytes += meta.payload_len as u64;
        self.interval.header_bytes += HEADER_SIZE as u64;

        if meta.is_test() {
            self.test_frames += 1;
        } else {
            self.histogram.record(meta.sample_count);
        }
        if received_len != meta.frame_len() {
            self.transfers.length_mismatch += 1;
        }
    }

    pub fn record_pair(&mut self) {
        self.pairs += 1;
        self.interval.pairs += 1;
    }

    pub fn record_rejection(&mut self, rejection: &Rejection) {
        self.rejections.record(rejection);
    }

    pub fn record_status(&mut self) {
        self.status_records += 1;
    }

    /// Close the current interval and start a new one at `now`.
    pub fn take_interval(
        &mut self,
        now: Instant,
        sequence: SequenceCounters,
        ring_occupancy: [usize; 2],
    ) -> IntervalReport {
        let elapsed = now.saturating_duration_since(self.interval_start).as_secs_f64();
        let counters = std::mem::take(&mut self.interval);
        self.interval_start = now;

        let per_sec = |value: f64| if elapsed > 0.0 { value / elapsed } else { 0.0 };
        let payload = counters.payload_bytes as f64;
        let total = payload + counters.header_bytes as f64;

        IntervalReport {
            elapsed_secs: elapsed,
            frames: counters.frames,
            pairs: counters.pairs,
            frames_per_sec: per_sec(counters.frames as f64),
            payload_kbps: per_sec(payload / 1000.0),
            total_kbps: per_sec(total / 1000.0),
            sequence,
            rejections: self.rejections,
            transfers: self.transfers,
            ring_occupancy,
        }
    }

    pub fn transfers(&self) -> &TransferStats {
        &self.transfers
    }

    pub fn rejections(&self) -> &RejectionCounts {
        &self.rejections
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn test_frames(&self) -> u64 {
        self.test_frames
    }

    pub fn pairs(&self) -> u64 {
        self.pairs
    }

    pub fn payload_bytes(&self) -> u64 {
        self.payload_bytes
    }

    pub fn status_records(&self) -> u64 {
        self.status_records
    }

    pub fn histogram(&self) -> &SampleHistogram {
        &self.histogram
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bulkstream_frame::{Channel, FrameFlags};

    use super::*;

    fn meta(samples: u16, flags: FrameFlags) -> FrameMeta {
        FrameMeta {
            sequence: 0,
            timestamp_ms: 0,
            sample_count: samples,
            channel: Channel::Adc0,
            flags,
            payload_len: usize::from(samples) * 2,
        }
    }

    #[test]
    fn transfer_lengths() {
        let mut stats = StatsAggregator::new(Instant::now());
        assert_eq!(stats.transfers().min_len, None);
        for len in [100, 40, 300] {
            stats.record_transfer(len);
        }
        let t = stats.transfers();
        assert_eq!(t.count, 3);
        assert_eq!(t.min_len, Some(40));
        assert_eq!(t.max_len, 300);
        assert!((t.average_len() - 146.666).abs() < 0.01);
    }

    #[test]
    fn length_mismatch_counts_padded_transfers() {
        let mut stats = StatsAggregator::new(Instant::now());
        let m = meta(4, FrameFlags::ADC0);
        stats.record_frame(&m, HEADER_SIZE + 8);
        stats.record_frame(&m, HEADER_SIZE + 64);
        assert_eq!(stats.transfers().length_mismatch, 1);
    }

    #[test]
    fn histogram_skips_test_frames() {
        let mut stats = StatsAggregator::new(Instant::now());
        stats.record_frame(&meta(8, FrameFlags::TEST), HEADER_SIZE + 16);
        stats.record_frame(&meta(256, FrameFlags::ADC0), HEADER_SIZE + 512);
        stats.record_frame(&meta(256, FrameFlags::ADC1), HEADER_SIZE + 512);
        stats.record_frame(&meta(128, FrameFlags::ADC0), HEADER_SIZE + 256);

        assert_eq!(stats.test_frames(), 1);
        assert_eq!(stats.histogram().get(8), 0);
        assert_eq!(
            stats.histogram().top(4),
            vec![
                HistogramEntry {
                    samples: 256,
                    frames: 2
                },
                HistogramEntry {
                    samples: 128,
                    frames: 1
                },
            ]
        );
    }

    #[test]
    fn histogram_overflow_bin() {
        let mut histogram = SampleHistogram::default();
        histogram.record(2047);
        histogram.record(2048);
        histogram.record(u16::MAX);
        assert_eq!(histogram.get(2047), 1);
        assert_eq!(histogram.overflow(), 2);
    }

    #[test]
    fn rejections_by_kind() {
        let mut stats = StatsAggregator::new(Instant::now());
        stats.record_rejection(&Rejection::BadMagic { found: 0 });
        stats.record_rejection(&Rejection::BadMagic { found: 1 });
        stats.record_rejection(&Rejection::CrcMismatch {
            expected: 0,
            computed: 1,
        });
        let r = stats.rejections();
        assert_eq!(r.bad_magic, 2);
        assert_eq!(r.crc_mismatch, 1);
        assert_eq!(r.total(), 3);
    }

    #[test]
    fn interval_resets_but_totals_persist() {
        let start = Instant::now();
        let mut stats = StatsAggregator::new(start);
        for _ in 0..10 {
            stats.record_frame(&meta(500, FrameFlags::ADC0), HEADER_SIZE + 1000);
        }
        stats.record_pair();

        let report = stats.take_interval(
            start + Duration::from_secs(2),
            SequenceCounters::default(),
            [3, 4],
        );
        assert_eq!(report.frames, 10);
        assert_eq!(report.pairs, 1);
        assert!((report.frames_per_sec - 5.0).abs() < 1e-9);
        assert!((report.payload_kbps - 5.0).abs() < 1e-9);
        assert!((report.total_kbps - 5.16).abs() < 1e-9);
        assert_eq!(report.ring_occupancy, [3, 4]);

        let next = stats.take_interval(
            start + Duration::from_secs(3),
            SequenceCounters::default(),
            [0, 0],
        );
        assert_eq!(next.frames, 0);
        assert_eq!(next.frames_per_sec, 0.0);
        assert_eq!(stats.frames(), 10);
        assert_eq!(stats.pairs(), 1);
        assert_eq!(stats.payload_bytes(), 10_000);
    }
}
