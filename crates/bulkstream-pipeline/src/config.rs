use std::time::Duration;

use bulkstream_frame::{DEFAULT_ARENA_SIZE, DEFAULT_RING_CAPACITY};
use tracing::info;

pub const MIN_QUEUE_DEPTH: usize = 4;
pub const MAX_QUEUE_DEPTH: usize = 32;
pub const DEFAULT_QUEUE_DEPTH: usize = 12;

pub const MIN_TRANSFER_SIZE: usize = 1024;
pub const MAX_TRANSFER_SIZE: usize = 64 * 1024;
pub const DEFAULT_TRANSFER_SIZE: usize = 16 * 1024;
/// Read sizes are kept a multiple of the bulk packet size.
pub const TRANSFER_ALIGN: usize = 64;

/// Lower bound for periodic status requests.
pub const MIN_STATUS_INTERVAL: Duration = Duration::from_millis(50);

/// Read-queue and decode options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Reads kept in flight.
    pub queue_depth: usize,
    /// Bytes per read buffer.
    pub transfer_size: usize,
    /// Entries per channel ring.
    pub ring_capacity: usize,
    /// Payload bytes per channel ring.
    pub ring_arena_size: usize,
    /// Run the handshake self-test over the first frames.
    pub self_test: bool,
    /// Sample count the self-test requires of the first stereo pair.
    pub expected_samples: Option<u16>,
    /// Log the first N accepted frames.
    pub dump_frames: usize,
    /// Log the first N short or non-magic packets as hex.
    pub dump_raw_small: usize,
    /// Poll rounds allowed for cancelled reads to come back at shutdown.
    pub drain_iterations: usize,
    /// Timeout of each drain poll.
    pub drain_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
            transfer_size: DEFAULT_TRANSFER_SIZE,
            ring_capacity: DEFAULT_RING_CAPACITY,
            ring_arena_size: DEFAULT_ARENA_SIZE,
            self_test: false,
            expected_samples: None,
            dump_frames: 0,
            dump_raw_small: 0,
            drain_iterations: 20,
            drain_timeout: Duration::from_millis(100),
        }
    }
}

impl PipelineConfig {
    /// Copy with queue depth and transfer size forced into their supported ranges.
    pub fn normalized(&self) -> Self {
        let mut cfg = self.clone();

        let depth = cfg.queue_depth.clamp(MIN_QUEUE_DEPTH, MAX_QUEUE_DEPTH);
        if depth != cfg.queue_depth {
            info!(from = cfg.queue_depth, to = depth, "queue depth clamped");
            cfg.queue_depth = depth;
        }

        let aligned = cfg.transfer_size - cfg.transfer_size % TRANSFER_ALIGN;
        if aligned != cfg.transfer_size {
            info!(from = cfg.transfer_size, to = aligned, "transfer size aligned");
        }
        let size = aligned.clamp(MIN_TRANSFER_SIZE, MAX_TRANSFER_SIZE);
        if size != aligned {
            info!(from = aligned, to = size, "transfer size clamped");
        }
        cfg.transfer_size = size;
        cfg
    }
}

/// Everything a streaming session needs beyond the read queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub pipeline: PipelineConfig,
    /// Sampling profile id sent before streaming.
    pub profile: u8,
    /// Full-window mode instead of region of interest.
    pub full_mode: bool,
    /// Samples per frame, if the device should be told.
    pub frame_samples: Option<u16>,
    /// Region-of-interest window, if the device should be told.
    pub roi_micros: Option<u16>,
    /// Stop on our own after this long.
    pub run_duration: Option<Duration>,
    /// Request one status record once streaming is up.
    pub status_once: bool,
    /// Request a status record this often.
    pub status_interval: Option<Duration>,
    pub report_interval: Duration,
    /// Warn once if no frame arrived within this window.
    pub no_data_warning: Duration,
    /// Send the one-shot status request after this long even without a test frame.
    pub status_once_fallback: Duration,
    pub poll_timeout: Duration,
    pub trailing_status_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            profile: 0,
            full_mode: false,
            frame_samples: None,
            roi_micros: None,
            run_duration: None,
            status_once: false,
            status_interval: None,
            report_interval: Duration::from_secs(1),
            no_data_warning: Duration::from_secs(2),
            status_once_fallback: Duration::from_millis(250),
            poll_timeout: Duration::from_millis(100),
            trailing_status_timeout: Duration::from_millis(200),
        }
    }
}

impl SessionConfig {
    /// Copy with every bounded option forced into range.
    pub fn normalized(&self) -> Self {
        let mut cfg = self.clone();
        cfg.pipeline = self.pipeline.normalized();
        if let Some(interval) = cfg.status_interval {
            if interval < MIN_STATUS_INTERVAL {
                info!(
                    from_ms = interval.as_millis() as u64,
                    to_ms = MIN_STATUS_INTERVAL.as_millis() as u64,
                    "status interval raised"
                );
                cfg.status_interval = Some(MIN_STATUS_INTERVAL);
            }
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_already_normal() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.normalized(), cfg);
        assert_eq!(cfg.queue_depth, 12);
        assert_eq!(cfg.transfer_size, 16384);
    }

    #[test]
    fn queue_depth_is_clamped() {
        let low = PipelineConfig {
            queue_depth: 1,
            ..PipelineConfig::default()
        };
        assert_eq!(low.normalized().queue_depth, MIN_QUEUE_DEPTH);

        let high = PipelineConfig {
            queue_depth: 100,
            ..PipelineConfig::default()
        };
        assert_eq!(high.normalized().queue_depth, MAX_QUEUE_DEPTH);
    }

    #[test]
    fn transfer_size_is_aligned_then_clamped() {
        let cases = [
            (16_400, 16_384),
            (100, MIN_TRANSFER_SIZE),
            (1_000_000, MAX_TRANSFER_SIZE),
            (2_047, 1_984),
            (65_600, MAX_TRANSFER_SIZE),
        ];
        for (input, want) in cases {
            let cfg = PipelineConfig {
                transfer_size: input,
                ..PipelineConfig::default()
            };
            assert_eq!(cfg.normalized().transfer_size, want, "input {input}");
        }
    }

    #[test]
    fn status_interval_has_a_floor() {
        let cfg = SessionConfig {
            status_interval: Some(Duration::from_millis(10)),
            ..SessionConfig::default()
        };
        assert_eq!(cfg.normalized().status_interval, Some(MIN_STATUS_INTERVAL));

        let ok = SessionConfig {
            status_interval: Some(Duration::from_millis(500)),
            ..SessionConfig::default()
        };
        assert_eq!(ok.normalized().status_interval, Some(Duration::from_millis(500)));
    }
}
