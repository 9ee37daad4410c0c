//! Receive side of the sample stream.
//!
//! [`TransferPipeline`] keeps a queue of bulk reads saturated and runs each
//! completed buffer through decode, sequence tracking, the optional
//! self-test and the per-channel rings. [`Session`] wraps it with device
//! setup, timers and teardown.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod selftest;
pub mod sequence;
pub mod session;
pub mod stats;
pub mod summary;

pub use config::{PipelineConfig, SessionConfig};
pub use error::{PipelineError, Result};
pub use pipeline::{DrainReport, SlotState, TransferPipeline, MAX_PENDING_STATUS};
pub use selftest::{
    CapturedPair, SelfTestFailure, SelfTestMonitor, SelfTestReport, SelfTestState,
    SelfTestVerdict, TEST_FRAME_SAMPLES,
};
pub use sequence::{SequenceCounters, SequenceEvent, SequenceState, SequenceTracker};
pub use session::{LogReporter, Reporter, Session, TRAILING_STATUS_LEN};
pub use stats::{
    HistogramEntry, IntervalReport, RejectionCounts, SampleHistogram, StatsAggregator,
    TransferStats, HISTOGRAM_BINS,
};
pub use summary::{
    BaselineReport, ReadinessReport, RingReport, SessionSummary, StatusReport, StopReason,
};
