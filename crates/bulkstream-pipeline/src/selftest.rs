//! Protocol handshake check over the first frames of a stream.
//!
//! A compliant device opens with one 8-sample test frame, then a channel 0
//! frame and a channel 1 frame carrying the same sequence number.

use std::fmt;

use bulkstream_frame::{FrameFlags, FrameMeta};
use serde::Serialize;

/// Samples carried by the opening test frame.
pub const TEST_FRAME_SAMPLES: u16 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfTestFailure {
    NoTestFrameFirst,
    ExpectedChannel0,
    ExpectedChannel1SameSequence,
    SamplesMismatch { expected: u16, observed: u16 },
}

impl SelfTestFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelfTestFailure::NoTestFrameFirst => "no test frame first",
            SelfTestFailure::ExpectedChannel0 => "expected channel 0 frame",
            SelfTestFailure::ExpectedChannel1SameSequence => "expected channel 1 same sequence",
            SelfTestFailure::SamplesMismatch { .. } => "samples mismatch",
        }
    }
}

impl fmt::Display for SelfTestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfTestState {
    WaitTestFrame,
    WaitChannel0,
    WaitChannel1,
    Done,
    Failed(SelfTestFailure),
}

impl SelfTestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SelfTestState::Done | SelfTestState::Failed(_))
    }
}

/// Final outcome as reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfTestVerdict {
    Pass,
    Fail(SelfTestFailure),
    Incomplete,
}

impl fmt::Display for SelfTestVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelfTestVerdict::Pass => f.write_str("PASS"),
            SelfTestVerdict::Fail(reason) => write!(f, "FAIL({reason})"),
            SelfTestVerdict::Incomplete => f.write_str("INCOMPLETE"),
        }
    }
}

/// The channel 0 frame the check latched onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapturedPair {
    pub sequence: u32,
    pub samples: u16,
}

/// Serializable summary of a self-test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelfTestReport {
    /// `PASS`, `FAIL` or `INCOMPLETE`.
    pub verdict: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured: Option<CapturedPair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_samples: Option<u16>,
}

#[derive(Debug)]
pub struct SelfTestMonitor {
    state: SelfTestState,
    expected_samples: Option<u16>,
    captured: Option<CapturedPair>,
}

impl SelfTestMonitor {
    pub fn new(expected_samples: Option<u16>) -> Self {
        Self {
            state: SelfTestState::WaitTestFrame,
            expected_samples,
            captured: None,
        }
    }

    /// Feed one accepted frame. Returns the new state when it changed.
    pub fn observe(&mut self, meta: &FrameMeta) -> Option<SelfTestState> {
        let is_test = meta.is_test();
        let next = match self.state {
            SelfTestState::Done | SelfTestState::Failed(_) => return None,
            SelfTestState::WaitTestFrame => {
                if is_test && meta.sample_count == TEST_FRAME_SAMPLES {
                    SelfTestState::WaitChannel0
                } else {
                    SelfTestState::Failed(SelfTestFailure::NoTestFrameFirst)
                }
            }
            SelfTestState::WaitChannel0 if is_test => return None,
            SelfTestState::WaitChannel0 => {
                if meta.flags.contains(FrameFlags::ADC0) && !meta.flags.contains(FrameFlags::ADC1)
                {
                    self.captured = Some(CapturedPair {
                        sequence: meta.sequence,
                        samples: meta.sample_count,
                    });
                    SelfTestState::WaitChannel1
                } else {
                    SelfTestState::Failed(SelfTestFailure::ExpectedChannel0)
                }
            }
            SelfTestState::WaitChannel1 if is_test => return None,
            SelfTestState::WaitChannel1 => self.check_channel1(meta),
        };
        self.state = next;
        Some(next)
    }

    fn check_channel1(&self, meta: &FrameMeta) -> SelfTestState {
        let Some(captured) = self.captured else {
            return SelfTestState::Failed(SelfTestFailure::ExpectedChannel0);
        };
        if !meta.flags.contains(FrameFlags::ADC1) || meta.sequence != captured.sequence {
            return SelfTestState::Failed(SelfTestFailure::ExpectedChannel1SameSequence);
        }
        match self.expected_samples {
            Some(expected) if expected != captured.samples => {
                SelfTestState::Failed(SelfTestFailure::SamplesMismatch {
                    expected,
                    observed: captured.samples,
                })
            }
            _ => SelfTestState::Done,
        }
    }

    pub fn state(&self) -> SelfTestState {
        self.state
    }

    pub fn captured(&self) -> Option<CapturedPair> {
        self.captured
    }

    pub fn verdict(&self) -> SelfTestVerdict {
        match self.state {
            SelfTestState::Done => SelfTestVerdict::Pass,
            SelfTestState::Failed(reason) => SelfTestVerdict::Fail(reason),
            _ => SelfTestVerdict::Incomplete,
        }
    }

    pub fn report(&self) -> SelfTestReport {
        let (verdict, reason) = match self.verdict() {
            SelfTestVerdict::Pass => ("PASS", None),
            SelfTestVerdict::Fail(reason) => ("FAIL", Some(reason.as_str())),
            SelfTestVerdict::Incomplete => ("INCOMPLETE", None),
        };
        SelfTestReport {
            verdict,
            reason,
            captured: self.captured,
            expected_samples: self.expected_samples,
        }
    }
}
