//! Sequence continuity and stereo pairing.
//!
//! Both channels emit one frame per sequence number. The tracker holds the
//! sequence being assembled plus a bit per channel already seen for it, and
//! classifies every accepted frame against that state.

use bulkstream_frame::Channel;
use serde::Serialize;

/// What one frame did to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceEvent {
    /// First channel of the expected sequence arrived.
    Pending { sequence: u32 },
    /// Both channels of `sequence` have arrived; expectation moved on.
    Paired { sequence: u32 },
    /// The same channel arrived twice for the sequence being assembled.
    ChannelDuplicate { sequence: u32, channel: Channel },
    /// A frame of the sequence that was just completed.
    SequenceDuplicate { sequence: u32 },
    /// `missing` sequences were skipped; tracking resumed at `sequence`.
    Gap { sequence: u32, missing: u32 },
    /// An older sequence showed up. Expectation is left alone.
    BackwardJump { sequence: u32, expected: u32 },
}

impl SequenceEvent {
    pub fn is_anomaly(&self) -> bool {
        !matches!(
            self,
            SequenceEvent::Pending { .. } | SequenceEvent::Paired { .. }
        )
    }
}

/// Running stream-health counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SequenceCounters {
    pub pairs: u64,
    /// Total sequences skipped over by forward gaps.
    pub missing: u64,
    pub gap_events: u64,
    pub sequence_duplicates: u64,
    pub channel_duplicates: u64,
    pub backward_jumps: u64,
}

/// Sequence being assembled and the channels already seen for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceState {
    pub expected: u32,
    pub mask: u8,
}

const BOTH_CHANNELS: u8 = 0b11;

#[derive(Debug, Default)]
pub struct SequenceTracker {
    state: Option<SequenceState>,
    counters: SequenceCounters,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one accepted frame.
    pub fn observe(&mut self, sequence: u32, channel: Channel) -> SequenceEvent {
        let state = self.state.get_or_insert(SequenceState {
            expected: sequence,
            mask: 0,
        });
        let bit = channel.mask_bit();

        if sequence == state.expected {
            if state.mask & bit != 0 {
                self.counters.channel_duplicates += 1;
                return SequenceEvent::ChannelDuplicate { sequence, channel };
            }
            state.mask |= bit;
            if state.mask == BOTH_CHANNELS {
                self.counters.pairs += 1;
                state.expected = state.expected.wrapping_add(1);
                state.mask = 0;
                return SequenceEvent::Paired { sequence };
            }
            SequenceEvent::Pending { sequence }
        } else if sequence == state.expected.wrapping_sub(1) {
            self.counters.sequence_duplicates += 1;
            SequenceEvent::SequenceDuplicate { sequence }
        } else if sequence > state.expected {
            let missing = sequence - state.expected;
            self.counters.missing += u64::from(missing);
            self.counters.gap_events += 1;
            state.expected = sequence;
            state.mask = bit;
            SequenceEvent::Gap { sequence, missing }
        } else {
            self.counters.backward_jumps += 1;
            SequenceEvent::BackwardJump {
                sequence,
                expected: state.expected,
            }
        }
    }

    /// `None` until the first frame.
    pub fn state(&self) -> Option<SequenceState> {
        self.state
    }

    pub fn counters(&self) -> &SequenceCounters {
        &self.counters
    }
}
