//! Read queue plus the per-buffer decode path.
//!
//! Each slot keeps one read in flight. When a read completes successfully
//! the slot is rearmed with its spare buffer first, then the completed
//! buffer is decoded and becomes the new spare. A transport failure retires
//! the slot for good.

use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;
use std::time::{Duration, Instant};

use bulkstream_frame::{
    Baseline, Channel, Command, Decoded, Frame, FrameDecoder, FrameRing, Rejection, RingError,
    StatusRecord,
};
use bulkstream_transport::{Completion, TransferHandle, TransferStatus, Transport};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::selftest::{SelfTestMonitor, SelfTestState};
use crate::sequence::{SequenceEvent, SequenceTracker};
use crate::stats::StatsAggregator;

/// Bytes shown when dumping an unrecognised packet.
const RAW_DUMP_LIMIT: usize = 48;

/// Status records held until [`TransferPipeline::take_status_records`]; older ones are dropped.
pub const MAX_PENDING_STATUS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// A read is queued with the transport.
    InFlight(TransferHandle),
    /// Nothing queued; the slot is not rearmed again.
    Idle,
    /// The last read failed with this status.
    Retired(TransferStatus),
}

#[derive(Debug)]
struct Slot {
    state: SlotState,
    spare: Option<Vec<u8>>,
}

/// What happened to in-flight reads at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Reads a cancel was issued for.
    pub requested: usize,
    pub cancelled: usize,
    /// Reads that still delivered data before their cancel landed.
    pub completed: usize,
    pub failed: usize,
    /// Reads never seen again within the drain window.
    pub leaked: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Data,
    Cancelled,
    Failed,
    Unknown,
}

/// Hex bytes separated by spaces, cut at `limit` with a trailing `...`.
pub(crate) fn hex_dump(data: &[u8], limit: usize) -> String {
    let mut out = String::with_capacity(data.len().min(limit) * 3 + 4);
    for (i, byte) in data.iter().take(limit).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02X}");
    }
    if data.len() > limit {
        out.push_str(" ...");
    }
    out
}

pub struct TransferPipeline<T> {
    transport: T,
    slots: Vec<Slot>,
    in_flight: HashMap<TransferHandle, usize>,
    transfer_size: usize,
    decoder: FrameDecoder,
    sequence: SequenceTracker,
    self_test: Option<SelfTestMonitor>,
    rings: [FrameRing; 2],
    stats: StatsAggregator,
    last_status: Option<StatusRecord>,
    fresh_status: VecDeque<StatusRecord>,
    dump_frames: usize,
    dump_raw_small: usize,
}

impl<T: Transport> TransferPipeline<T> {
    /// Build an unarmed pipeline. The config is normalized first.
    pub fn new(transport: T, config: &PipelineConfig) -> Self {
        let config = config.normalized();
        let slots = (0..config.queue_depth)
            .map(|_| Slot {
                state: SlotState::Idle,
                spare: Some(vec![0u8; config.transfer_size]),
            })
            .collect();
        let ring = || FrameRing::new(config.ring_capacity, config.ring_arena_size);

        Self {
            transport,
            slots,
            in_flight: HashMap::with_capacity(config.queue_depth),
            transfer_size: config.transfer_size,
            decoder: FrameDecoder::new(),
            sequence: SequenceTracker::new(),
            self_test: config
                .self_test
                .then(|| SelfTestMonitor::new(config.expected_samples)),
            rings: [ring(), ring()],
            stats: StatsAggregator::new(Instant::now()),
            last_status: None,
            fresh_status: VecDeque::with_capacity(MAX_PENDING_STATUS),
            dump_frames: config.dump_frames,
            dump_raw_small: config.dump_raw_small,
        }
    }

    /// Queue a read on every slot. Returns how many were armed.
    pub fn start(&mut self) -> Result<usize> {
        let armed = (0..self.slots.len()).filter(|&index| self.arm(index)).count();
        if armed == 0 {
            return Err(PipelineError::NoSlotsArmed {
                requested: self.slots.len(),
            });
        }
        info!(
            armed,
            depth = self.slots.len(),
            transfer_size = self.transfer_size,
            "read queue armed"
        );
        Ok(armed)
    }

    fn arm(&mut self, index: usize) -> bool {
        let size = self.transfer_size;
        let slot = &mut self.slots[index];
        let buffer = slot.spare.take().unwrap_or_else(|| vec![0u8; size]);
        match self.transport.submit_read(buffer) {
            Ok(handle) => {
                slot.state = SlotState::InFlight(handle);
                self.in_flight.insert(handle, index);
                true
            }
            Err(err) => {
                slot.state = SlotState::Idle;
                warn!(slot = index, error = %err, "read submission failed; slot left idle");
                false
            }
        }
    }

    /// Wait up to `timeout` for completions and process them in order.
    /// Returns the number of completions handled.
    pub fn poll(&mut self, timeout: Duration) -> Result<usize> {
        let completions = self.transport.poll_completions(timeout)?;
        let count = completions.len();
        for completion in completions {
            self.handle_completion(completion, true);
        }
        Ok(count)
    }

    fn handle_completion(&mut self, completion: Completion, rearm: bool) -> Outcome {
        let Some(index) = self.in_flight.remove(&completion.handle) else {
            debug!(handle = %completion.handle, "completion for unknown transfer");
            return Outcome::Unknown;
        };

        if !completion.status.is_success() {
            let slot = &mut self.slots[index];
            slot.spare = Some(completion.buffer);
            if completion.status == TransferStatus::Cancelled {
                slot.state = SlotState::Idle;
                return Outcome::Cancelled;
            }
            slot.state = SlotState::Retired(completion.status);
            warn!(slot = index, status = %completion.status, "transfer failed; slot retired");
            return Outcome::Failed;
        }

        self.slots[index].state = SlotState::Idle;
        if rearm {
            self.arm(index);
        }
        self.process(completion.data());
        self.slots[index].spare = Some(completion.buffer);
        Outcome::Data
    }

    fn process(&mut self, data: &[u8]) {
        self.stats.record_transfer(data.len());
        match self.decoder.decode(data) {
            Decoded::Status(record) => self.accept_status(record),
            Decoded::Rejected(rejection) => self.reject(data, rejection),
            Decoded::Frame(frame) => self.accept_frame(frame, data.len()),
        }
    }

    fn accept_frame(&mut self, frame: Frame<'_>, received_len: usize) {
        let meta = frame.meta;
        self.stats.record_frame(&meta, received_len);

        if self.dump_frames > 0 {
            self.dump_frames -= 1;
            info!(
                sequence = meta.sequence,
                flags = meta.flags.bits(),
                test = meta.is_test(),
                channel = %meta.channel,
                samples = meta.sample_count,
                frame_len = meta.frame_len(),
                actual_len = received_len,
                "frame"
            );
        }

        if let Some(monitor) = self.self_test.as_mut() {
            match monitor.observe(&meta) {
                Some(SelfTestState::Done) => info!(
                    sequence = meta.sequence,
                    samples = meta.sample_count,
                    "self-test passed"
                ),
                Some(SelfTestState::Failed(reason)) => {
                    warn!(%reason, sequence = meta.sequence, "self-test failed")
                }
                Some(state) => debug!(?state, "self-test advanced"),
                None => {}
            }
        }

        match self.sequence.observe(meta.sequence, meta.channel) {
            SequenceEvent::Paired { .. } => self.stats.record_pair(),
            event if event.is_anomaly() => debug!(?event, "sequence anomaly"),
            _ => {}
        }

        // The ring counts its own drops.
        match self.rings[meta.channel.index()].push(meta, frame.payload) {
            Ok(()) => {}
            Err(RingError::Full { capacity }) => trace!(
                channel = %meta.channel,
                sequence = meta.sequence,
                capacity,
                "ring full, frame dropped"
            ),
            Err(err) => trace!(
                channel = %meta.channel,
                sequence = meta.sequence,
                error = %err,
                "frame not buffered"
            ),
        }
    }

    fn reject(&mut self, data: &[u8], rejection: Rejection) {
        self.stats.record_rejection(&rejection);
        let dumpable = matches!(
            rejection,
            Rejection::TooShortForHeader { .. } | Rejection::BadMagic { .. }
        );
        if dumpable && self.dump_raw_small > 0 {
            self.dump_raw_small -= 1;
            info!(
                len = data.len(),
                reason = rejection.kind(),
                hex = %hex_dump(data, RAW_DUMP_LIMIT),
                "raw packet"
            );
        }
        debug!(%rejection, len = data.len(), "buffer rejected");
    }

    /// Record a status record, whether it came from the read queue or not.
    pub fn accept_status(&mut self, record: StatusRecord) {
        self.stats.record_status();
        let c = &record.counters;
        info!(
            signature = %record.variant,
            len = record.received_len,
            version = c.version,
            current_samples = c.current_samples,
            produced_sequence = c.produced_sequence,
            dma0 = c.dma_done[0],
            dma1 = c.dma_done[1],
            sent0 = c.sent[0],
            sent1 = c.sent[1],
            test_frames = c.test_frames,
            runtime_flags = c.runtime_flags,
            truncated = record.is_truncated(),
            "status record"
        );
        debug!(hex = %hex_dump(record.raw(), record.raw().len()), "status raw");
        if self.fresh_status.len() == MAX_PENDING_STATUS {
            self.fresh_status.pop_front();
            trace!(limit = MAX_PENDING_STATUS, "oldest pending status record dropped");
        }
        self.fresh_status.push_back(record.clone());
        self.last_status = Some(record);
    }

    /// Cancel every in-flight read and poll until they come back or
    /// `iterations` rounds of `timeout` pass. Slots still outstanding are
    /// abandoned and reported as leaked.
    pub fn shutdown(&mut self, iterations: usize, timeout: Duration) -> DrainReport {
        let mut report = DrainReport::default();

        for index in 0..self.slots.len() {
            if let SlotState::InFlight(handle) = self.slots[index].state {
                report.requested += 1;
                if let Err(err) = self.transport.cancel(handle) {
                    warn!(slot = index, %handle, error = %err, "cancel failed");
                }
            }
        }

        for _ in 0..iterations {
            if self.in_flight.is_empty() {
                break;
            }
            let completions = match self.transport.poll_completions(timeout) {
                Ok(completions) => completions,
                Err(err) => {
                    warn!(error = %err, "drain poll failed");
                    break;
                }
            };
            for completion in completions {
                match self.handle_completion(completion, false) {
                    Outcome::Data => report.completed += 1,
                    Outcome::Cancelled => report.cancelled += 1,
                    Outcome::Failed => report.failed += 1,
                    Outcome::Unknown => {}
                }
            }
        }

        let leaked: Vec<usize> = self.in_flight.drain().map(|(_, index)| index).collect();
        report.leaked = leaked.len();
        for index in leaked {
            self.slots[index].state = SlotState::Idle;
        }
        if report.leaked > 0 {
            warn!(leaked = report.leaked, "reads still outstanding after drain");
        } else {
            debug!(?report, "read queue drained");
        }
        report
    }

    /// Send one command on the control channel.
    pub fn send_command(&mut self, command: Command) -> Result<()> {
        self.transport
            .send_command(command.opcode(), &command.payload())?;
        debug!(%command, "command sent");
        Ok(())
    }

    /// At least one read is still queued.
    pub fn is_alive(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn slot_states(&self) -> Vec<SlotState> {
        self.slots.iter().map(|slot| slot.state).collect()
    }

    pub fn retired_slots(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot.state, SlotState::Retired(_)))
            .count()
    }

    pub fn queue_depth(&self) -> usize {
        self.slots.len()
    }

    pub fn transfer_size(&self) -> usize {
        self.transfer_size
    }

    pub fn ring(&self, channel: Channel) -> &FrameRing {
        &self.rings[channel.index()]
    }

    pub fn ring_mut(&mut self, channel: Channel) -> &mut FrameRing {
        &mut self.rings[channel.index()]
    }

    pub fn ring_occupancy(&self) -> [usize; 2] {
        [self.rings[0].count(), self.rings[1].count()]
    }

    pub fn sequence(&self) -> &SequenceTracker {
        &self.sequence
    }

    pub fn self_test(&self) -> Option<&SelfTestMonitor> {
        self.self_test.as_ref()
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut StatsAggregator {
        &mut self.stats
    }

    pub fn baseline(&self) -> &Baseline {
        self.decoder.baseline()
    }

    pub fn last_status(&self) -> Option<&StatusRecord> {
        self.last_status.as_ref()
    }

    /// Status records received since the previous call, oldest first. At
    /// most [`MAX_PENDING_STATUS`] are kept between calls.
    pub fn take_status_records(&mut self) -> Vec<StatusRecord> {
        self.fresh_status.drain(..).collect()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}
