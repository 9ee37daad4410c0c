//! Buffer classification.
//!
//! [`decode`] turns one received buffer into a status record, a validated
//! frame or a [`Rejection`]. All length arithmetic is done in `usize` on
//! widened header fields and compared against the received length before any
//! slice is taken, so adversarial headers cannot push a read past the buffer.

use crate::channel::Channel;
use crate::header::{frame_checksum, FrameFlags, FrameHeader, HEADER_SIZE, MAGIC};
use crate::status::StatusRecord;

/// Why a buffer was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum Rejection {
    #[error("{len}-byte buffer is shorter than a frame header")]
    TooShortForHeader { len: usize },

    #[error("bad magic 0x{found:04X}")]
    BadMagic { found: u16 },

    #[error("declared payload of {declared} bytes exceeds the {available} bytes after the header")]
    PayloadOverflow { declared: usize, available: usize },

    #[error("crc mismatch: header 0x{expected:04X}, computed 0x{computed:04X}")]
    CrcMismatch { expected: u16, computed: u16 },
}

impl Rejection {
    /// Stable snake_case tag for counters and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::TooShortForHeader { .. } => "too_short",
            Rejection::BadMagic { .. } => "bad_magic",
            Rejection::PayloadOverflow { .. } => "payload_overflow",
            Rejection::CrcMismatch { .. } => "crc_mismatch",
        }
    }
}

/// Per-frame metadata kept alongside buffered payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMeta {
    pub sequence: u32,
    pub timestamp_ms: u32,
    pub sample_count: u16,
    pub channel: Channel,
    pub flags: FrameFlags,
    pub payload_len: usize,
}

impl FrameMeta {
    pub fn is_test(&self) -> bool {
        self.flags.is_test()
    }

    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.payload_len
    }
}

impl From<&FrameHeader> for FrameMeta {
    fn from(header: &FrameHeader) -> Self {
        Self {
            sequence: header.sequence,
            timestamp_ms: header.timestamp_ms,
            sample_count: header.sample_count,
            channel: header.channel(),
            flags: header.flags,
            payload_len: header.payload_len(),
        }
    }
}

/// A validated frame borrowing its payload from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub header: FrameHeader,
    pub meta: FrameMeta,
    pub payload: &'a [u8],
}

/// Result of classifying one buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<'a> {
    Status(StatusRecord),
    Frame(Frame<'a>),
    Rejected(Rejection),
}

/// Classify `buf`, the bytes actually received.
///
/// Trailing bytes past the declared payload are ignored.
pub fn decode(buf: &[u8]) -> Decoded<'_> {
    if let Some(status) = StatusRecord::parse(buf) {
        return Decoded::Status(status);
    }

    let Some(header) = FrameHeader::parse(buf) else {
        return Decoded::Rejected(Rejection::TooShortForHeader { len: buf.len() });
    };
    if header.magic != MAGIC {
        return Decoded::Rejected(Rejection::BadMagic {
            found: header.magic,
        });
    }

    let declared = header.payload_len();
    let available = buf.len() - HEADER_SIZE;
    if declared > available {
        return Decoded::Rejected(Rejection::PayloadOverflow {
            declared,
            available,
        });
    }
    let payload = &buf[HEADER_SIZE..HEADER_SIZE + declared];

    if header.flags.has_crc() {
        let computed = frame_checksum(&buf[..HEADER_SIZE], payload);
        if computed != header.crc16 {
            return Decoded::Rejected(Rejection::CrcMismatch {
                expected: header.crc16,
                computed,
            });
        }
    }

    Decoded::Frame(Frame {
        meta: FrameMeta::from(&header),
        header,
        payload,
    })
}

/// Steady-state frame shape, seeded by the first non-test frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Baseline {
    pub frame_len: Option<usize>,
    pub sample_count: Option<u16>,
    /// Non-test frames whose sample count differed from the baseline.
    pub drift: u64,
    pub test_frames: u64,
}

impl Baseline {
    fn observe(&mut self, meta: &FrameMeta) {
        if meta.is_test() {
            self.test_frames += 1;
            return;
        }
        match self.sample_count {
            None => {
                self.frame_len = Some(meta.frame_len());
                self.sample_count = Some(meta.sample_count);
            }
            Some(samples) if samples != meta.sample_count => self.drift += 1,
            Some(_) => {}
        }
    }
}

/// [`decode`] plus baseline and drift tracking over accepted frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    baseline: Baseline,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode<'a>(&mut self, buf: &'a [u8]) -> Decoded<'a> {
        let decoded = decode(buf);
        if let Decoded::Frame(frame) = &decoded {
            self.baseline.observe(&frame.meta);
        }
        decoded
    }

    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }
}
