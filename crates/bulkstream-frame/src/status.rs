//! Device status records.
//!
//! A status record shares the bulk endpoint with frames and is recognised by
//! its length (16..=192 bytes) and 4-byte signature. Only the first
//! [`STATUS_RECORD_SIZE`] bytes carry named counters; shorter records leave
//! the missing counters at zero.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

pub const STATUS_MIN_LEN: usize = 16;
pub const STATUS_MAX_LEN: usize = 192;

/// Size of the counter block that follows the signature.
pub const STATUS_RECORD_SIZE: usize = 52;

/// How many raw bytes of a record are kept verbatim.
pub const STATUS_RAW_CAP: usize = 64;

/// Smallest standard record that carries the readiness bits.
pub const READINESS_MIN_LEN: usize = 64;

const ALT_ACTIVE_OFFSET: usize = 50;
const ALT_ACTIVE_BIT: u16 = 1 << 15;
const OUT_ARMED_OFFSET: usize = 53;
const OUT_ARMED_BIT: u8 = 1 << 7;

/// Which signature the record carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusVariant {
    /// `STAT`
    Standard,
    /// `ST2T`, the extended debug flavour.
    Diagnostic,
}

impl StatusVariant {
    pub fn signature(self) -> [u8; 4] {
        match self {
            StatusVariant::Standard => *b"STAT",
            StatusVariant::Diagnostic => *b"ST2T",
        }
    }

    pub fn from_signature(sig: &[u8]) -> Option<Self> {
        match sig {
            b"STAT" => Some(StatusVariant::Standard),
            b"ST2T" => Some(StatusVariant::Diagnostic),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusVariant::Standard => "STAT",
            StatusVariant::Diagnostic => "ST2T",
        }
    }
}

impl fmt::Display for StatusVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named counters from the record body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusCounters {
    pub version: u8,
    pub current_samples: u16,
    pub frame_bytes: u16,
    pub test_frames: u16,
    pub produced_sequence: u32,
    /// Frames handed to the endpoint, per channel.
    pub sent: [u32; 2],
    pub tx_complete: u32,
    pub partial_abort: u32,
    pub size_mismatch: u32,
    /// DMA half/full completions, per channel.
    pub dma_done: [u32; 2],
    pub frame_write_sequence: u32,
    pub runtime_flags: u16,
    pub reserved: u16,
}

impl StatusCounters {
    fn read(block: &[u8; STATUS_RECORD_SIZE]) -> Self {
        let mut src = &block[4..];
        let version = src.get_u8();
        src.advance(1);
        Self {
            version,
            current_samples: src.get_u16_le(),
            frame_bytes: src.get_u16_le(),
            test_frames: src.get_u16_le(),
            produced_sequence: src.get_u32_le(),
            sent: [src.get_u32_le(), src.get_u32_le()],
            tx_complete: src.get_u32_le(),
            partial_abort: src.get_u32_le(),
            size_mismatch: src.get_u32_le(),
            dma_done: [src.get_u32_le(), src.get_u32_le()],
            frame_write_sequence: src.get_u32_le(),
            runtime_flags: src.get_u16_le(),
            reserved: src.get_u16_le(),
        }
    }

    fn write(&self, dst: &mut BytesMut) {
        dst.put_u8(self.version);
        dst.put_u8(0);
        dst.put_u16_le(self.current_samples);
        dst.put_u16_le(self.frame_bytes);
        dst.put_u16_le(self.test_frames);
        dst.put_u32_le(self.produced_sequence);
        dst.put_u32_le(self.sent[0]);
        dst.put_u32_le(self.sent[1]);
        dst.put_u32_le(self.tx_complete);
        dst.put_u32_le(self.partial_abort);
        dst.put_u32_le(self.size_mismatch);
        dst.put_u32_le(self.dma_done[0]);
        dst.put_u32_le(self.dma_done[1]);
        dst.put_u32_le(self.frame_write_sequence);
        dst.put_u16_le(self.runtime_flags);
        dst.put_u16_le(self.reserved);
    }
}

/// Endpoint readiness advertised by long standard records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub alt_active: bool,
    pub out_armed: bool,
}

/// One decoded status record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub variant: StatusVariant,
    pub counters: StatusCounters,
    /// Length of the buffer the record arrived in.
    pub received_len: usize,
    raw: Bytes,
}

impl StatusRecord {
    /// Recognise and parse a status record. `None` when `buf` is not one.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if !Self::matches(buf) {
            return None;
        }
        let variant = StatusVariant::from_signature(&buf[..4])?;

        let mut block = [0u8; STATUS_RECORD_SIZE];
        let copied = buf.len().min(STATUS_RECORD_SIZE);
        block[..copied].copy_from_slice(&buf[..copied]);

        Some(Self {
            variant,
            counters: StatusCounters::read(&block),
            received_len: buf.len(),
            raw: Bytes::copy_from_slice(&buf[..buf.len().min(STATUS_RAW_CAP)]),
        })
    }

    /// Whether `buf` has the length and signature of a status record.
    pub(crate) fn matches(buf: &[u8]) -> bool {
        (STATUS_MIN_LEN..=STATUS_MAX_LEN).contains(&buf.len())
            && StatusVariant::from_signature(&buf[..4]).is_some()
    }

    /// Up to [`STATUS_RAW_CAP`] leading bytes, verbatim.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The record was longer than the raw copy.
    pub fn is_truncated(&self) -> bool {
        self.received_len > STATUS_RAW_CAP
    }

    /// Readiness bits, present only in standard records of at least 64 bytes.
    pub fn readiness(&self) -> Option<Readiness> {
        if self.variant != StatusVariant::Standard || self.raw.len() < READINESS_MIN_LEN {
            return None;
        }
        let flags = u16::from_le_bytes([
            self.raw[ALT_ACTIVE_OFFSET],
            self.raw[ALT_ACTIVE_OFFSET + 1],
        ]);
        Some(Readiness {
            alt_active: flags & ALT_ACTIVE_BIT != 0,
            out_armed: self.raw[OUT_ARMED_OFFSET] & OUT_ARMED_BIT != 0,
        })
    }

    /// Append a `len`-byte record to `dst`. The counter block is cut short or
    /// zero-padded to fit.
    pub fn encode(
        variant: StatusVariant,
        counters: &StatusCounters,
        len: usize,
        dst: &mut BytesMut,
    ) -> Result<()> {
        if !(STATUS_MIN_LEN..=STATUS_MAX_LEN).contains(&len) {
            return Err(FrameError::StatusLength {
                len,
                min: STATUS_MIN_LEN,
                max: STATUS_MAX_LEN,
            });
        }
        let mut record = BytesMut::with_capacity(STATUS_RECORD_SIZE.max(len));
        record.put_slice(&variant.signature());
        counters.write(&mut record);
        record.resize(len, 0);
        dst.put_slice(&record);
        Ok(())
    }
}
