//! Wire protocol for the sample stream.
//!
//! Every bulk read carries exactly one of:
//! - a sample frame: 32-byte little-endian header (magic `0xA55A`) followed
//!   by `sample_count * 2` payload bytes, optionally CRC-16 protected
//! - a status record: 16..=192 bytes starting with `STAT` or `ST2T`
//!
//! [`decode`] classifies a buffer without ever reading past its length.
//! [`FrameRing`] buffers decoded payloads per channel.

pub mod channel;
pub mod command;
pub mod crc;
pub mod decoder;
pub mod error;
pub mod header;
pub mod ring;
pub mod status;

pub use channel::Channel;
pub use command::Command;
pub use crc::{crc16, CRC_INIT};
pub use decoder::{decode, Baseline, Decoded, Frame, FrameDecoder, FrameMeta, Rejection};
pub use error::{FrameError, Result, RingError};
pub use header::{
    encode_frame, frame_checksum, FrameFlags, FrameHeader, CRC_OFFSET, HEADER_SIZE, MAGIC,
    MAX_PAYLOAD_LEN, PROTOCOL_VERSION,
};
pub use ring::{FrameRing, DEFAULT_ARENA_SIZE, DEFAULT_RING_CAPACITY};
pub use status::{
    Readiness, StatusCounters, StatusRecord, StatusVariant, STATUS_MAX_LEN, STATUS_MIN_LEN,
    READINESS_MIN_LEN, STATUS_RAW_CAP, STATUS_RECORD_SIZE,
};
