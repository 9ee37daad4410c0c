//! Fixed 32-byte frame header.
//!
//! ```text
//! off  size  field
//!   0     2  magic (0xA55A)
//!   2     1  version
//!   3     1  flags
//!   4     4  sequence
//!   8     4  timestamp (ms)
//!  12     2  sample count
//!  14     2  zone count
//!  16     4  zone1 offset
//!  20     4  zone1 length
//!  24     4  reserved
//!  28     2  reserved2
//!  30     2  crc16
//! ```
//!
//! All fields little-endian. The payload (`sample_count * 2` bytes) follows.

use std::ops::BitOr;

use bytes::{Buf, BufMut, BytesMut};

use crate::channel::Channel;
use crate::crc::{crc16, CRC_INIT};
use crate::error::{FrameError, Result};

pub const HEADER_SIZE: usize = 32;
pub const MAGIC: u16 = 0xA55A;
pub const PROTOCOL_VERSION: u8 = 1;

/// Offset of the trailing checksum; everything before it is covered.
pub const CRC_OFFSET: usize = 30;

/// Largest payload a 16-bit sample count can describe.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize * 2;

/// Header flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameFlags(u8);

impl FrameFlags {
    pub const ADC0: Self = Self(0x01);
    pub const ADC1: Self = Self(0x02);
    pub const CRC: Self = Self(0x04);
    pub const TEST: Self = Self(0x80);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn has_crc(self) -> bool {
        self.contains(Self::CRC)
    }

    pub fn is_test(self) -> bool {
        self.contains(Self::TEST)
    }
}

impl BitOr for FrameFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Decoded frame header, field for field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub magic: u16,
    pub version: u8,
    pub flags: FrameFlags,
    pub sequence: u32,
    pub timestamp_ms: u32,
    pub sample_count: u16,
    pub zone_count: u16,
    pub zone1_offset: u32,
    pub zone1_length: u32,
    pub reserved: u32,
    pub reserved2: u16,
    pub crc16: u16,
}

impl FrameHeader {
    /// A single-zone sample frame for `channel`.
    pub fn new(sequence: u32, channel: Channel, sample_count: u16) -> Self {
        let payload_len = u32::from(sample_count) * 2;
        Self {
            magic: MAGIC,
            version: PROTOCOL_VERSION,
            flags: channel.flag(),
            sequence,
            timestamp_ms: 0,
            sample_count,
            zone_count: 1,
            zone1_offset: HEADER_SIZE as u32,
            zone1_length: payload_len,
            reserved: 0,
            reserved2: 0,
            crc16: 0,
        }
    }

    /// A synthetic handshake frame. Carries no channel bit.
    pub fn test_frame(sequence: u32, sample_count: u16) -> Self {
        Self {
            flags: FrameFlags::TEST,
            ..Self::new(sequence, Channel::Adc0, sample_count)
        }
    }

    /// Header sized for `payload_len` bytes of 16-bit samples.
    pub fn for_payload(sequence: u32, channel: Channel, payload_len: usize) -> Result<Self> {
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(FrameError::PayloadTooLarge {
                len: payload_len,
                max: MAX_PAYLOAD_LEN,
            });
        }
        if payload_len % 2 != 0 {
            return Err(FrameError::PayloadLengthMismatch {
                declared: payload_len & !1,
                actual: payload_len,
            });
        }
        Ok(Self::new(sequence, channel, (payload_len / 2) as u16))
    }

    pub fn with_crc(mut self) -> Self {
        self.flags = self.flags | FrameFlags::CRC;
        self
    }

    pub fn with_timestamp(mut self, timestamp_ms: u32) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    pub fn channel(&self) -> Channel {
        Channel::from_flags(self.flags)
    }

    /// Declared payload length, computed in `usize` so it cannot overflow.
    pub fn payload_len(&self) -> usize {
        usize::from(self.sample_count) * 2
    }

    /// Header plus declared payload.
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.payload_len()
    }

    /// Parse the first [`HEADER_SIZE`] bytes of `buf`. `None` if too short.
    ///
    /// No field is validated here; magic and length checks belong to the decoder.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        let mut src = buf.get(..HEADER_SIZE)?;
        Some(Self {
            magic: src.get_u16_le(),
            version: src.get_u8(),
            flags: FrameFlags(src.get_u8()),
            sequence: src.get_u32_le(),
            timestamp_ms: src.get_u32_le(),
            sample_count: src.get_u16_le(),
            zone_count: src.get_u16_le(),
            zone1_offset: src.get_u32_le(),
            zone1_length: src.get_u32_le(),
            reserved: src.get_u32_le(),
            reserved2: src.get_u16_le(),
            crc16: src.get_u16_le(),
        })
    }

    /// Append the 32 header bytes to `dst` exactly as stored.
    pub fn write(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE);
        dst.put_u16_le(self.magic);
        dst.put_u8(self.version);
        dst.put_u8(self.flags.0);
        dst.put_u32_le(self.sequence);
        dst.put_u32_le(self.timestamp_ms);
        dst.put_u16_le(self.sample_count);
        dst.put_u16_le(self.zone_count);
        dst.put_u32_le(self.zone1_offset);
        dst.put_u32_le(self.zone1_length);
        dst.put_u32_le(self.reserved);
        dst.put_u16_le(self.reserved2);
        dst.put_u16_le(self.crc16);
    }
}

/// Two-pass frame checksum: the header up to the CRC field, then the payload.
///
/// `header` may be shorter than [`CRC_OFFSET`]; only what is present is hashed.
pub fn frame_checksum(header: &[u8], payload: &[u8]) -> u16 {
    let covered = &header[..header.len().min(CRC_OFFSET)];
    crc16(payload, crc16(covered, CRC_INIT))
}

/// Append one complete frame to `dst`.
///
/// When the header carries the CRC flag the checksum field is computed here,
/// overriding `header.crc16`.
pub fn encode_frame(header: &FrameHeader, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() != header.payload_len() {
        return Err(FrameError::PayloadLengthMismatch {
            declared: header.payload_len(),
            actual: payload.len(),
        });
    }

    let start = dst.len();
    dst.reserve(header.frame_len());
    header.write(dst);
    dst.put_slice(payload);

    if header.flags.has_crc() {
        let crc = frame_checksum(&dst[start..start + HEADER_SIZE], payload);
        dst[start + CRC_OFFSET..start + HEADER_SIZE].copy_from_slice(&crc.to_le_bytes());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_offsets() {
        let mut header = FrameHeader::new(0x0102_0304, Channel::Adc1, 0x0506);
        header.timestamp_ms = 0x0A0B_0C0D;
        header.reserved = 0x1111_2222;
        header.reserved2 = 0x3344;
        header.crc16 = 0xBEEF;

        let mut buf = BytesMut::new();
        header.write(&mut buf);
        assert_eq!(buf.len(), HEADER_SIZE);
        assert_eq!(&buf[0..2], &[0x5A, 0xA5]);
        assert_eq!(buf[2], PROTOCOL_VERSION);
        assert_eq!(buf[3], 0x02);
        assert_eq!(&buf[4..8], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&buf[8..12], &[0x0D, 0x0C, 0x0B, 0x0A]);
        assert_eq!(&buf[12..14], &[0x06, 0x05]);
        assert_eq!(&buf[14..16], &[0x01, 0x00]);
        assert_eq!(&buf[16..20], &[32, 0, 0, 0]);
        assert_eq!(&buf[20..24], &(0x0506u32 * 2).to_le_bytes());
        assert_eq!(&buf[24..28], &[0x22, 0x22, 0x11, 0x11]);
        assert_eq!(&buf[28..30], &[0x44, 0x33]);
        assert_eq!(&buf[30..32], &[0xEF, 0xBE]);

        assert_eq!(FrameHeader::parse(&buf), Some(header));
    }

    #[test]
    fn parse_needs_full_header() {
        assert_eq!(FrameHeader::parse(&[0u8; HEADER_SIZE - 1]), None);
    }

    #[test]
    fn payload_len_does_not_overflow() {
        let header = FrameHeader::new(0, Channel::Adc0, u16::MAX);
        assert_eq!(header.payload_len(), 131_070);
        assert_eq!(header.frame_len(), 131_102);
    }

    #[test]
    fn encode_fills_crc_field() {
        let header = FrameHeader::new(9, Channel::Adc0, 2).with_crc();
        let payload = [1, 2, 3, 4];
        let mut buf = BytesMut::new();
        encode_frame(&header, &payload, &mut buf).unwrap();

        assert_eq!(buf.len(), HEADER_SIZE + 4);
        let expected = crc16(&payload, crc16(&buf[..CRC_OFFSET], CRC_INIT));
        assert_eq!(&buf[CRC_OFFSET..HEADER_SIZE], &expected.to_le_bytes());
        assert_eq!(frame_checksum(&buf[..HEADER_SIZE], &payload), expected);
    }

    #[test]
    fn encode_without_crc_keeps_field() {
        let mut header = FrameHeader::new(1, Channel::Adc0, 0);
        header.crc16 = 0x1234;
        let mut buf = BytesMut::new();
        encode_frame(&header, &[], &mut buf).unwrap();
        assert_eq!(&buf[CRC_OFFSET..], &[0x34, 0x12]);
    }

    #[test]
    fn encode_appends_after_existing_bytes() {
        let mut buf = BytesMut::from(&b"xx"[..]);
        let header = FrameHeader::new(1, Channel::Adc1, 1).with_crc();
        encode_frame(&header, &[7, 8], &mut buf).unwrap();

        let parsed = FrameHeader::parse(&buf[2..]).unwrap();
        assert_eq!(parsed.crc16, frame_checksum(&buf[2..2 + HEADER_SIZE], &[7, 8]));
    }

    #[test]
    fn encode_rejects_wrong_payload_length() {
        let header = FrameHeader::new(1, Channel::Adc0, 4);
        let err = encode_frame(&header, &[0; 6], &mut BytesMut::new()).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadLengthMismatch {
                declared: 8,
                actual: 6
            }
        ));
    }

    #[test]
    fn for_payload_checks_bounds() {
        assert_eq!(
            FrameHeader::for_payload(3, Channel::Adc1, 10).unwrap().sample_count,
            5
        );
        assert!(matches!(
            FrameHeader::for_payload(3, Channel::Adc0, 7),
            Err(FrameError::PayloadLengthMismatch { .. })
        ));
        assert!(matches!(
            FrameHeader::for_payload(3, Channel::Adc0, MAX_PAYLOAD_LEN + 2),
            Err(FrameError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_frame_has_no_channel_bits() {
        let header = FrameHeader::test_frame(0, 8);
        assert!(header.flags.is_test());
        assert!(!header.flags.contains(FrameFlags::ADC0));
        assert_eq!(header.channel(), Channel::Adc0);
    }
}
