//! Raw transfer captures.
//!
//! A capture stores the bytes of each completed bulk read, in arrival order,
//! so a session can be replayed offline through [`crate::MemoryTransport`].
//!
//! ```text
//! ┌────────────┬──────────────┬──────────────┬─────────────────────────────┐
//! │ "BSCP" (4B)│ version (2B) │ reserved (2B)│ records: len (4B LE) + data │
//! └────────────┴──────────────┴──────────────┴─────────────────────────────┘
//! ```

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, TransportError};

/// File signature.
pub const CAPTURE_MAGIC: [u8; 4] = *b"BSCP";

/// Current capture format version.
pub const CAPTURE_VERSION: u16 = 1;

const CAPTURE_HEADER_SIZE: usize = 8;
const RECORD_PREFIX_SIZE: usize = 4;

/// Upper bound for one record; no bulk read is anywhere near this large.
pub const MAX_RECORD_LEN: usize = 1024 * 1024;

/// Write a capture containing `packets`. Returns the number of records written.
pub fn write_capture<W, I, P>(dst: &mut W, packets: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = P>,
    P: AsRef<[u8]>,
{
    let mut buf = BytesMut::with_capacity(CAPTURE_HEADER_SIZE);
    buf.put_slice(&CAPTURE_MAGIC);
    buf.put_u16_le(CAPTURE_VERSION);
    buf.put_u16_le(0);

    let mut records = 0usize;
    for packet in packets {
        let packet = packet.as_ref();
        if packet.len() > MAX_RECORD_LEN {
            return Err(TransportError::InvalidCapture(format!(
                "record {records} is {} bytes (max {MAX_RECORD_LEN})",
                packet.len()
            )));
        }
        buf.reserve(RECORD_PREFIX_SIZE + packet.len());
        buf.put_u32_le(packet.len() as u32);
        buf.put_slice(packet);
        records += 1;
    }

    dst.write_all(&buf)?;
    dst.flush()?;
    Ok(records)
}

/// Read every record of a capture.
pub fn read_capture<R: Read>(src: &mut R) -> Result<Vec<Bytes>> {
    let mut raw = Vec::new();
    src.read_to_end(&mut raw)?;
    let mut buf = Bytes::from(raw);

    if buf.len() < CAPTURE_HEADER_SIZE {
        return Err(TransportError::InvalidCapture(format!(
            "file is {} bytes, shorter than the {CAPTURE_HEADER_SIZE}-byte header",
            buf.len()
        )));
    }
    if buf[..4] != CAPTURE_MAGIC {
        return Err(TransportError::InvalidCapture(
            "missing BSCP signature".to_string(),
        ));
    }
    buf.advance(4);
    let version = buf.get_u16_le();
    if version != CAPTURE_VERSION {
        return Err(TransportError::InvalidCapture(format!(
            "unsupported version {version}"
        )));
    }
    buf.advance(2);

    let mut records = Vec::new();
    while buf.has_remaining() {
        if buf.remaining() < RECORD_PREFIX_SIZE {
            return Err(TransportError::InvalidCapture(format!(
                "truncated length prefix after record {}",
                records.len()
            )));
        }
        let len = buf.get_u32_le() as usize;
        if len > MAX_RECORD_LEN || len > buf.remaining() {
            return Err(TransportError::InvalidCapture(format!(
                "record {} declares {len} bytes, {} available",
                records.len(),
                buf.remaining()
            )));
        }
        records.push(buf.split_to(len));
    }
    Ok(records)
}
