use std::fmt;
use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// Largest payload that fits after the opcode byte in one 64-byte command packet.
pub const MAX_COMMAND_PAYLOAD: usize = 63;

/// Identifies one submitted read until its completion is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferHandle(u64);

impl TransferHandle {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome reported by the transport for a finished read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferStatus {
    /// Data (possibly zero bytes) was received.
    Completed,
    /// Generic transfer failure.
    Error,
    /// The read timed out at the transport level.
    TimedOut,
    /// The read was cancelled by the host.
    Cancelled,
    /// The endpoint halted.
    Stall,
    /// The device went away.
    NoDevice,
    /// The device sent more data than the buffer holds.
    Overflow,
}

impl TransferStatus {
    pub fn is_success(self) -> bool {
        self == TransferStatus::Completed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransferStatus::Completed => "completed",
            TransferStatus::Error => "error",
            TransferStatus::TimedOut => "timed_out",
            TransferStatus::Cancelled => "cancelled",
            TransferStatus::Stall => "stall",
            TransferStatus::NoDevice => "no_device",
            TransferStatus::Overflow => "overflow",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finished read. Ownership of the buffer returns to the submitter.
#[derive(Debug)]
pub struct Completion {
    pub handle: TransferHandle,
    pub status: TransferStatus,
    pub buffer: Vec<u8>,
    /// Number of bytes the device actually delivered into `buffer`.
    pub actual_length: usize,
}

impl Completion {
    /// The received bytes, clamped to the buffer length.
    pub fn data(&self) -> &[u8] {
        let len = self.actual_length.min(self.buffer.len());
        &self.buffer[..len]
    }
}

/// Asynchronous bulk-IN read queue plus a short command channel.
///
/// Reads are submitted with an owned buffer that stays with the transport
/// while in flight. [`Transport::poll_completions`] is the only call allowed
/// to block, and only for up to `timeout`.
pub trait Transport {
    /// Queue a read into `buffer`; its capacity is `buffer.len()`.
    fn submit_read(&mut self, buffer: Vec<u8>) -> Result<TransferHandle>;

    /// Request cancellation. The read still completes (as `Cancelled`).
    fn cancel(&mut self, handle: TransferHandle) -> Result<()>;

    /// Wait up to `timeout` for finished reads and return all that are ready.
    fn poll_completions(&mut self, timeout: Duration) -> Result<Vec<Completion>>;

    /// Send an opcode plus up to [`MAX_COMMAND_PAYLOAD`] bytes (bounded, synchronous).
    fn send_command(&mut self, opcode: u8, payload: &[u8]) -> Result<()>;

    /// Synchronous read of at most `max_len` bytes, outside the read queue.
    fn blocking_read(&mut self, max_len: usize, timeout: Duration) -> Result<Bytes>;
}
