use std::time::Duration;

use crate::traits::TransferHandle;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An I/O error occurred on the underlying device or file.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport refused to queue a read.
    #[error("failed to submit read: {0}")]
    Submit(String),

    /// A command payload does not fit in a single short packet.
    #[error("command payload too long ({len} bytes, max {max})")]
    CommandTooLong { len: usize, max: usize },

    /// A bounded operation did not finish in time.
    #[error("transport operation timed out after {0:?}")]
    Timeout(Duration),

    /// The device is gone.
    #[error("device disconnected")]
    NoDevice,

    /// The handle does not refer to an in-flight transfer.
    #[error("unknown transfer {0}")]
    UnknownTransfer(TransferHandle),

    /// A capture file is malformed.
    #[error("invalid capture: {0}")]
    InvalidCapture(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
