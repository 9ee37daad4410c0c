/// Errors that can occur while encoding frames or status records.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload length does not match `sample_count * 2`.
    #[error("payload is {actual} bytes but the header declares {declared}")]
    PayloadLengthMismatch { declared: usize, actual: usize },

    /// More samples than the 16-bit sample count can describe.
    #[error("payload of {len} bytes exceeds the largest frame ({max} bytes)")]
    PayloadTooLarge { len: usize, max: usize },

    /// A status record length outside the recognised window.
    #[error("status record length {len} outside {min}..={max}")]
    StatusLength { len: usize, min: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// Outcome of a ring push or pop that did not store or return an entry.
///
/// Push failures are drops, not faults: the ring counts them and stays intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RingError {
    /// Every metadata slot holds an unread entry.
    #[error("ring full ({capacity} entries)")]
    Full { capacity: usize },

    /// The arena has no contiguous free region for the payload.
    #[error("no contiguous arena space for {needed} bytes")]
    NoArenaSpace { needed: usize },

    /// The payload can never fit, even in an empty arena.
    #[error("payload of {len} bytes exceeds the {arena}-byte arena")]
    Oversized { len: usize, arena: usize },

    /// Nothing to pop.
    #[error("ring empty")]
    Empty,
}
