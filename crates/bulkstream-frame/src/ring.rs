//! Bounded FIFO of decoded payloads backed by a byte arena.
//!
//! Payloads are copied into the arena at a moving writer offset that wraps
//! to the start once the tail of the arena is too small. A payload is placed
//! only in one contiguous free region, so bytes of an unread entry are never
//! overwritten; when no such region exists the push is dropped.

use std::collections::VecDeque;
use std::fmt;

use bytes::Bytes;
use tracing::debug;

use crate::decoder::FrameMeta;
use crate::error::RingError;

pub const DEFAULT_RING_CAPACITY: usize = 1024;
pub const DEFAULT_ARENA_SIZE: usize = 4_000_000;

#[derive(Debug, Clone, Copy)]
struct Entry {
    meta: FrameMeta,
    offset: usize,
    len: usize,
}

pub struct FrameRing {
    entries: VecDeque<Entry>,
    capacity: usize,
    arena: Box<[u8]>,
    /// Next write offset.
    head: usize,
    /// Live data occupies `[oldest, ..)` followed by `[0, head)`.
    wrapped: bool,
    drops: u64,
}

impl fmt::Debug for FrameRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameRing")
            .field("count", &self.entries.len())
            .field("capacity", &self.capacity)
            .field("arena_size", &self.arena.len())
            .field("head", &self.head)
            .field("wrapped", &self.wrapped)
            .field("drops", &self.drops)
            .finish()
    }
}

impl Default for FrameRing {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAPACITY, DEFAULT_ARENA_SIZE)
    }
}

impl FrameRing {
    /// A ring holding at most `capacity` entries (at least one) and
    /// `arena_size` payload bytes.
    pub fn new(capacity: usize, arena_size: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            arena: vec![0u8; arena_size].into_boxed_slice(),
            head: 0,
            wrapped: false,
            drops: 0,
        }
    }

    /// Copy `payload` in. On error the ring is unchanged apart from the drop count.
    pub fn push(&mut self, meta: FrameMeta, payload: &[u8]) -> Result<(), RingError> {
        match self.place(payload.len()) {
            Ok(offset) => {
                let len = payload.len();
                self.arena[offset..offset + len].copy_from_slice(payload);
                self.head = offset + len;
                self.entries.push_back(Entry { meta, offset, len });
                Ok(())
            }
            Err(err) => {
                self.drops += 1;
                debug!(
                    sequence = meta.sequence,
                    channel = %meta.channel,
                    len = payload.len(),
                    reason = %err,
                    "ring push dropped"
                );
                Err(err)
            }
        }
    }

    /// Find the write offset for `len` bytes, updating the wrap state.
    fn place(&mut self, len: usize) -> Result<usize, RingError> {
        if self.entries.len() >= self.capacity {
            return Err(RingError::Full {
                capacity: self.capacity,
            });
        }
        if len > self.arena.len() {
            return Err(RingError::Oversized {
                len,
                arena: self.arena.len(),
            });
        }
        let Some(oldest) = self.entries.front().map(|entry| entry.offset) else {
            self.head = 0;
            self.wrapped = false;
            return Ok(0);
        };

        if self.wrapped {
            if self.head + len <= oldest {
                return Ok(self.head);
            }
        } else if self.head + len <= self.arena.len() {
            return Ok(self.head);
        } else if len <= oldest {
            self.wrapped = true;
            return Ok(0);
        }
        Err(RingError::NoArenaSpace { needed: len })
    }

    /// Remove and return the oldest entry.
    pub fn pop(&mut self) -> Result<(FrameMeta, Bytes), RingError> {
        let entry = self.entries.pop_front().ok_or(RingError::Empty)?;
        let payload = Bytes::copy_from_slice(&self.arena[entry.offset..entry.offset + entry.len]);

        match self.entries.front() {
            None => {
                self.head = 0;
                self.wrapped = false;
            }
            Some(next) if self.wrapped && next.offset < entry.offset => self.wrapped = false,
            Some(_) => {}
        }
        Ok((entry.meta, payload))
    }

    /// Metadata of the oldest entry, if any.
    pub fn peek(&self) -> Option<&FrameMeta> {
        self.entries.front().map(|entry| &entry.meta)
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn arena_size(&self) -> usize {
        self.arena.len()
    }

    /// Payload bytes held by unread entries.
    pub fn buffered_bytes(&self) -> usize {
        self.entries.iter().map(|entry| entry.len).sum()
    }

    /// Pushes rejected since construction.
    pub fn drops(&self) -> u64 {
        self.drops
    }

    /// Discard every entry. The drop count is kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.head = 0;
        self.wrapped = false;
    }
}
