#![no_std]
#![forbid(unsafe_code)]

//! # knl memory
//!
//! The message pool: a fixed array of message slots with an index-linked
//! freelist. Queues borrow slots from a pool and link them into their own
//! [`SlotList`]; a slot is always either free or in exactly one list.

pub mod pool;

pub use pool::*;

/// Message pool statistics for debugging and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolStats {
    /// Total number of slots in the pool
    pub capacity: usize,
    /// Slots currently on the freelist
    pub free: usize,
    /// Slots currently handed out
    pub used: usize,
    /// Fewest free slots ever observed
    pub low_watermark: usize,
}

impl PoolStats {
    /// Statistics of a pool with every slot free
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            free: capacity,
            used: 0,
            low_watermark: capacity,
        }
    }

    /// Update statistics after allocation
    pub fn on_alloc(&mut self) {
        self.used += 1;
        self.free -= 1;
        if self.free < self.low_watermark {
            self.low_watermark = self.free;
        }
    }

    /// Update statistics after a slot is returned
    pub fn on_free(&mut self) {
        if self.used > 0 {
            self.used -= 1;
            self.free += 1;
        }
    }

    /// Check if no slot is left
    pub const fn is_exhausted(&self) -> bool {
        self.free == 0
    }

    /// Get utilization as a percentage (0-100)
    pub fn utilization(&self) -> u8 {
        if self.capacity == 0 {
            0
        } else {
            ((self.used * 100) / self.capacity) as u8
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PoolStats {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "PoolStats{{ capacity: {}, free: {}, used: {}, low: {} }}",
            self.capacity,
            self.free,
            self.used,
            self.low_watermark
        );
    }
}
