// Licensed under the Apache-2.0 license

//! HIL interface for memory shared between the AP and the AGDSP.

use std::sync::Arc;

/// Byte offsets of the AP and AGDSP access counters in the shared block.
pub const AP_ENABLE_CNT_OFFSET: usize = 0;
pub const CP_ENABLE_CNT_OFFSET: usize = 4;

/// An uncached mapping of a shared memory block. Every access goes to memory
/// so that updates made by the remote core are observed.
pub trait SharedBlock: Send + Sync {
    /// Physical address of the block as seen by the remote core.
    fn phys_addr(&self) -> u32;

    fn size(&self) -> usize;

    /// Reads the word at byte offset `offset`.
    fn read_u32(&self, offset: usize) -> u32;

    /// Writes the word at byte offset `offset`.
    fn write_u32(&self, offset: usize, value: u32);
}

pub trait SmemPool: Send + Sync {
    /// Reserves `size` bytes and returns the physical address, or `None` when
    /// the pool is exhausted.
    fn alloc(&self, size: usize) -> Option<u32>;

    /// Maps a reservation previously returned by `alloc`.
    fn map(&self, phys: u32, size: usize) -> Option<Arc<dyn SharedBlock>>;

    /// Releases a reservation. Outstanding mappings must not be used afterwards.
    fn free(&self, phys: u32, size: usize);
}
