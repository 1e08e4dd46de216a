// Licensed under the Apache-2.0 license

//! Shared memory pool between the AP and the AGDSP.

use agdsp_hil::{SharedBlock, SmemPool};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const SMEM_ALIGN: u32 = 0x100;

pub struct EmuSharedBlock {
    phys: u32,
    words: Vec<AtomicU32>,
}

impl EmuSharedBlock {
    fn new(phys: u32, size: usize, init: &[u32]) -> Self {
        let words = (0..size.div_ceil(4))
            .map(|i| AtomicU32::new(init.get(i).copied().unwrap_or(0)))
            .collect();
        EmuSharedBlock { phys, words }
    }
}

impl SharedBlock for EmuSharedBlock {
    fn phys_addr(&self) -> u32 {
        self.phys
    }

    fn size(&self) -> usize {
        self.words.len() * 4
    }

    fn read_u32(&self, offset: usize) -> u32 {
        self.words
            .get(offset / 4)
            .map_or(0, |w| w.load(Ordering::SeqCst))
    }

    fn write_u32(&self, offset: usize, value: u32) {
        if let Some(w) = self.words.get(offset / 4) {
            w.store(value, Ordering::SeqCst);
        }
    }
}

#[derive(Default)]
struct PoolState {
    next: u32,
    blocks: HashMap<u32, Arc<EmuSharedBlock>>,
    stale: HashMap<u32, Vec<u32>>,
    exhausted: bool,
    map_fails: bool,
}

/// Bump allocator over a shared memory window starting at `base`.
pub struct EmuSmemPool {
    state: Mutex<PoolState>,
}

impl EmuSmemPool {
    pub fn new(base: u32) -> Self {
        EmuSmemPool {
            state: Mutex::new(PoolState {
                next: base,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Leaves `words` in memory at `phys`, visible to whoever allocates it next.
    pub fn preload(&self, phys: u32, words: &[u32]) {
        self.state().stale.insert(phys, words.to_vec());
    }

    /// The live reservation at `phys`, as the AGDSP would map it.
    pub fn block_at(&self, phys: u32) -> Option<Arc<EmuSharedBlock>> {
        self.state().blocks.get(&phys).cloned()
    }

    /// Number of reservations not yet freed.
    pub fn outstanding(&self) -> usize {
        self.state().blocks.len()
    }

    pub fn set_exhausted(&self, exhausted: bool) {
        self.state().exhausted = exhausted;
    }

    pub fn set_map_fails(&self, fails: bool) {
        self.state().map_fails = fails;
    }
}

impl SmemPool for EmuSmemPool {
    fn alloc(&self, size: usize) -> Option<u32> {
        let mut state = self.state();
        if state.exhausted {
            return None;
        }
        let phys = state.next;
        let len = u32::try_from(size).ok()?.div_ceil(SMEM_ALIGN) * SMEM_ALIGN;
        state.next = phys.checked_add(len.max(SMEM_ALIGN))?;
        let init = state.stale.remove(&phys).unwrap_or_default();
        state
            .blocks
            .insert(phys, Arc::new(EmuSharedBlock::new(phys, size, &init)));
        Some(phys)
    }

    fn map(&self, phys: u32, _size: usize) -> Option<Arc<dyn SharedBlock>> {
        let state = self.state();
        if state.map_fails {
            return None;
        }
        state
            .blocks
            .get(&phys)
            .map(|b| Arc::clone(b) as Arc<dyn SharedBlock>)
    }

    fn free(&self, phys: u32, _size: usize) {
        self.state().blocks.remove(&phys);
    }
}
