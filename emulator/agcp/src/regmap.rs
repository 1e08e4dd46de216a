// Licensed under the Apache-2.0 license

//! Register map with a register cache, modelled on syscon regmaps.

use agdsp_error::RegmapError;
use agdsp_hil::{RegisterMap, SysconLookup};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct RegmapState {
    hw: HashMap<u32, u32>,
    cache: HashMap<u32, u32>,
    cache_only: bool,
    mode_switches: u32,
    hw_reads: u64,
    hw_writes: u64,
    stuck: HashMap<u32, u32>,
    fail_reads: HashSet<u32>,
    fail_updates: HashSet<u32>,
}

/// An emulated register map.
///
/// Live mode reads and writes hardware and keeps the cache in step.
/// Cache-only mode serves reads from the cache, fails reads of registers that
/// were never cached and keeps writes in the cache.
pub struct EmuRegmap {
    name: String,
    regs: Mutex<RegmapState>,
}

impl EmuRegmap {
    pub fn new(name: &str) -> Self {
        EmuRegmap {
            name: name.to_string(),
            regs: Mutex::new(RegmapState::default()),
        }
    }

    fn regs(&self) -> MutexGuard<'_, RegmapState> {
        self.regs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current hardware value, bypassing the cache and the counters.
    pub fn value(&self, reg: u32) -> u32 {
        self.regs().hw.get(&reg).copied().unwrap_or(0)
    }

    /// Sets a hardware value as if the block changed it on its own.
    pub fn set_value(&self, reg: u32, value: u32) {
        self.regs().hw.insert(reg, value);
    }

    pub fn is_cache_only(&self) -> bool {
        self.regs().cache_only
    }

    /// Number of `set_cache_only` calls so far.
    pub fn mode_switches(&self) -> u32 {
        self.regs().mode_switches
    }

    pub fn hw_reads(&self) -> u64 {
        self.regs().hw_reads
    }

    pub fn hw_writes(&self) -> u64 {
        self.regs().hw_writes
    }

    /// Makes the bits in `mask` of `reg` ignore writes.
    pub fn stick_bits(&self, reg: u32, mask: u32) {
        *self.regs().stuck.entry(reg).or_default() |= mask;
    }

    pub fn fail_reads(&self, reg: u32, fail: bool) {
        let mut regs = self.regs();
        if fail {
            regs.fail_reads.insert(reg);
        } else {
            regs.fail_reads.remove(&reg);
        }
    }

    pub fn fail_updates(&self, reg: u32, fail: bool) {
        let mut regs = self.regs();
        if fail {
            regs.fail_updates.insert(reg);
        } else {
            regs.fail_updates.remove(&reg);
        }
    }
}

impl RegisterMap for EmuRegmap {
    fn read(&self, reg: u32) -> Result<u32, RegmapError> {
        let mut regs = self.regs();
        if regs.fail_reads.contains(&reg) {
            return Err(RegmapError::Read { reg });
        }
        if regs.cache_only {
            return regs.cache.get(&reg).copied().ok_or(RegmapError::Read { reg });
        }
        regs.hw_reads += 1;
        let value = regs.hw.get(&reg).copied().unwrap_or(0);
        regs.cache.insert(reg, value);
        Ok(value)
    }

    fn update_bits(&self, reg: u32, mask: u32, val: u32) -> Result<(), RegmapError> {
        let mut regs = self.regs();
        if regs.fail_updates.contains(&reg) {
            return Err(RegmapError::Update { reg });
        }
        if regs.cache_only {
            let old = regs.cache.get(&reg).copied().unwrap_or(0);
            regs.cache.insert(reg, (old & !mask) | (val & mask));
            return Ok(());
        }
        regs.hw_writes += 1;
        let old = regs.hw.get(&reg).copied().unwrap_or(0);
        let stuck = regs.stuck.get(&reg).copied().unwrap_or(0);
        let new = (old & !mask) | (val & mask);
        let new = (new & !stuck) | (old & stuck);
        regs.hw.insert(reg, new);
        regs.cache.insert(reg, new);
        Ok(())
    }

    fn set_cache_only(&self, enable: bool) {
        let mut regs = self.regs();
        regs.cache_only = enable;
        regs.mode_switches += 1;
    }
}

/// Name to register map table.
#[derive(Default)]
pub struct EmuSyscon {
    maps: HashMap<String, Arc<dyn RegisterMap>>,
}

impl EmuSyscon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, map: Arc<dyn RegisterMap>) {
        self.maps.insert(name.to_string(), map);
    }
}

impl SysconLookup for EmuSyscon {
    fn regmap(&self, name: &str) -> Option<Arc<dyn RegisterMap>> {
        self.maps.get(name).cloned()
    }
}
