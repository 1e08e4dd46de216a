// Licensed under the Apache-2.0 license

//! PMU view of the AGCP subsystem.
//!
//! Models the fields the access controller reads: the deep sleep bit, the
//! sleep status and the two power sequencer states. A wake request (any
//! mailbox interrupt) brings the AGDSP up after a configurable number of
//! reads of the AGDSP power state.

use agdsp_config::{FieldsConfig, RegFieldConfig};
use agdsp_error::RegmapError;
use agdsp_hil::RegisterMap;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

const WAKEUP_LOCK_STATE: u32 = 6;
const DEEP_SLEEP_STATE: u32 = 0;
const PD_WAKEUP_STATE: u32 = 0;
const PD_SHUTDOWN_STATE: u32 = 7;

fn put_field(regs: &mut HashMap<u32, u32>, field: Option<RegFieldConfig>, value: u32) {
    if let Some(f) = field.filter(|f| f.mask != 0) {
        let old = regs.get(&f.reg).copied().unwrap_or(0);
        let shifted = (value << f.mask.trailing_zeros()) & f.mask;
        regs.insert(f.reg, (old & !f.mask) | shifted);
    }
}

struct PmuState {
    regs: HashMap<u32, u32>,
    awake: bool,
    wake_after: Option<u32>,
    pending: Option<u32>,
    pwr_status4_reads: u32,
    fail_reads: HashSet<u32>,
}

pub struct EmuPmu {
    fields: FieldsConfig,
    state: Mutex<PmuState>,
}

impl EmuPmu {
    /// Creates the PMU with the AGCP asleep. By default the AGDSP reports the
    /// wake state on the first read after a wake request.
    pub fn new(fields: &FieldsConfig) -> Self {
        let pmu = EmuPmu {
            fields: *fields,
            state: Mutex::new(PmuState {
                regs: HashMap::new(),
                awake: false,
                wake_after: Some(1),
                pending: None,
                pwr_status4_reads: 0,
                fail_reads: HashSet::new(),
            }),
        };
        pmu.apply(&mut pmu.state(), false);
        pmu
    }

    fn state(&self) -> MutexGuard<'_, PmuState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, state: &mut PmuState, awake: bool) {
        state.awake = awake;
        let f = &self.fields;
        put_field(&mut state.regs, f.pmu_sleep_ctrl, u32::from(!awake));
        put_field(
            &mut state.regs,
            f.pmu_slp_status,
            if awake { WAKEUP_LOCK_STATE } else { DEEP_SLEEP_STATE },
        );
        let pd = if awake { PD_WAKEUP_STATE } else { PD_SHUTDOWN_STATE };
        put_field(&mut state.regs, f.pmu_pwr_status4, pd);
        put_field(&mut state.regs, f.pmu_pwr_status3, pd);
    }

    /// Number of power-state reads needed after a wake request, `None` for an
    /// AGDSP that never wakes.
    pub fn set_wake_after(&self, reads: Option<u32>) {
        self.state().wake_after = reads.map(|r| r.max(1));
    }

    /// Starts waking the AGDSP, as a mailbox interrupt does.
    pub fn request_wake(&self) {
        let mut state = self.state();
        if !state.awake && state.pending.is_none() {
            state.pending = state.wake_after;
            debug!("pmu: wake requested, pending {:?}", state.pending);
        }
    }

    /// Wakes the AGCP immediately.
    pub fn set_awake(&self) {
        let mut state = self.state();
        state.pending = None;
        self.apply(&mut state, true);
    }

    /// Puts the AGCP back into deep sleep.
    pub fn sleep(&self) {
        let mut state = self.state();
        state.pending = None;
        self.apply(&mut state, false);
    }

    pub fn is_awake(&self) -> bool {
        self.state().awake
    }

    pub fn pwr_status4_reads(&self) -> u32 {
        self.state().pwr_status4_reads
    }

    pub fn fail_reads(&self, reg: u32, fail: bool) {
        let mut state = self.state();
        if fail {
            state.fail_reads.insert(reg);
        } else {
            state.fail_reads.remove(&reg);
        }
    }
}

impl RegisterMap for EmuPmu {
    fn read(&self, reg: u32) -> Result<u32, RegmapError> {
        let mut state = self.state();
        if state.fail_reads.contains(&reg) {
            return Err(RegmapError::Read { reg });
        }
        if self.fields.pmu_pwr_status4.is_some_and(|f| f.reg == reg) {
            state.pwr_status4_reads += 1;
            if let Some(left) = state.pending {
                if left <= 1 {
                    state.pending = None;
                    self.apply(&mut state, true);
                } else {
                    state.pending = Some(left - 1);
                }
            }
        }
        Ok(state.regs.get(&reg).copied().unwrap_or(0))
    }

    fn update_bits(&self, reg: u32, mask: u32, val: u32) -> Result<(), RegmapError> {
        let mut state = self.state();
        let old = state.regs.get(&reg).copied().unwrap_or(0);
        state.regs.insert(reg, (old & !mask) | (val & mask));
        Ok(())
    }

    // The PMU stays powered; its map is never cached.
    fn set_cache_only(&self, _enable: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use agdsp_config::AgdspPdConfig;

    #[test]
    fn test_wake_after_reads() {
        let fields = AgdspPdConfig::default().fields;
        let pwr4 = fields.pmu_pwr_status4.unwrap();
        let pmu = EmuPmu::new(&fields);
        pmu.set_wake_after(Some(3));
        assert_eq!((pmu.read(pwr4.reg).unwrap() & pwr4.mask) >> 8, PD_SHUTDOWN_STATE);

        pmu.request_wake();
        assert_ne!(pmu.read(pwr4.reg).unwrap() & pwr4.mask, 0);
        assert_ne!(pmu.read(pwr4.reg).unwrap() & pwr4.mask, 0);
        assert_eq!(pmu.read(pwr4.reg).unwrap() & pwr4.mask, 0);
        assert!(pmu.is_awake());
        assert_eq!(pmu.pwr_status4_reads(), 4);
    }

    #[test]
    fn test_awake_fields() {
        let fields = AgdspPdConfig::default().fields;
        let pmu = EmuPmu::new(&fields);
        let slp = fields.pmu_slp_status.unwrap();
        let ctrl = fields.pmu_sleep_ctrl.unwrap();
        assert_ne!(pmu.read(ctrl.reg).unwrap() & ctrl.mask, 0);

        pmu.set_awake();
        assert_eq!(pmu.read(ctrl.reg).unwrap() & ctrl.mask, 0);
        assert_eq!(
            (pmu.read(slp.reg).unwrap() & slp.mask) >> slp.mask.trailing_zeros(),
            WAKEUP_LOCK_STATE
        );

        pmu.sleep();
        assert!(!pmu.is_awake());
    }
}
