// Licensed under the Apache-2.0 license

//! Reference-counted gate over the AP access enable bit.

use crate::regs::RegField;
use crate::state::{AccessState, SharedAccessState};
use agdsp_error::{AgdspError, AgdspResult};
use agdsp_hil::RegisterMap;
use log::{debug, error};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Result of a successful acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acquired {
    pub state: AccessState,
    /// Status reads spent waking the AGDSP, `None` when no wake was needed.
    pub wake_polls: Option<u32>,
}

/// Owns `ap_enable_cnt` and the access enable bit. Both are only touched with
/// the lock held.
pub struct AccessGate {
    state: Mutex<Option<SharedAccessState>>,
    agcp_ahb: Arc<dyn RegisterMap>,
    ap_access_ena: RegField,
    auto_access: bool,
}

impl AccessGate {
    pub fn new(
        state: SharedAccessState,
        agcp_ahb: Arc<dyn RegisterMap>,
        ap_access_ena: RegField,
        auto_access: bool,
    ) -> Self {
        AccessGate {
            state: Mutex::new(Some(state)),
            agcp_ahb,
            ap_access_ena,
            auto_access,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<SharedAccessState>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes one AP reference.
    ///
    /// `wake` runs with the lock held, and only when this is the first
    /// reference. The counter moves only if every step succeeded. The enable
    /// bit is left set when a later step fails.
    pub fn acquire<F>(&self, wake: F) -> AgdspResult<Acquired>
    where
        F: FnOnce() -> AgdspResult<u32>,
    {
        let guard = self.lock();
        let state = guard.as_ref().ok_or(AgdspError::NotReady)?;
        if !self.auto_access {
            self.enable_access()?;
        }
        let wake_polls = if state.ap_enable_cnt() == 0 {
            Some(wake()?)
        } else {
            None
        };
        state.set_ap_enable_cnt(state.ap_enable_cnt().saturating_add(1));
        Ok(Acquired {
            state: state.snapshot(),
            wake_polls,
        })
    }

    /// Drops one AP reference; clears the enable bit when none remain. A
    /// release without a matching acquire leaves the counter at zero.
    pub fn release(&self) -> AgdspResult<AccessState> {
        let guard = self.lock();
        let state = guard.as_ref().ok_or(AgdspError::NotReady)?;
        let cnt = state.ap_enable_cnt();
        if cnt > 0 {
            state.set_ap_enable_cnt(cnt - 1);
        }
        if !self.auto_access && state.ap_enable_cnt() == 0 {
            let ena = self.ap_access_ena;
            match self.agcp_ahb.update_bits(ena.reg, ena.mask, 0) {
                Ok(()) => debug!("access enable 0x{:x} cleared", ena.mask),
                Err(e) => error!("failed to clear access enable: {}", e),
            }
        }
        Ok(state.snapshot())
    }

    /// Sets the enable bit and checks that it latched.
    fn enable_access(&self) -> AgdspResult<()> {
        let ena = self.ap_access_ena;
        self.agcp_ahb
            .update_bits(ena.reg, ena.mask, ena.mask)
            .inspect_err(|e| error!("failed to set access enable: {}", e))?;
        let (value, _) = ena
            .read(self.agcp_ahb.as_ref())
            .inspect_err(|e| error!("failed to read back access enable: {}", e))?;
        if !ena.is_set(value) {
            error!("access enable not latched, value 0x{:x}", value);
            return Err(AgdspError::AccessNotLatched {
                reg: ena.reg,
                mask: ena.mask,
                value,
            });
        }
        Ok(())
    }

    /// Clears the enable bit regardless of the counter.
    pub fn disable_access(&self) -> AgdspResult<()> {
        let ena = self.ap_access_ena;
        let _guard = self.lock();
        self.agcp_ahb.update_bits(ena.reg, ena.mask, 0)?;
        Ok(())
    }

    pub fn snapshot(&self) -> Option<AccessState> {
        self.lock().as_ref().map(SharedAccessState::snapshot)
    }

    /// Detaches the counters; later acquires and releases report not ready.
    pub fn take_state(&self) -> Option<SharedAccessState> {
        self.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agdsp_config::AgdspPdConfig;
    use agdsp_error::RegmapError;
    use emulator_agcp::EmuRegmap;
    use std::cell::Cell;

    fn gate(auto_access: bool) -> (AccessGate, Arc<EmuRegmap>, RegField) {
        let ahb = Arc::new(EmuRegmap::new("agcp_ahb"));
        let ena: RegField = AgdspPdConfig::default()
            .fields
            .ap_access_ena
            .unwrap()
            .into();
        let state = SharedAccessState::allocate(None).unwrap();
        (AccessGate::new(state, ahb.clone(), ena, auto_access), ahb, ena)
    }

    #[test]
    fn test_wake_only_on_first_reference() {
        let (gate, ahb, ena) = gate(false);
        let wakes = Cell::new(0);
        let wake = || {
            wakes.set(wakes.get() + 1);
            Ok(3)
        };

        let first = gate.acquire(wake).unwrap();
        assert_eq!(first.wake_polls, Some(3));
        assert_eq!(first.state.ap_enable_cnt, 1);
        let second = gate
            .acquire(|| {
                wakes.set(wakes.get() + 1);
                Ok(1)
            })
            .unwrap();
        assert_eq!(second.wake_polls, None);
        assert_eq!(second.state.ap_enable_cnt, 2);
        assert_eq!(wakes.get(), 1);
        assert!(ena.is_set(ahb.value(ena.reg)));

        assert_eq!(gate.release().unwrap().ap_enable_cnt, 1);
        assert!(ena.is_set(ahb.value(ena.reg)));
        assert_eq!(gate.release().unwrap().ap_enable_cnt, 0);
        assert!(!ena.is_set(ahb.value(ena.reg)));
    }

    #[test]
    fn test_extra_release_is_noop() {
        let (gate, _, _) = gate(false);
        assert_eq!(gate.release().unwrap().ap_enable_cnt, 0);
        assert_eq!(gate.release().unwrap().ap_enable_cnt, 0);
        gate.acquire(|| Ok(1)).unwrap();
        assert_eq!(gate.release().unwrap().ap_enable_cnt, 0);
    }

    #[test]
    fn test_failed_wake_keeps_count_and_enable_bit() {
        let (gate, ahb, ena) = gate(false);
        let err = gate
            .acquire(|| {
                Err(AgdspError::WakeTimeout {
                    attempts: 10,
                    elapsed_us: 0,
                })
            })
            .unwrap_err();
        assert!(matches!(err, AgdspError::WakeTimeout { .. }));
        assert_eq!(gate.snapshot().unwrap().ap_enable_cnt, 0);
        assert!(ena.is_set(ahb.value(ena.reg)));
    }

    #[test]
    fn test_unlatched_enable_is_io_error() {
        let (gate, ahb, ena) = gate(false);
        ahb.stick_bits(ena.reg, ena.mask);
        let err = gate.acquire(|| Ok(1)).unwrap_err();
        assert_eq!(
            err,
            AgdspError::AccessNotLatched {
                reg: ena.reg,
                mask: ena.mask,
                value: 0
            }
        );
        assert_eq!(gate.snapshot().unwrap().ap_enable_cnt, 0);
    }

    #[test]
    fn test_update_failure_is_io_error() {
        let (gate, ahb, ena) = gate(false);
        ahb.fail_updates(ena.reg, true);
        let err = gate.acquire(|| Ok(1)).unwrap_err();
        assert_eq!(err, AgdspError::Regmap(RegmapError::Update { reg: ena.reg }));
        assert_eq!(err.errno(), -22);
    }

    #[test]
    fn test_auto_access_never_touches_enable() {
        let (gate, ahb, _) = gate(true);
        gate.acquire(|| Ok(1)).unwrap();
        gate.release().unwrap();
        assert_eq!(ahb.hw_writes(), 0);
    }

    #[test]
    fn test_detached_state_is_not_ready() {
        let (gate, _, _) = gate(false);
        assert!(gate.take_state().is_some());
        assert_eq!(gate.acquire(|| Ok(1)), Err(AgdspError::NotReady));
        assert_eq!(gate.release(), Err(AgdspError::NotReady));
        assert!(gate.snapshot().is_none());
    }
}
