// Licensed under the Apache-2.0 license

use crate::access::{AccessGate, Acquired};
use crate::handshake::{HandshakeParams, HandshakeWorker};
use crate::regcache::RegCacheSwitch;
use crate::regs::{AccessFields, AdcpState, PdState};
use crate::state::{AccessState, SharedAccessState};
use crate::wake::WakeSequencer;
use agdsp_config::AgdspPdConfig;
use agdsp_error::{AgdspError, AgdspResult, RegmapError};
use agdsp_hil::{
    GenericPowerDomain, MailboxChannel, PowerDomainProvider, RegisterMap, SmemPool, SmsgChannel,
    SysconLookup,
};
use log::{debug, error, info, warn};
use poll_common::PollPolicy;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::time::Duration;

/// Collaborators handed to [`AgdspAccess::probe`].
#[derive(Clone)]
pub struct AgdspResources {
    pub syscon: Arc<dyn SysconLookup>,
    /// Pool for the shared counters. `None` keeps them in AP-local memory.
    pub smem: Option<Arc<dyn SmemPool>>,
    pub ipc: Arc<dyn SmsgChannel>,
    /// Framework the power domain is registered with, if any.
    pub provider: Option<Arc<dyn PowerDomainProvider>>,
}

/// Access controller for one AGCP power domain.
///
/// Created by [`AgdspAccess::probe`] and shared as an `Arc` by every caller.
/// Becomes ready once the handshake channel to the AGDSP is open.
pub struct AgdspAccess {
    name: String,
    auto_access: bool,
    fields: AccessFields,
    agcp_ahb: Arc<dyn RegisterMap>,
    pmu_apb: Arc<dyn RegisterMap>,
    gate: AccessGate,
    wake: WakeSequencer,
    caches: RegCacheSwitch,
    mailbox: OnceLock<Arc<dyn MailboxChannel>>,
    ready: Arc<AtomicBool>,
    smem_phys_addr: u32,
    worker: Mutex<Option<HandshakeWorker>>,
    provider: Mutex<Option<Arc<dyn PowerDomainProvider>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AgdspAccess {
    /// Resolves the board description, reserves the shared counters, starts
    /// the handshake worker and registers the power domain.
    pub fn probe(config: &AgdspPdConfig, res: AgdspResources) -> AgdspResult<Arc<Self>> {
        config
            .verify()
            .map_err(|e| AgdspError::InvalidConfig(e.to_string()))?;
        info!(
            "{}: auto agcp access = {}, ddr addr offset = 0x{:x}",
            config.name, config.auto_agcp_access, config.ddr_addr_offset
        );

        let (Some(agcp_ahb), Some(pmu_apb)) = (
            res.syscon.regmap(&config.syscon.agcp_ahb),
            res.syscon.regmap(&config.syscon.pmu_apb),
        ) else {
            error!("{}: agcp_ahb or pmu_apb not exist", config.name);
            return Err(AgdspError::InvalidConfig(
                "agcp_ahb or pmu_apb not exist".into(),
            ));
        };
        let fields = AccessFields::from_config(&config.fields)?;
        debug!("{}: {:x?}", config.name, fields);

        let caches = RegCacheSwitch::resolve(
            &config.syscon,
            res.syscon.as_ref(),
            config.timing.cache_settle(),
        );
        let state = SharedAccessState::allocate(res.smem.as_ref())?;
        let smem_phys_addr = state.phys_addr();
        let gate = AccessGate::new(
            state,
            Arc::clone(&agcp_ahb),
            fields.ap_access_ena,
            config.auto_agcp_access,
        );
        if !config.auto_agcp_access {
            if let Err(e) = gate.disable_access() {
                warn!("{}: failed to clear access enable: {}", config.name, e);
            }
        }
        let wake = WakeSequencer::new(Arc::clone(&pmu_apb), fields.pwr_status4, &config.timing);

        let ready = Arc::new(AtomicBool::new(false));
        let params = HandshakeParams {
            dst: config.ipc.dst,
            channel: config.ipc.channel,
            reply_value: smem_phys_addr.wrapping_add(config.ddr_addr_offset),
            retry: config.timing.channel_retry(),
        };
        let worker = match HandshakeWorker::spawn(Arc::clone(&res.ipc), params, Arc::clone(&ready))
        {
            Ok(worker) => worker,
            Err(e) => {
                error!("{}: agdsp access thread create failed: {}", config.name, e);
                if let Some(state) = gate.take_state() {
                    state.release();
                }
                return Err(e);
            }
        };

        let access = Arc::new(AgdspAccess {
            name: config.name.clone(),
            auto_access: config.auto_agcp_access,
            fields,
            agcp_ahb,
            pmu_apb,
            gate,
            wake,
            caches,
            mailbox: OnceLock::new(),
            ready,
            smem_phys_addr,
            worker: Mutex::new(Some(worker)),
            provider: Mutex::new(None),
        });

        if let Some(provider) = res.provider {
            let domain = Arc::new(AgdspPowerDomain::new(&access));
            if let Err(e) = provider.add_provider(domain) {
                error!("{}: add provider failed: {}", access.name, e);
                access.remove();
                return Err(e);
            }
            *lock(&access.provider) = Some(provider);
        }
        Ok(access)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Installs the mailbox used to wake the AGDSP. Only the first call takes
    /// effect.
    pub fn set_mailbox(&self, mailbox: Arc<dyn MailboxChannel>) {
        if self.mailbox.set(mailbox).is_err() {
            warn!("{}: mailbox already installed", self.name);
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Waits up to `timeout` for the handshake channel to open.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        PollPolicy::new(u32::MAX, Duration::from_millis(1), timeout)
            .run(|| Ok::<_, Infallible>(self.is_ready()))
            .is_ok()
    }

    fn mailbox_if_ready(&self) -> AgdspResult<&Arc<dyn MailboxChannel>> {
        if !self.is_ready() {
            error!("{}: agdsp access not ready", self.name);
            return Err(AgdspError::NotReady);
        }
        self.mailbox.get().ok_or_else(|| {
            error!("{}: agdsp mailbox not installed", self.name);
            AgdspError::NotReady
        })
    }

    /// Takes an AP reference on the AGCP, waking the AGDSP on the first one.
    ///
    /// The register maps are switched to live access afterwards even when
    /// the enable or wake step failed.
    pub fn power_on(&self) -> AgdspResult<()> {
        let mailbox = self.mailbox_if_ready()?;
        debug!("{}: power on, auto agcp access={}", self.name, self.auto_access);
        let result = self.gate.acquire(|| self.wake.wake(mailbox.as_ref()));
        self.caches.set_live();
        match result {
            Ok(Acquired { state, wake_polls }) => {
                info!(
                    "{}: power on, ap_enable_cnt={}, cp_enable_cnt={}, polls={}",
                    self.name,
                    state.ap_enable_cnt,
                    state.cp_enable_cnt,
                    wake_polls.unwrap_or(0)
                );
                Ok(())
            }
            Err(e) => {
                error!("{}: power on failed: {}", self.name, e);
                Err(e)
            }
        }
    }

    /// Drops an AP reference. The register maps go cache-only first.
    pub fn power_off(&self) -> AgdspResult<()> {
        if !self.is_ready() {
            return Err(AgdspError::NotReady);
        }
        debug!("{}: power off", self.name);
        self.caches.set_cache_only();
        let state = self.gate.release()?;
        info!(
            "{}: power off, ap_enable_cnt={}, cp_enable_cnt={}",
            self.name, state.ap_enable_cnt, state.cp_enable_cnt
        );
        Ok(())
    }

    /// Reports whether the AP may touch AGCP registers right now. Advisory
    /// only: nothing is locked and a read error counts as "no".
    pub fn can_access(&self) -> bool {
        match self.check_access() {
            Ok(ok) => ok,
            Err(e) => {
                error!("{}: can_access: {}", self.name, e);
                false
            }
        }
    }

    fn check_access(&self) -> Result<bool, RegmapError> {
        let f = &self.fields;
        if !self.auto_access {
            let (value, _) = f.ap_access_ena.read(self.agcp_ahb.as_ref())?;
            if !f.ap_access_ena.is_set(value) {
                debug!("{}: access enable not set, value 0x{:x}", self.name, value);
                return Ok(false);
            }
        }
        let pmu = self.pmu_apb.as_ref();
        let (value, _) = f.sleep_ctrl.read(pmu)?;
        if f.sleep_ctrl.is_set(value) {
            debug!("{}: agcp in deep sleep, value 0x{:x}", self.name, value);
            return Ok(false);
        }
        let (value, slp) = f.slp_status.read(pmu)?;
        if slp != u32::from(AdcpState::WakeupLock) {
            debug!(
                "{}: sleep status {:?}, value 0x{:x}",
                self.name,
                AdcpState::try_from(slp),
                value
            );
            return Ok(false);
        }
        for field in [f.pwr_status4, f.pwr_status3] {
            let (value, state) = field.read(pmu)?;
            if state != u32::from(PdState::Wakeup) {
                debug!(
                    "{}: power state {:?} in 0x{:x}, value 0x{:x}",
                    self.name,
                    PdState::try_from(state),
                    field.reg,
                    value
                );
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Current counters, `None` after removal.
    pub fn access_state(&self) -> Option<AccessState> {
        self.gate.snapshot()
    }

    /// Physical address of the shared counters, zero when they are AP-local.
    pub fn smem_phys_addr(&self) -> u32 {
        self.smem_phys_addr
    }

    pub fn handshake_running(&self) -> bool {
        lock(&self.worker)
            .as_ref()
            .is_some_and(HandshakeWorker::is_running)
    }

    /// Tears the controller down: stops the worker, unregisters the domain
    /// and releases the shared counters. Later calls report not ready.
    pub fn remove(&self) {
        self.ready.store(false, Ordering::SeqCst);
        if let Some(mut worker) = lock(&self.worker).take() {
            worker.stop();
        }
        if let Some(provider) = lock(&self.provider).take() {
            provider.remove_provider(&self.name);
        }
        if let Some(state) = self.gate.take_state() {
            state.release();
        }
        info!("{}: removed", self.name);
    }
}

/// The power domain registered with the framework. Holds the controller
/// weakly so the registration does not keep it alive.
pub struct AgdspPowerDomain {
    name: String,
    access: Weak<AgdspAccess>,
}

impl AgdspPowerDomain {
    pub fn new(access: &Arc<AgdspAccess>) -> Self {
        AgdspPowerDomain {
            name: access.name.clone(),
            access: Arc::downgrade(access),
        }
    }

    fn access(&self) -> AgdspResult<Arc<AgdspAccess>> {
        self.access.upgrade().ok_or(AgdspError::NotReady)
    }
}

impl GenericPowerDomain for AgdspPowerDomain {
    fn name(&self) -> &str {
        &self.name
    }

    fn power_on(&self) -> AgdspResult<()> {
        self.access()?.power_on()
    }

    fn power_off(&self) -> AgdspResult<()> {
        self.access()?.power_off()
    }
}
