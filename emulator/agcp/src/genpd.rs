// Licensed under the Apache-2.0 license

//! Power-domain framework: registry of providers plus call accounting.

use agdsp_error::{AgdspError, AgdspResult};
use agdsp_hil::{GenericPowerDomain, PowerDomainProvider};
use log::info;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
pub struct EmuGenpd {
    domains: Mutex<HashMap<String, Arc<dyn GenericPowerDomain>>>,
    power_on_calls: AtomicU32,
    power_off_calls: AtomicU32,
}

impl EmuGenpd {
    pub fn new() -> Self {
        Self::default()
    }

    fn domains(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn GenericPowerDomain>>> {
        self.domains.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn domain(&self, name: &str) -> Option<Arc<dyn GenericPowerDomain>> {
        self.domains().get(name).cloned()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.domains().contains_key(name)
    }

    /// Runs the domain's power-on callback for one consumer.
    pub fn power_on(&self, name: &str) -> AgdspResult<()> {
        let domain = self.domain(name).ok_or(AgdspError::NotReady)?;
        self.power_on_calls.fetch_add(1, Ordering::SeqCst);
        domain.power_on()
    }

    /// Runs the domain's power-off callback for one consumer.
    pub fn power_off(&self, name: &str) -> AgdspResult<()> {
        let domain = self.domain(name).ok_or(AgdspError::NotReady)?;
        self.power_off_calls.fetch_add(1, Ordering::SeqCst);
        domain.power_off()
    }

    pub fn power_on_calls(&self) -> u32 {
        self.power_on_calls.load(Ordering::SeqCst)
    }

    pub fn power_off_calls(&self) -> u32 {
        self.power_off_calls.load(Ordering::SeqCst)
    }
}

impl PowerDomainProvider for EmuGenpd {
    fn add_provider(&self, domain: Arc<dyn GenericPowerDomain>) -> AgdspResult<()> {
        let name = domain.name().to_string();
        let mut domains = self.domains();
        if domains.contains_key(&name) {
            return Err(AgdspError::InvalidConfig(format!(
                "power domain {name} already registered"
            )));
        }
        info!("genpd: added provider {}", name);
        domains.insert(name, domain);
        Ok(())
    }

    fn remove_provider(&self, name: &str) {
        if self.domains().remove(name).is_some() {
            info!("genpd: removed provider {}", name);
        }
    }
}
