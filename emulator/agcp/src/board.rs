// Licensed under the Apache-2.0 license

//! A complete emulated AGCP board wired from a board description.

use crate::genpd::EmuGenpd;
use crate::mailbox::EmuMailbox;
use crate::pmu::EmuPmu;
use crate::regmap::{EmuRegmap, EmuSyscon};
use crate::sipc::EmuSipc;
use crate::smem::EmuSmemPool;
use agdsp_config::AgdspPdConfig;
use std::collections::HashMap;
use std::sync::Arc;

/// Base of the emulated AP/AGDSP shared memory window.
pub const SMEM_BASE: u32 = 0x8780_0000;

pub struct EmuBoard {
    pub agcp_ahb: Arc<EmuRegmap>,
    pub pmu: Arc<EmuPmu>,
    /// The optional maps that were created, by syscon name.
    pub cache_maps: HashMap<String, Arc<EmuRegmap>>,
    pub syscon: Arc<EmuSyscon>,
    pub mailbox: Arc<EmuMailbox>,
    pub sipc: Arc<EmuSipc>,
    pub smem: Arc<EmuSmemPool>,
    pub genpd: Arc<EmuGenpd>,
}

impl EmuBoard {
    /// Creates every map named in `config`.
    pub fn new(config: &AgdspPdConfig) -> Self {
        Self::with_cache_maps(config, config.syscon.cache_maps().into_iter().flatten())
    }

    /// Creates the required maps plus only the listed optional maps.
    pub fn with_cache_maps<'a>(
        config: &AgdspPdConfig,
        present: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let agcp_ahb = Arc::new(EmuRegmap::new(&config.syscon.agcp_ahb));
        let pmu = Arc::new(EmuPmu::new(&config.fields));
        let mut syscon = EmuSyscon::new();
        syscon.insert(&config.syscon.agcp_ahb, agcp_ahb.clone());
        syscon.insert(&config.syscon.pmu_apb, pmu.clone());

        let mut cache_maps = HashMap::new();
        for name in present {
            let map = Arc::new(EmuRegmap::new(name));
            syscon.insert(name, map.clone());
            cache_maps.insert(name.to_string(), map);
        }

        EmuBoard {
            mailbox: Arc::new(EmuMailbox::new(pmu.clone())),
            agcp_ahb,
            pmu,
            cache_maps,
            syscon: Arc::new(syscon),
            sipc: Arc::new(EmuSipc::new()),
            smem: Arc::new(EmuSmemPool::new(SMEM_BASE)),
            genpd: Arc::new(EmuGenpd::new()),
        }
    }
}
