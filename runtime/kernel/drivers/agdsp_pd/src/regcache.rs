// Licensed under the Apache-2.0 license

//! Cache mode of the AGCP register maps that follow the domain power state.

use agdsp_config::SysconConfig;
use agdsp_hil::{RegisterMap, SysconLookup};
use log::{debug, warn};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub struct RegCacheSwitch {
    maps: Vec<(String, Arc<dyn RegisterMap>)>,
    settle: Duration,
}

impl RegCacheSwitch {
    /// Looks up the optional AGCP maps. Missing maps are skipped from then on.
    pub fn resolve(syscon: &SysconConfig, lookup: &dyn SysconLookup, settle: Duration) -> Self {
        let mut maps = Vec::new();
        for name in syscon.cache_maps().into_iter().flatten() {
            match lookup.regmap(name) {
                Some(map) => maps.push((name.to_string(), map)),
                None => warn!("syscon {} not found, its cache mode is left alone", name),
            }
        }
        RegCacheSwitch { maps, settle }
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Reads and writes go to hardware again. Used once the AGCP is powered.
    pub fn set_live(&self) {
        self.switch(false);
    }

    /// Reads and writes stay in the cache. Used before the AGCP may power down.
    pub fn set_cache_only(&self) {
        self.switch(true);
    }

    fn switch(&self, cache_only: bool) {
        for (name, map) in &self.maps {
            debug!("{}: cache_only={}", name, cache_only);
            map.set_cache_only(cache_only);
        }
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }
    }
}
