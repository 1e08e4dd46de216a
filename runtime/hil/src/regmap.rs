// Licensed under the Apache-2.0 license

//! HIL interface for syscon register maps.

use agdsp_error::RegmapError;
use std::sync::Arc;

/// A register map backed by a register cache.
///
/// In cache-only mode reads are served from the cache and writes only touch
/// the cache, so the map stays usable while the block behind it is powered
/// down.
pub trait RegisterMap: Send + Sync {
    /// Reads the 32-bit register at byte offset `reg`.
    fn read(&self, reg: u32) -> Result<u32, RegmapError>;

    /// Replaces the bits selected by `mask` in `reg` with the same bits of `val`.
    fn update_bits(&self, reg: u32, mask: u32, val: u32) -> Result<(), RegmapError>;

    /// Switches the map between cache-only and live hardware access.
    fn set_cache_only(&self, enable: bool);
}

/// Resolves register maps by syscon name.
pub trait SysconLookup: Send + Sync {
    fn regmap(&self, name: &str) -> Option<Arc<dyn RegisterMap>>;
}
