// Licensed under the Apache-2.0 license

//! Reference counters shared between the AP and the AGDSP.

use agdsp_error::{AgdspError, AgdspResult};
use agdsp_hil::{SharedBlock, SmemPool, AP_ENABLE_CNT_OFFSET, CP_ENABLE_CNT_OFFSET};
use core::mem::{offset_of, size_of};
use log::{error, info, warn};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Layout of the counters in shared memory. The AP owns `ap_enable_cnt`; the
/// AGDSP owns `cp_enable_cnt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct AccessState {
    pub ap_enable_cnt: i32,
    pub cp_enable_cnt: i32,
}

const _: () = assert!(offset_of!(AccessState, ap_enable_cnt) == AP_ENABLE_CNT_OFFSET);
const _: () = assert!(offset_of!(AccessState, cp_enable_cnt) == CP_ENABLE_CNT_OFFSET);

/// AP-local stand-in used when the shared memory pool cannot serve the
/// counters. The AGDSP cannot see it.
#[derive(Debug, Default)]
struct LocalBlock {
    words: [AtomicU32; 2],
}

impl SharedBlock for LocalBlock {
    fn phys_addr(&self) -> u32 {
        0
    }

    fn size(&self) -> usize {
        size_of::<AccessState>()
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

struct Reservation {
    pool: Arc<dyn SmemPool>,
    phys: u32,
    size: usize,
}

/// The counters plus the memory backing them.
pub struct SharedAccessState {
    block: Arc<dyn SharedBlock>,
    reservation: Option<Reservation>,
}

impl SharedAccessState {
    /// Reserves and zeroes the counters.
    ///
    /// Falls back to AP-local memory when there is no pool or the pool is
    /// exhausted. A reservation that cannot be mapped is released and reported
    /// as [`AgdspError::NoMemory`].
    pub fn allocate(pool: Option<&Arc<dyn SmemPool>>) -> AgdspResult<Self> {
        let size = size_of::<AccessState>();
        let shared = pool.and_then(|pool| pool.alloc(size).map(|phys| (pool, phys)));
        let state = match shared {
            Some((pool, phys)) => {
                let Some(block) = pool.map(phys, size) else {
                    error!("failed to map shared state at 0x{:x}", phys);
                    pool.free(phys, size);
                    return Err(AgdspError::NoMemory("shared state mapping"));
                };
                info!("shared state at 0x{:x}", phys);
                SharedAccessState {
                    block,
                    reservation: Some(Reservation {
                        pool: Arc::clone(pool),
                        phys,
                        size,
                    }),
                }
            }
            None => {
                warn!("no shared memory for access state, using local memory");
                SharedAccessState {
                    block: Arc::new(LocalBlock::default()),
                    reservation: None,
                }
            }
        };
        state.block.write_u32(AP_ENABLE_CNT_OFFSET, 0);
        state.block.write_u32(CP_ENABLE_CNT_OFFSET, 0);
        Ok(state)
    }

    /// Physical address reported to the AGDSP, zero for local memory.
    pub fn phys_addr(&self) -> u32 {
        self.reservation.as_ref().map_or(0, |r| r.phys)
    }

    pub fn is_shared(&self) -> bool {
        self.reservation.is_some()
    }

    pub fn ap_enable_cnt(&self) -> i32 {
        self.block.read_u32(AP_ENABLE_CNT_OFFSET) as i32
    }

    pub fn set_ap_enable_cnt(&self, cnt: i32) {
        self.block.write_u32(AP_ENABLE_CNT_OFFSET, cnt as u32);
    }

    pub fn cp_enable_cnt(&self) -> i32 {
        self.block.read_u32(CP_ENABLE_CNT_OFFSET) as i32
    }

    pub fn snapshot(&self) -> AccessState {
        AccessState {
            ap_enable_cnt: self.ap_enable_cnt(),
            cp_enable_cnt: self.cp_enable_cnt(),
        }
    }

    /// Returns the reservation to the pool.
    pub fn release(mut self) {
        self.free_reservation();
    }

    fn free_reservation(&mut self) {
        if let Some(r) = self.reservation.take() {
            info!("releasing shared state at 0x{:x}", r.phys);
            r.pool.free(r.phys, r.size);
        }
    }
}

impl Drop for SharedAccessState {
    fn drop(&mut self) {
        self.free_reservation();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emulator_agcp::EmuSmemPool;

    #[test]
    fn test_layout() {
        assert_eq!(size_of::<AccessState>(), 8);
        assert_eq!(AP_ENABLE_CNT_OFFSET, 0);
        assert_eq!(CP_ENABLE_CNT_OFFSET, 4);
        let state = AccessState {
            ap_enable_cnt: 1,
            cp_enable_cnt: -1,
        };
        assert_eq!(
            AccessState::read_from_bytes(state.as_bytes()).unwrap(),
            state
        );
    }

    #[test]
    fn test_allocate_shared_zeroes_counters() {
        let pool = Arc::new(EmuSmemPool::new(0x1000_0000));
        pool.preload(0x1000_0000, &[5, 7]);
        let dyn_pool: Arc<dyn SmemPool> = pool.clone();
        let state = SharedAccessState::allocate(Some(&dyn_pool)).unwrap();
        let block = pool.block_at(0x1000_0000).unwrap();
        assert!(state.is_shared());
        assert_eq!(state.phys_addr(), 0x1000_0000);
        assert_eq!(state.snapshot(), AccessState::default());
        assert_eq!(block.read_u32(0), 0);

        state.set_ap_enable_cnt(3);
        assert_eq!(block.read_u32(AP_ENABLE_CNT_OFFSET), 3);
        block.write_u32(CP_ENABLE_CNT_OFFSET, 2);
        assert_eq!(state.cp_enable_cnt(), 2);

        state.release();
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_exhausted_pool_falls_back_to_local() {
        let pool = Arc::new(EmuSmemPool::new(0x1000_0000));
        pool.set_exhausted(true);
        let dyn_pool: Arc<dyn SmemPool> = pool.clone();
        let state = SharedAccessState::allocate(Some(&dyn_pool)).unwrap();
        assert!(!state.is_shared());
        assert_eq!(state.phys_addr(), 0);
        state.set_ap_enable_cnt(1);
        assert_eq!(state.ap_enable_cnt(), 1);

        let state = SharedAccessState::allocate(None).unwrap();
        assert!(!state.is_shared());
    }

    #[test]
    fn test_map_failure_releases_reservation() {
        let pool = Arc::new(EmuSmemPool::new(0x1000_0000));
        pool.set_map_fails(true);
        let dyn_pool: Arc<dyn SmemPool> = pool.clone();
        let err = SharedAccessState::allocate(Some(&dyn_pool)).err();
        assert_eq!(err, Some(AgdspError::NoMemory("shared state mapping")));
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_drop_releases_reservation() {
        let pool = Arc::new(EmuSmemPool::new(0x2000_0000));
        let dyn_pool: Arc<dyn SmemPool> = pool.clone();
        let state = SharedAccessState::allocate(Some(&dyn_pool)).unwrap();
        assert_eq!(pool.outstanding(), 1);
        drop(state);
        assert_eq!(pool.outstanding(), 0);
    }
}
