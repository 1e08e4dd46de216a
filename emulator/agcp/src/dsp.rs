// Licensed under the Apache-2.0 license

//! The AGDSP side of the access handshake.

use crate::sipc::DspEndpoint;
use crate::smem::{EmuSharedBlock, EmuSmemPool};
use agdsp_error::IpcError;
use agdsp_hil::{
    SharedBlock, Smsg, SmsgType, CP_ENABLE_CNT_OFFSET, SMSG_CMD_AGDSP_ACCESS_INIT,
    SMSG_DONE_AGDSP_ACCESS_INIT, SMSG_OPEN_MAGIC,
};
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;

/// Emulated AGDSP firmware. Opens the access channel, learns where the
/// counters live and then takes or drops its own reference.
pub struct EmuDsp {
    endpoint: DspEndpoint,
    pool: Arc<EmuSmemPool>,
    ddr_addr_offset: u32,
    block: Option<Arc<EmuSharedBlock>>,
}

impl EmuDsp {
    pub fn new(endpoint: DspEndpoint, pool: Arc<EmuSmemPool>, ddr_addr_offset: u32) -> Self {
        EmuDsp {
            endpoint,
            pool,
            ddr_addr_offset,
            block: None,
        }
    }

    fn expect(&self, kind: SmsgType, flag: u16, timeout: Duration) -> Result<Smsg, IpcError> {
        let msg = self.endpoint.recv(timeout).ok_or(IpcError::Timeout)?;
        debug!("dsp: received {:?}", msg);
        if msg.kind() != Some(kind) || msg.flag != flag {
            return Err(IpcError::Malformed);
        }
        Ok(msg)
    }

    /// Runs open/ack and init/done. Returns the address the AP reported.
    pub fn handshake(&mut self, timeout: Duration) -> Result<u32, IpcError> {
        let channel = self.endpoint.channel();
        self.endpoint.send(Smsg::open(channel));
        self.expect(SmsgType::Open, SMSG_OPEN_MAGIC, timeout)?;

        self.endpoint.send(Smsg::new(
            channel,
            SmsgType::Cmd,
            SMSG_CMD_AGDSP_ACCESS_INIT,
            0,
        ));
        let done = self.expect(SmsgType::Done, SMSG_DONE_AGDSP_ACCESS_INIT, timeout)?;
        let phys = done.value.wrapping_sub(self.ddr_addr_offset);
        self.block = self.pool.block_at(phys);
        info!(
            "dsp: access state at 0x{:x} (shared: {})",
            done.value,
            self.block.is_some()
        );
        Ok(done.value)
    }

    pub fn cp_enable_cnt(&self) -> Option<i32> {
        self.block
            .as_ref()
            .map(|b| b.read_u32(CP_ENABLE_CNT_OFFSET) as i32)
    }

    /// Takes a DSP-side reference. Fails before the handshake completed.
    pub fn acquire(&self) -> bool {
        self.adjust(1)
    }

    /// Drops a DSP-side reference, never below zero.
    pub fn release(&self) -> bool {
        self.adjust(-1)
    }

    fn adjust(&self, delta: i32) -> bool {
        let Some(block) = &self.block else {
            return false;
        };
        let cnt = block.read_u32(CP_ENABLE_CNT_OFFSET) as i32;
        let cnt = cnt.saturating_add(delta).max(0);
        block.write_u32(CP_ENABLE_CNT_OFFSET, cnt as u32);
        true
    }
}
