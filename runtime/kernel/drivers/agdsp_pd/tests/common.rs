// Licensed under the Apache-2.0 license
#![allow(dead_code)]

use agdsp_config::{AgdspPdConfig, TimingConfig};
use agdsp_hil::{MailboxChannel, PowerDomainProvider, SmemPool, SmsgChannel, SysconLookup};
use agdsp_pd::{AgdspAccess, AgdspResources};
use emulator_agcp::{EmuBoard, EmuDsp};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::sync::Arc;
use std::time::Duration;

pub const READY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn init_logger() {
    // Initialize log level (only once)
    let _ = SimpleLogger::new().with_level(LevelFilter::Debug).init();
}

/// Default emulated board with every delay removed.
pub fn test_config() -> AgdspPdConfig {
    AgdspPdConfig {
        timing: TimingConfig::immediate(),
        ..Default::default()
    }
}

pub fn resources(board: &EmuBoard) -> AgdspResources {
    AgdspResources {
        syscon: board.syscon.clone() as Arc<dyn SysconLookup>,
        smem: Some(board.smem.clone() as Arc<dyn SmemPool>),
        ipc: board.sipc.clone() as Arc<dyn SmsgChannel>,
        provider: Some(board.genpd.clone() as Arc<dyn PowerDomainProvider>),
    }
}

pub struct TestSetup {
    pub config: AgdspPdConfig,
    pub board: EmuBoard,
    pub access: Arc<AgdspAccess>,
}

/// Probes the controller on `board`, installs the mailbox and waits for the
/// handshake channel.
pub fn setup_on(config: AgdspPdConfig, board: EmuBoard) -> TestSetup {
    init_logger();
    let access = AgdspAccess::probe(&config, resources(&board)).unwrap();
    access.set_mailbox(board.mailbox.clone() as Arc<dyn MailboxChannel>);
    assert!(access.wait_ready(READY_TIMEOUT), "handshake channel never opened");
    TestSetup {
        config,
        board,
        access,
    }
}

pub fn setup(config: AgdspPdConfig) -> TestSetup {
    let board = EmuBoard::new(&config);
    setup_on(config, board)
}

impl TestSetup {
    pub fn dsp(&self) -> EmuDsp {
        let endpoint = self
            .board
            .sipc
            .dsp_endpoint(self.config.ipc.dst, self.config.ipc.channel);
        EmuDsp::new(endpoint, self.board.smem.clone(), self.config.ddr_addr_offset)
    }

    pub fn ap_enable_cnt(&self) -> i32 {
        self.access.access_state().unwrap().ap_enable_cnt
    }

    pub fn access_enabled(&self) -> bool {
        let ena = self.config.fields.ap_access_ena.unwrap();
        self.board.agcp_ahb.value(ena.reg) & ena.mask != 0
    }
}

impl Drop for TestSetup {
    fn drop(&mut self) {
        self.access.remove();
    }
}
