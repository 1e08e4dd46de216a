// Licensed under the Apache-2.0 license

mod common;

use agdsp_config::{AgdspPdConfig, TimingConfig};
use agdsp_error::{AgdspError, RegmapError};
use agdsp_pd::AgdspAccess;
use common::{setup, setup_on, test_config};
use emulator_agcp::EmuBoard;
use std::sync::Arc;

#[test]
fn test_power_on_off_cycle() {
    let setup = setup(test_config());
    assert_eq!(setup.ap_enable_cnt(), 0);
    assert!(!setup.access_enabled());
    assert!(!setup.access.can_access());

    setup.access.power_on().unwrap();
    assert_eq!(setup.ap_enable_cnt(), 1);
    assert!(setup.access_enabled());
    assert!(setup.board.pmu.is_awake());
    assert!(setup.access.can_access());
    assert_eq!(setup.board.mailbox.messages().len(), 1);
    assert_eq!(setup.board.mailbox.messages()[0].value, 100);
    assert_eq!(setup.board.mailbox.tx_done_count(), 1);

    setup.access.power_off().unwrap();
    assert_eq!(setup.ap_enable_cnt(), 0);
    assert!(!setup.access_enabled());
    assert!(!setup.access.can_access());
}

#[test]
fn test_second_reference_skips_wake() {
    let setup = setup(test_config());
    setup.access.power_on().unwrap();
    setup.access.power_on().unwrap();
    assert_eq!(setup.ap_enable_cnt(), 2);
    assert_eq!(setup.board.mailbox.messages().len(), 1);

    setup.access.power_off().unwrap();
    assert!(setup.access_enabled());
    setup.access.power_off().unwrap();
    assert!(!setup.access_enabled());
}

#[test]
fn test_extra_power_off_is_noop() {
    let setup = setup(test_config());
    setup.access.power_off().unwrap();
    setup.access.power_off().unwrap();
    assert_eq!(setup.ap_enable_cnt(), 0);

    setup.access.power_on().unwrap();
    setup.access.power_off().unwrap();
    setup.access.power_off().unwrap();
    assert_eq!(setup.ap_enable_cnt(), 0);
}

#[test]
fn test_cache_maps_follow_power_state() {
    let setup = setup(test_config());
    assert_eq!(setup.board.cache_maps.len(), 4);

    setup.access.power_on().unwrap();
    for map in setup.board.cache_maps.values() {
        assert!(!map.is_cache_only(), "{} still cache-only", map.name());
    }
    setup.access.power_off().unwrap();
    for map in setup.board.cache_maps.values() {
        assert!(map.is_cache_only(), "{} still live", map.name());
    }
}

#[test]
fn test_absent_cache_maps_are_skipped() {
    let config = test_config();
    let board = EmuBoard::with_cache_maps(&config, ["clk_rf"]);
    let setup = setup_on(config, board);

    setup.access.power_on().unwrap();
    setup.access.power_off().unwrap();
    let clk = &setup.board.cache_maps["clk_rf"];
    assert!(clk.is_cache_only());
    assert_eq!(clk.mode_switches(), 2);
}

#[test]
fn test_wake_timeout_is_busy_and_retryable() {
    let setup = setup(AgdspPdConfig {
        timing: TimingConfig {
            max_wake_polls: 25,
            ..TimingConfig::immediate()
        },
        ..test_config()
    });
    setup.board.pmu.set_wake_after(None);

    let err = setup.access.power_on().unwrap_err();
    assert!(matches!(err, AgdspError::WakeTimeout { attempts: 25, .. }));
    assert_eq!(err.errno(), -16);
    assert_eq!(setup.board.pmu.pwr_status4_reads(), 25);
    assert_eq!(setup.ap_enable_cnt(), 0);
    // The enable bit stays set and the maps still go live.
    assert!(setup.access_enabled());
    for map in setup.board.cache_maps.values() {
        assert!(!map.is_cache_only());
    }

    setup.board.pmu.sleep();
    setup.board.pmu.set_wake_after(Some(3));
    setup.access.power_on().unwrap();
    assert_eq!(setup.ap_enable_cnt(), 1);
    assert_eq!(setup.board.mailbox.messages().len(), 2);
}

#[test]
fn test_wake_succeeds_on_exact_poll() {
    let setup = setup(test_config());
    setup.board.pmu.set_wake_after(Some(9));
    setup.access.power_on().unwrap();
    assert_eq!(setup.board.pmu.pwr_status4_reads(), 9);
}

#[test]
fn test_status_read_error_aborts_wake() {
    let setup = setup(test_config());
    let reg = setup.config.fields.pmu_pwr_status4.unwrap().reg;
    setup.board.pmu.fail_reads(reg, true);
    assert_eq!(
        setup.access.power_on(),
        Err(AgdspError::Regmap(RegmapError::Read { reg }))
    );
    assert_eq!(setup.ap_enable_cnt(), 0);
    assert!(!setup.access.can_access());
}

#[test]
fn test_enable_not_latched() {
    let setup = setup(test_config());
    let ena = setup.config.fields.ap_access_ena.unwrap();
    setup.board.agcp_ahb.stick_bits(ena.reg, ena.mask);

    let err = setup.access.power_on().unwrap_err();
    assert!(matches!(err, AgdspError::AccessNotLatched { .. }));
    assert_eq!(err.errno(), -22);
    assert!(setup.board.mailbox.messages().is_empty());
    assert_eq!(setup.ap_enable_cnt(), 0);
}

#[test]
fn test_auto_access_leaves_enable_alone() {
    let setup = setup(AgdspPdConfig {
        auto_agcp_access: true,
        ..test_config()
    });
    setup.access.power_on().unwrap();
    setup.access.power_off().unwrap();
    assert_eq!(setup.board.agcp_ahb.hw_writes(), 0);
    assert_eq!(setup.board.mailbox.messages().len(), 1);
}

#[test]
fn test_can_access_checks_every_field() {
    let setup = setup(test_config());
    setup.access.power_on().unwrap();
    assert!(setup.access.can_access());

    let pwr3 = setup.config.fields.pmu_pwr_status3.unwrap();
    setup.board.pmu.fail_reads(pwr3.reg, true);
    assert!(!setup.access.can_access());
    setup.board.pmu.fail_reads(pwr3.reg, false);
    assert!(setup.access.can_access());

    setup.board.pmu.sleep();
    assert!(!setup.access.can_access());
}

#[test]
fn test_not_ready_without_mailbox() {
    common::init_logger();
    let config = test_config();
    let board = EmuBoard::new(&config);
    let access = AgdspAccess::probe(&config, common::resources(&board)).unwrap();
    assert!(access.wait_ready(common::READY_TIMEOUT));

    let err = access.power_on().unwrap_err();
    assert_eq!(err, AgdspError::NotReady);
    assert_eq!(err.errno(), -517);
    assert!(board.mailbox.messages().is_empty());
    assert_eq!(access.access_state().unwrap().ap_enable_cnt, 0);

    access.set_mailbox(board.mailbox.clone());
    access.set_mailbox(Arc::new(emulator_agcp::EmuMailbox::new(board.pmu.clone())));
    access.power_on().unwrap();
    assert_eq!(board.mailbox.messages().len(), 1);
    access.remove();
}

#[test]
fn test_power_framework_forwards_to_controller() {
    let setup = setup(test_config());
    let name = setup.config.name.clone();
    assert!(setup.board.genpd.is_registered(&name));

    setup.board.genpd.power_on(&name).unwrap();
    assert_eq!(setup.ap_enable_cnt(), 1);
    setup.board.genpd.power_off(&name).unwrap();
    assert_eq!(setup.ap_enable_cnt(), 0);
}
