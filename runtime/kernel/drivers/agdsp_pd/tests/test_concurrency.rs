// Licensed under the Apache-2.0 license

mod common;

use agdsp_config::{AgdspPdConfig, TimingConfig};
use common::{setup, test_config};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_overlapping_power_on_wakes_once() {
    let setup = setup(AgdspPdConfig {
        timing: TimingConfig {
            wake_poll_interval_us: 500,
            ..TimingConfig::immediate()
        },
        ..test_config()
    });
    setup.board.pmu.set_wake_after(Some(40));

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let access = Arc::clone(&setup.access);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                access.power_on()
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(setup.ap_enable_cnt(), 2);
    assert_eq!(setup.board.mailbox.messages().len(), 1);
    assert_eq!(setup.board.pmu.pwr_status4_reads(), 40);
}

#[test]
fn test_paired_streams_end_balanced() {
    const STREAMS: usize = 8;
    const CYCLES: usize = 50;

    let setup = setup(test_config());
    let barrier = Arc::new(Barrier::new(STREAMS));
    let handles: Vec<_> = (0..STREAMS)
        .map(|_| {
            let access = Arc::clone(&setup.access);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..CYCLES {
                    access.power_on().unwrap();
                    assert!(access.access_state().unwrap().ap_enable_cnt >= 1);
                    access.power_off().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(setup.ap_enable_cnt(), 0);
    assert!(!setup.access_enabled());
    let mails = setup.board.mailbox.messages().len();
    assert!((1..=STREAMS * CYCLES).contains(&mails));
}

#[test]
fn test_unpaired_power_off_never_goes_negative() {
    let setup = setup(test_config());
    setup.access.power_on().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let access = Arc::clone(&setup.access);
            thread::spawn(move || {
                for _ in 0..10 {
                    access.power_off().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(setup.ap_enable_cnt(), 0);
    assert!(!setup.access_enabled());
}
