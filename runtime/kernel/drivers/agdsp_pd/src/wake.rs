// Licensed under the Apache-2.0 license

use crate::regs::{PdState, RegField};
use agdsp_config::TimingConfig;
use agdsp_error::{AgdspError, AgdspResult, RegmapError};
use agdsp_hil::{MailboxChannel, MailboxMessage, RegisterMap, MBOX_TX_QUEUE_LEN};
use log::{debug, error};
use poll_common::{PollError, PollPolicy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Payload of the wake mail. The AGDSP treats it as an unknown command; only
/// the interrupt matters.
pub const WAKE_MESSAGE: u64 = 100;

/// Wakes the AGDSP and waits for its power sequencer to report the wake state.
pub struct WakeSequencer {
    pmu_apb: Arc<dyn RegisterMap>,
    pwr_status4: RegField,
    policy: PollPolicy,
    settle: Duration,
    next_slot: AtomicUsize,
}

impl WakeSequencer {
    pub fn new(pmu_apb: Arc<dyn RegisterMap>, pwr_status4: RegField, timing: &TimingConfig) -> Self {
        WakeSequencer {
            pmu_apb,
            pwr_status4,
            policy: PollPolicy::new(
                timing.max_wake_polls,
                timing.wake_poll_interval(),
                timing.wake_timeout(),
            ),
            settle: timing.wake_settle(),
            next_slot: AtomicUsize::new(0),
        }
    }

    fn take_slot(&self) -> usize {
        self.next_slot
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |i| {
                Some((i + 1) % MBOX_TX_QUEUE_LEN)
            })
            .unwrap_or_else(|i| i)
    }

    /// Sends the wake mail and polls the AGDSP power state.
    ///
    /// Returns the number of status reads it took. A failed mail send is only
    /// logged; the poll decides the outcome.
    pub fn wake(&self, mailbox: &dyn MailboxChannel) -> AgdspResult<u32> {
        let msg = MailboxMessage {
            slot: self.take_slot(),
            value: WAKE_MESSAGE,
        };
        if let Err(e) = mailbox.send_message(&msg) {
            error!("wake mail in slot {} failed: {}", msg.slot, e);
        }
        mailbox.tx_done();
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }

        let wakeup = u32::from(PdState::Wakeup);
        let result = self.policy.run(|| -> Result<bool, RegmapError> {
            let (value, state) = self.pwr_status4.read(self.pmu_apb.as_ref())?;
            debug!(
                "pwr_status4 0x{:x} = 0x{:x} (mask 0x{:x}, state {})",
                self.pwr_status4.reg, value, self.pwr_status4.mask, state
            );
            Ok(state == wakeup)
        });
        match result {
            Ok(stats) => Ok(stats.attempts),
            Err(PollError::Exhausted(stats)) => {
                error!(
                    "agdsp power up timed out after {} polls ({:?})",
                    stats.attempts, stats.elapsed
                );
                Err(AgdspError::WakeTimeout {
                    attempts: stats.attempts,
                    elapsed_us: u64::try_from(stats.elapsed.as_micros()).unwrap_or(u64::MAX),
                })
            }
            Err(PollError::Aborted(e)) => {
                error!("agdsp power state read failed: {}", e);
                Err(AgdspError::Regmap(e))
            }
        }
    }
}
