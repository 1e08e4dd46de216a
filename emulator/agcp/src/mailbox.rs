// Licensed under the Apache-2.0 license

use crate::pmu::EmuPmu;
use agdsp_error::MailboxError;
use agdsp_hil::{MailboxChannel, MailboxMessage};
use log::debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct MailboxLog {
    messages: Vec<MailboxMessage>,
    tx_done: u32,
    fail_next: u32,
    fail_with: MailboxError,
}

/// AP to AGDSP mailbox. Every delivered message raises the AGDSP wake
/// interrupt on the PMU.
pub struct EmuMailbox {
    pmu: Arc<EmuPmu>,
    log: Mutex<MailboxLog>,
}

impl EmuMailbox {
    pub fn new(pmu: Arc<EmuPmu>) -> Self {
        EmuMailbox {
            pmu,
            log: Mutex::new(MailboxLog {
                messages: Vec::new(),
                tx_done: 0,
                fail_next: 0,
                fail_with: MailboxError::QueueFull,
            }),
        }
    }

    fn log(&self) -> MutexGuard<'_, MailboxLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delivered messages, oldest first.
    pub fn messages(&self) -> Vec<MailboxMessage> {
        self.log().messages.clone()
    }

    pub fn tx_done_count(&self) -> u32 {
        self.log().tx_done
    }

    /// Rejects the next `count` sends with `err`.
    pub fn fail_next_sends(&self, count: u32, err: MailboxError) {
        let mut log = self.log();
        log.fail_next = count;
        log.fail_with = err;
    }
}

impl MailboxChannel for EmuMailbox {
    fn send_message(&self, msg: &MailboxMessage) -> Result<(), MailboxError> {
        {
            let mut log = self.log();
            if log.fail_next > 0 {
                log.fail_next -= 1;
                return Err(log.fail_with);
            }
            log.messages.push(*msg);
        }
        debug!("mailbox: slot {} value {}", msg.slot, msg.value);
        self.pmu.request_wake();
        Ok(())
    }

    fn tx_done(&self) {
        self.log().tx_done += 1;
    }
}
