// Licensed under the Apache-2.0 license

//! HIL interface for the AP to AGDSP mailbox.

use agdsp_error::MailboxError;

/// Depth of the mailbox transmit ring.
pub const MBOX_TX_QUEUE_LEN: usize = 20;

/// A message handed to the mailbox controller. `slot` names the ring entry the
/// payload was staged in; the controller may still be reading it after
/// `send_message` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxMessage {
    pub slot: usize,
    pub value: u64,
}

pub trait MailboxChannel: Send + Sync {
    /// Queues a message for the remote core. Delivery is fire-and-forget.
    fn send_message(&self, msg: &MailboxMessage) -> Result<(), MailboxError>;

    /// Tells the controller the client is done with the last transmission.
    fn tx_done(&self);
}
