// Licensed under the Apache-2.0 license

//! Hardware interface layer consumed by the AGDSP power-domain driver.
//!
//! Every collaborator outside the access controller is reached through one of
//! these traits: register maps, the mailbox, the smsg control channel, the
//! shared memory pool and the power-domain framework.

pub mod mailbox;
pub mod power_domain;
pub mod regmap;
pub mod smem;
pub mod smsg;

pub use mailbox::{MailboxChannel, MailboxMessage, MBOX_TX_QUEUE_LEN};
pub use power_domain::{GenericPowerDomain, PowerDomainProvider};
pub use regmap::{RegisterMap, SysconLookup};
pub use smem::{SharedBlock, SmemPool, AP_ENABLE_CNT_OFFSET, CP_ENABLE_CNT_OFFSET};
pub use smsg::{
    Smsg, SmsgChannel, SmsgType, SMSG_CLOSE_MAGIC, SMSG_CMD_AGDSP_ACCESS_INIT,
    SMSG_DONE_AGDSP_ACCESS_INIT, SMSG_OPEN_MAGIC,
};
