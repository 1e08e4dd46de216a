// Licensed under the Apache-2.0 license

//! AGDSP power-domain access control.
//!
//! The AP and the AGDSP share the AGCP audio subsystem. Before the AP touches
//! AGCP registers it takes a reference through [`AgdspAccess::power_on`],
//! which wakes the AGDSP if nobody held one, and gives it back with
//! [`AgdspAccess::power_off`]. The reference counts live in memory shared with
//! the AGDSP, whose address is handed over by a handshake on the smsg control
//! channel.

pub mod access;
pub mod controller;
pub mod handshake;
pub mod regcache;
pub mod regs;
pub mod state;
pub mod wake;

pub use controller::{AgdspAccess, AgdspPowerDomain, AgdspResources};
pub use regs::{AdcpState, PdState, RegField};
pub use state::AccessState;
