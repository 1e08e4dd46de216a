/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the emulated AGCP subsystem: register maps,
    PMU, mailbox, smsg transport, shared memory, power-domain framework and
    the AGDSP side of the access handshake.

--*/

mod board;
mod dsp;
mod genpd;
mod mailbox;
mod pmu;
mod regmap;
mod sipc;
mod smem;

pub use board::{EmuBoard, SMEM_BASE};
pub use dsp::EmuDsp;
pub use genpd::EmuGenpd;
pub use mailbox::EmuMailbox;
pub use pmu::EmuPmu;
pub use regmap::{EmuRegmap, EmuSyscon};
pub use sipc::{DspEndpoint, EmuSipc};
pub use smem::{EmuSharedBlock, EmuSmemPool};
