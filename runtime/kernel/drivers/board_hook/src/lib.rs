// Licensed under the Apache-2.0 license

//! Board speaker/receiver amplifier hooks.
//!
//! A board describes, per audio function, which activation behavior drives
//! its external amplifier. Behaviors are a closed set ([`HookKind`]) picked
//! from [`HOOK_TABLE`] by index or name, then dispatched by [`BoardHooks`].

mod hooks;
mod pa_info;
mod table;

pub use hooks::{Amplifier, BoardHooks, GpioLine};
pub use pa_info::{BoardHookConfig, HookBinding, PA_INFO_CELLS};
pub use table::{BoardFunction, HookEntry, HookKind, HOOK_TABLE};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    #[error("pa info is empty")]
    EmptyPaInfo,
    #[error("pa info length {0} is not a multiple of 4")]
    PaInfoLength(usize),
    #[error("board function {0} is invalid")]
    InvalidFunction(u32),
    #[error("hook selection {0} is invalid")]
    InvalidHook(u32),
    #[error("share gpio {share} is bigger than speaker count {count}")]
    ShareGpio { share: u32, count: usize },
    #[error("no gpio listed for speaker entry {0}")]
    MissingGpio(usize),
    #[error("no hook bound to {0:?}")]
    Unbound(BoardFunction),
    #[error("{0:?} needs an amplifier and none is attached")]
    NoAmplifier(BoardFunction),
}
