// Licensed under the Apache-2.0 license

//! Error types shared by the AGDSP power-domain driver, its hardware
//! interface layer and the emulated hardware.

use thiserror::Error;

/// Kernel-style status codes reported to the power-domain framework.
pub mod errno {
    pub const EIO: i32 = 5;
    pub const ENOMEM: i32 = 12;
    pub const EBUSY: i32 = 16;
    pub const EINVAL: i32 = 22;
    pub const EPROBE_DEFER: i32 = 517;
}

pub type AgdspResult<T> = Result<T, AgdspError>;

/// Failures reported by a register map.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegmapError {
    #[error("read of register 0x{reg:x} failed")]
    Read { reg: u32 },
    #[error("update of register 0x{reg:x} failed")]
    Update { reg: u32 },
}

/// Failures reported by the IPC (smsg) control channel.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpcError {
    /// The remote side has not brought the channel up yet.
    #[error("channel {channel} to dst {dst} is not ready")]
    ChannelNotReady { dst: u8, channel: u8 },
    #[error("failed to open channel {channel} to dst {dst}")]
    OpenFailed { dst: u8, channel: u8 },
    /// A blocking receive was cancelled by a stop request.
    #[error("receive cancelled")]
    Cancelled,
    #[error("receive timed out")]
    Timeout,
    #[error("peer disconnected")]
    Disconnected,
    #[error("malformed smsg frame")]
    Malformed,
}

/// Failures reported by the mailbox channel.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxError {
    #[error("mailbox tx queue full")]
    QueueFull,
    #[error("mailbox send failed ({0})")]
    SendFailed(i32),
}

/// Errors returned by the AGDSP access controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgdspError {
    /// Controller, shared state or mailbox not initialized yet; retry later.
    #[error("agdsp access not ready")]
    NotReady,
    #[error("register access failed: {0}")]
    Regmap(#[from] RegmapError),
    #[error("access enable 0x{mask:x} did not latch in register 0x{reg:x} (value 0x{value:x})")]
    AccessNotLatched { reg: u32, mask: u32, value: u32 },
    #[error("agdsp wake-up timed out after {attempts} polls ({elapsed_us} us)")]
    WakeTimeout { attempts: u32, elapsed_us: u64 },
    #[error("out of memory: {0}")]
    NoMemory(&'static str),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("ipc error: {0}")]
    Ipc(#[from] IpcError),
    #[error("mailbox error: {0}")]
    Mailbox(#[from] MailboxError),
    #[error("failed to spawn {0}")]
    Spawn(String),
}

impl AgdspError {
    /// Negative status code matching the driver's historical return values.
    pub fn errno(&self) -> i32 {
        match self {
            AgdspError::NotReady => -errno::EPROBE_DEFER,
            AgdspError::Regmap(_) | AgdspError::AccessNotLatched { .. } => -errno::EINVAL,
            AgdspError::WakeTimeout { .. } => -errno::EBUSY,
            AgdspError::NoMemory(_) => -errno::ENOMEM,
            AgdspError::InvalidConfig(_) => -errno::EINVAL,
            AgdspError::Ipc(_) | AgdspError::Mailbox(_) => -errno::EIO,
            AgdspError::Spawn(_) => -errno::ENOMEM,
        }
    }

    /// True when the caller is expected to defer and retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgdspError::NotReady)
    }
}
