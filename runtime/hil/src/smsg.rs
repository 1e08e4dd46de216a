// Licensed under the Apache-2.0 license

//! HIL interface for the smsg control channel and its wire frame.

use agdsp_error::IpcError;
use core::time::Duration;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// `flag` of an `Open` reply acknowledging the peer's open.
pub const SMSG_OPEN_MAGIC: u16 = 0xBEEE;
/// `flag` of a `Close` message.
pub const SMSG_CLOSE_MAGIC: u16 = 0xEDDD;

/// `flag` of the `Cmd` the AGDSP sends to ask for the access counters.
pub const SMSG_CMD_AGDSP_ACCESS_INIT: u16 = 0x0001;
/// `flag` of the `Done` reply carrying their address.
pub const SMSG_DONE_AGDSP_ACCESS_INIT: u16 = 0x0002;

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum SmsgType {
    None = 0,
    Open = 1,
    Close = 2,
    Data = 3,
    Event = 4,
    Cmd = 5,
    Done = 6,
    SmemAlloc = 7,
    SmemFree = 8,
    SmemDone = 9,
    FuncCall = 10,
    FuncReturn = 11,
    HighOffset = 12,
}

/// The 8-byte smsg frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct Smsg {
    pub channel: u8,
    pub msg_type: u8,
    pub flag: u16,
    pub value: u32,
}

impl Smsg {
    pub const SIZE: usize = core::mem::size_of::<Smsg>();

    pub fn new(channel: u8, msg_type: SmsgType, flag: u16, value: u32) -> Self {
        Smsg {
            channel,
            msg_type: msg_type.into(),
            flag,
            value,
        }
    }

    pub fn open(channel: u8) -> Self {
        Smsg::new(channel, SmsgType::Open, 0, 0)
    }

    pub fn open_ack(channel: u8) -> Self {
        Smsg::new(channel, SmsgType::Open, SMSG_OPEN_MAGIC, 0)
    }

    pub fn close(channel: u8) -> Self {
        Smsg::new(channel, SmsgType::Close, SMSG_CLOSE_MAGIC, 0)
    }

    /// Decoded message type, `None` for types this side does not know.
    pub fn kind(&self) -> Option<SmsgType> {
        SmsgType::try_from(self.msg_type).ok()
    }

    pub fn to_bytes(&self) -> [u8; Smsg::SIZE] {
        let mut buf = [0u8; Smsg::SIZE];
        buf.copy_from_slice(self.as_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, IpcError> {
        Smsg::read_from_prefix(buf)
            .map(|(msg, _)| msg)
            .map_err(|_| IpcError::Malformed)
    }
}

/// A bidirectional smsg endpoint multiplexing channels per destination core.
pub trait SmsgChannel: Send + Sync {
    /// Opens `channel` towards `dst`. May block until the peer is reachable.
    fn open(&self, dst: u8, channel: u8) -> Result<(), IpcError>;

    /// Receives the next message on `channel`.
    ///
    /// `None` waits indefinitely. Returns [`IpcError::ChannelNotReady`] while
    /// the channel is not up and [`IpcError::Cancelled`] after `cancel_recv`.
    fn recv(&self, dst: u8, channel: u8, timeout: Option<Duration>) -> Result<Smsg, IpcError>;

    /// Sends `msg` on the channel named by `msg.channel`.
    fn send(&self, dst: u8, msg: &Smsg) -> Result<(), IpcError>;

    fn close(&self, dst: u8, channel: u8);

    /// Wakes a receiver blocked on `channel`.
    fn cancel_recv(&self, dst: u8, channel: u8);
}
