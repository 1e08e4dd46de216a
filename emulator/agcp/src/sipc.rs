// Licensed under the Apache-2.0 license

//! In-process smsg transport between the AP and the AGDSP.

use agdsp_error::IpcError;
use agdsp_hil::{Smsg, SmsgChannel};
use core::time::Duration;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What the AP side of a channel can receive.
enum Delivery {
    Msg(Smsg),
    NotReady,
    Cancel,
}

struct Link {
    to_ap: Sender<Delivery>,
    ap_rx: Arc<Mutex<Receiver<Delivery>>>,
    to_dsp: Sender<Smsg>,
    dsp_rx: Option<Receiver<Smsg>>,
    open: bool,
    fail_open: bool,
}

impl Link {
    fn new() -> Self {
        let (to_ap, ap_rx) = mpsc::channel();
        let (to_dsp, dsp_rx) = mpsc::channel();
        Link {
            to_ap,
            ap_rx: Arc::new(Mutex::new(ap_rx)),
            to_dsp,
            dsp_rx: Some(dsp_rx),
            open: false,
            fail_open: false,
        }
    }
}

/// The AP-side smsg transport. Channels are created on first use.
#[derive(Default)]
pub struct EmuSipc {
    links: Mutex<HashMap<(u8, u8), Link>>,
}

impl EmuSipc {
    pub fn new() -> Self {
        Self::default()
    }

    fn links(&self) -> MutexGuard<'_, HashMap<(u8, u8), Link>> {
        self.links.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_link<R>(&self, dst: u8, channel: u8, f: impl FnOnce(&mut Link) -> R) -> R {
        let mut links = self.links();
        f(links.entry((dst, channel)).or_insert_with(Link::new))
    }

    /// Returns the AGDSP end of a channel. A second call replaces the first
    /// endpoint, which stops receiving.
    pub fn dsp_endpoint(&self, dst: u8, channel: u8) -> DspEndpoint {
        self.with_link(dst, channel, |link| {
            let from_ap = match link.dsp_rx.take() {
                Some(rx) => rx,
                None => {
                    let (tx, rx) = mpsc::channel();
                    link.to_dsp = tx;
                    rx
                }
            };
            DspEndpoint {
                channel,
                to_ap: link.to_ap.clone(),
                from_ap,
            }
        })
    }

    /// Makes the next `count` receives on the channel report it not ready.
    pub fn inject_not_ready(&self, dst: u8, channel: u8, count: u32) {
        self.with_link(dst, channel, |link| {
            for _ in 0..count {
                let _ = link.to_ap.send(Delivery::NotReady);
            }
        });
    }

    pub fn fail_open(&self, dst: u8, channel: u8) {
        self.with_link(dst, channel, |link| link.fail_open = true);
    }

    pub fn is_open(&self, dst: u8, channel: u8) -> bool {
        self.links().get(&(dst, channel)).is_some_and(|l| l.open)
    }
}

impl SmsgChannel for EmuSipc {
    fn open(&self, dst: u8, channel: u8) -> Result<(), IpcError> {
        self.with_link(dst, channel, |link| {
            if link.fail_open {
                return Err(IpcError::OpenFailed { dst, channel });
            }
            link.open = true;
            Ok(())
        })
    }

    fn recv(&self, dst: u8, channel: u8, timeout: Option<Duration>) -> Result<Smsg, IpcError> {
        // Block on the receiver without holding the link table.
        let rx = self.with_link(dst, channel, |link| Arc::clone(&link.ap_rx));
        let rx = rx.lock().unwrap_or_else(PoisonError::into_inner);
        let delivery = match timeout {
            Some(timeout) => rx.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => IpcError::Timeout,
                RecvTimeoutError::Disconnected => IpcError::Disconnected,
            })?,
            None => rx.recv().map_err(|_| IpcError::Disconnected)?,
        };
        match delivery {
            Delivery::Msg(msg) => Ok(msg),
            Delivery::NotReady => Err(IpcError::ChannelNotReady { dst, channel }),
            Delivery::Cancel => Err(IpcError::Cancelled),
        }
    }

    fn send(&self, dst: u8, msg: &Smsg) -> Result<(), IpcError> {
        self.with_link(dst, msg.channel, |link| {
            link.to_dsp.send(*msg).map_err(|_| IpcError::Disconnected)
        })
    }

    fn close(&self, dst: u8, channel: u8) {
        self.with_link(dst, channel, |link| link.open = false);
    }

    fn cancel_recv(&self, dst: u8, channel: u8) {
        self.with_link(dst, channel, |link| {
            let _ = link.to_ap.send(Delivery::Cancel);
        });
    }
}

/// The AGDSP end of one smsg channel.
pub struct DspEndpoint {
    channel: u8,
    to_ap: Sender<Delivery>,
    from_ap: Receiver<Smsg>,
}

impl DspEndpoint {
    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn send(&self, msg: Smsg) {
        let _ = self.to_ap.send(Delivery::Msg(msg));
    }

    /// Next message from the AP, `None` on timeout.
    pub fn recv(&self, timeout: Duration) -> Option<Smsg> {
        self.from_ap.recv_timeout(timeout).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agdsp_hil::SmsgType;
    use std::thread;

    #[test]
    fn test_round_trip() {
        let sipc = EmuSipc::new();
        let dsp = sipc.dsp_endpoint(3, 4);
        sipc.open(3, 4).unwrap();
        assert!(sipc.is_open(3, 4));

        dsp.send(Smsg::open(4));
        assert_eq!(sipc.recv(3, 4, None).unwrap().kind(), Some(SmsgType::Open));
        sipc.send(3, &Smsg::open_ack(4)).unwrap();
        assert_eq!(
            dsp.recv(Duration::from_secs(1)),
            Some(Smsg::open_ack(4))
        );
        assert_eq!(
            sipc.recv(3, 4, Some(Duration::from_millis(10))),
            Err(IpcError::Timeout)
        );
    }

    #[test]
    fn test_cancel_wakes_blocked_receiver() {
        let sipc = Arc::new(EmuSipc::new());
        let rx_sipc = Arc::clone(&sipc);
        let handle = thread::spawn(move || rx_sipc.recv(1, 2, None));
        sipc.cancel_recv(1, 2);
        assert_eq!(handle.join().unwrap(), Err(IpcError::Cancelled));
    }

    #[test]
    fn test_not_ready_and_open_failure() {
        let sipc = EmuSipc::new();
        sipc.inject_not_ready(1, 2, 1);
        assert_eq!(
            sipc.recv(1, 2, None),
            Err(IpcError::ChannelNotReady { dst: 1, channel: 2 })
        );
        sipc.fail_open(1, 2);
        assert_eq!(
            sipc.open(1, 2),
            Err(IpcError::OpenFailed { dst: 1, channel: 2 })
        );
        assert!(!sipc.is_open(1, 2));
    }
}
