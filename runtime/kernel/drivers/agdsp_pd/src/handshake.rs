// Licensed under the Apache-2.0 license

//! Worker answering the AGDSP init handshake on the smsg control channel.
//!
//! The AGDSP opens the channel, then asks where the shared counters live with
//! an init command. The worker answers with the physical address of the
//! counters plus the board DDR offset.

use agdsp_error::{AgdspError, AgdspResult, IpcError};
use agdsp_hil::{
    Smsg, SmsgChannel, SmsgType, SMSG_CMD_AGDSP_ACCESS_INIT, SMSG_DONE_AGDSP_ACCESS_INIT,
};
use log::{debug, error, info, warn};
use smlang::statemachine;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

statemachine! {
    derive_states: [Debug, Clone, Copy],
    derive_events: [Clone, Debug],
    transitions: {
        *ChannelClosed + ChannelOpened / on_channel_opened = Listening,
        ChannelClosed + OpenFailed(IpcError) / on_open_failed = Closed,

        Listening + Received(Smsg) / on_message = Listening,
        Listening + NotReady / on_not_ready = Listening,

        _ + Stop / on_stop = Closed
    }
}

/// Where and how the worker talks to the AGDSP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeParams {
    pub dst: u8,
    pub channel: u8,
    /// Value sent back in the init reply.
    pub reply_value: u32,
    /// Back-off while the channel is not up.
    pub retry: Duration,
}

pub struct Context {
    ipc: Arc<dyn SmsgChannel>,
    params: HandshakeParams,
    ready: Arc<AtomicBool>,
    inits_served: Arc<AtomicU32>,
}

impl Context {
    fn reply(&self, msg: &Smsg) {
        if let Err(e) = self.ipc.send(self.params.dst, msg) {
            error!(
                "reply {:?} on {}-{} failed: {}",
                msg.kind(),
                self.params.dst,
                self.params.channel,
                e
            );
        }
    }
}

impl StateMachineContext for Context {
    fn on_channel_opened(&mut self) -> Result<(), ()> {
        info!(
            "handshake channel {}-{} open",
            self.params.dst, self.params.channel
        );
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn on_open_failed(&mut self, err: IpcError) -> Result<(), ()> {
        error!(
            "failed to open channel {}, dst={}: {}",
            self.params.channel, self.params.dst, err
        );
        Ok(())
    }

    fn on_message(&mut self, msg: Smsg) -> Result<(), ()> {
        debug!(
            "dst={}, channel={}, type={}, flag=0x{:04x}, value=0x{:08x}",
            self.params.dst, msg.channel, msg.msg_type, msg.flag, msg.value
        );
        match msg.kind() {
            Some(SmsgType::Open) => self.reply(&Smsg::open_ack(self.params.channel)),
            Some(SmsgType::Cmd) if msg.flag == SMSG_CMD_AGDSP_ACCESS_INIT => {
                self.reply(&Smsg::new(
                    self.params.channel,
                    SmsgType::Done,
                    SMSG_DONE_AGDSP_ACCESS_INIT,
                    self.params.reply_value,
                ));
                self.inits_served.fetch_add(1, Ordering::SeqCst);
            }
            _ => info!(
                "non-handled agdsp access msg: {}-{}, {}, {}, {}",
                self.params.dst, self.params.channel, msg.msg_type, msg.flag, msg.value
            ),
        }
        Ok(())
    }

    fn on_not_ready(&mut self) -> Result<(), ()> {
        thread::sleep(self.params.retry);
        Ok(())
    }

    fn on_stop(&mut self) -> Result<(), ()> {
        self.ready.store(false, Ordering::SeqCst);
        self.ipc.close(self.params.dst, self.params.channel);
        Ok(())
    }
}

/// Handle to the running worker. Dropping it stops and joins the thread.
pub struct HandshakeWorker {
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    state: Arc<Mutex<States>>,
    inits_served: Arc<AtomicU32>,
    ipc: Arc<dyn SmsgChannel>,
    params: HandshakeParams,
}

impl HandshakeWorker {
    /// Starts the worker. `ready` is raised once the channel is open.
    pub fn spawn(
        ipc: Arc<dyn SmsgChannel>,
        params: HandshakeParams,
        ready: Arc<AtomicBool>,
    ) -> AgdspResult<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));
        let state = Arc::new(Mutex::new(States::ChannelClosed));
        let inits_served = Arc::new(AtomicU32::new(0));

        let sm = StateMachine::new(Context {
            ipc: Arc::clone(&ipc),
            params,
            ready,
            inits_served: Arc::clone(&inits_served),
        });
        let worker_stop = Arc::clone(&stop);
        let worker_running = Arc::clone(&running);
        let worker_state = Arc::clone(&state);
        let handle = thread::Builder::new()
            .name("agdsp_access".into())
            .spawn(move || {
                Self::run(sm, &worker_stop, &worker_state);
                worker_running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| AgdspError::Spawn(format!("agdsp_access thread: {e}")))?;

        Ok(HandshakeWorker {
            handle: Some(handle),
            stop,
            running,
            state,
            inits_served,
            ipc,
            params,
        })
    }

    fn run(mut sm: StateMachine<Context>, stop: &AtomicBool, state: &Mutex<States>) {
        info!("agdsp access thread entry");
        let (dst, channel) = (sm.context().params.dst, sm.context().params.channel);
        let ipc = Arc::clone(&sm.context().ipc);

        let opened = match ipc.open(dst, channel) {
            Ok(()) => Self::dispatch(&mut sm, state, Events::ChannelOpened),
            Err(e) => {
                Self::dispatch(&mut sm, state, Events::OpenFailed(e));
                false
            }
        };
        if !opened {
            return;
        }

        while !stop.load(Ordering::SeqCst) {
            let event = match ipc.recv(dst, channel, None) {
                Ok(msg) => Events::Received(msg),
                Err(IpcError::ChannelNotReady { .. }) => Events::NotReady,
                Err(IpcError::Cancelled) => continue,
                Err(IpcError::Disconnected) => {
                    warn!("handshake channel {}-{} disconnected", dst, channel);
                    break;
                }
                Err(e) => {
                    warn!("handshake receive failed: {}", e);
                    Events::NotReady
                }
            };
            Self::dispatch(&mut sm, state, event);
        }

        Self::dispatch(&mut sm, state, Events::Stop);
        info!("agdsp access thread return");
    }

    fn dispatch(sm: &mut StateMachine<Context>, state: &Mutex<States>, event: Events) -> bool {
        let ok = match sm.process_event(event) {
            Ok(_) => true,
            Err(e) => {
                error!("handshake event rejected: {:?}", e);
                false
            }
        };
        *state.lock().unwrap_or_else(PoisonError::into_inner) = *sm.state();
        ok
    }

    /// True until the worker thread has exited.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> States {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of init commands answered so far.
    pub fn inits_served(&self) -> u32 {
        self.inits_served.load(Ordering::SeqCst)
    }

    /// Stops the worker and waits for it to exit. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            // An exited worker has no receive to cancel.
            if self.is_running() {
                self.ipc.cancel_recv(self.params.dst, self.params.channel);
            }
            if handle.join().is_err() {
                error!("agdsp access thread panicked");
            }
        }
    }
}

impl Drop for HandshakeWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
