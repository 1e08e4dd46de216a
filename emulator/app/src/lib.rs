/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Drives the AGDSP access controller on an emulated AGCP board: probe,
    DSP handshake, concurrent playback streams and teardown.

--*/

use agdsp_config::{AgdspPdConfig, TimingConfig};
use agdsp_hil::{MailboxChannel, PowerDomainProvider, SmemPool, SmsgChannel, SysconLookup};
use agdsp_pd::{AgdspAccess, AgdspResources};
use anyhow::{anyhow, bail, Context};
use board_hook::{Amplifier, BoardFunction, BoardHookConfig, BoardHooks, GpioLine};
use clap::Parser;
use clap_num::maybe_hex;
use emulator_agcp::{EmuBoard, EmuDsp};
use log::{debug, info, LevelFilter};
use poll_common::poll_until;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "AGDSP power-domain access emulator")]
pub struct EmulatorArgs {
    /// Board description (TOML). The built-in board is used when omitted.
    #[arg(short, long)]
    pub board: Option<PathBuf>,

    /// Speaker amplifier wiring (TOML).
    #[arg(long)]
    pub hooks: Option<PathBuf>,

    /// Concurrent playback streams.
    #[arg(short, long, default_value_t = 4)]
    pub streams: u32,

    /// Power on/off cycles per stream.
    #[arg(short, long, default_value_t = 100)]
    pub cycles: u32,

    /// Override the DDR offset added to the reported shared memory address.
    #[arg(long, value_parser = maybe_hex::<u32>)]
    pub ddr_addr_offset: Option<u32>,

    /// Status reads the PMU needs before it reports the DSP awake.
    #[arg(long, default_value_t = 1)]
    pub wake_after: u32,

    /// DSP keeps its own access reference for the whole run.
    #[arg(long, default_value_t = false)]
    pub dsp_holds: bool,

    /// Remove every delay from the board timing.
    #[arg(long, default_value_t = false)]
    pub immediate: bool,

    #[arg(long, default_value_t = LevelFilter::Info)]
    pub log_level: LevelFilter,
}

/// Outcome of one emulator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Address the DSP received in the init handshake.
    pub reported_addr: u32,
    pub cycles: u32,
    /// Wake messages sent through the mailbox.
    pub wakes: usize,
    pub ap_enable_cnt: i32,
    pub cp_enable_cnt: i32,
}

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

struct LogGpio;

impl GpioLine for LogGpio {
    fn set_value(&self, gpio: u32, high: bool) {
        debug!("gpio {} -> {}", gpio, u8::from(high));
    }
}

struct LogAmplifier;

impl Amplifier for LogAmplifier {
    fn speaker_on(&self, mode: u32) {
        debug!("i2c amplifier on, mode {}", mode);
    }

    fn speaker_off(&self) {
        debug!("i2c amplifier off");
    }
}

pub fn load_config(args: &EmulatorArgs) -> anyhow::Result<AgdspPdConfig> {
    let mut config = match &args.board {
        Some(path) => AgdspPdConfig::from_file(path)
            .with_context(|| format!("failed to load board {}", path.display()))?,
        None => AgdspPdConfig::default(),
    };
    if let Some(offset) = args.ddr_addr_offset {
        config.ddr_addr_offset = offset;
    }
    if args.immediate {
        config.timing = TimingConfig::immediate();
    }
    Ok(config)
}

fn load_hooks(args: &EmulatorArgs) -> anyhow::Result<Option<BoardHooks>> {
    let Some(path) = &args.hooks else {
        return Ok(None);
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: BoardHookConfig =
        toml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))?;
    let hooks = BoardHooks::new(
        &config,
        Arc::new(LogGpio),
        Some(Arc::new(LogAmplifier)),
    )?;
    Ok(Some(hooks))
}

fn resources(board: &EmuBoard) -> AgdspResources {
    AgdspResources {
        syscon: board.syscon.clone() as Arc<dyn SysconLookup>,
        smem: Some(board.smem.clone() as Arc<dyn SmemPool>),
        ipc: board.sipc.clone() as Arc<dyn SmsgChannel>,
        provider: Some(board.genpd.clone() as Arc<dyn PowerDomainProvider>),
    }
}

/// Runs one playback stream: every cycle powers the domain through the
/// framework, checks the DSP is reachable and powers it off again.
fn stream(board: &EmuBoard, access: &AgdspAccess, id: u32, cycles: u32) -> anyhow::Result<u32> {
    let mut reachable = 0;
    for cycle in 0..cycles {
        board
            .genpd
            .power_on(access.name())
            .with_context(|| format!("stream {id}: power on failed in cycle {cycle}"))?;
        if access.can_access() {
            reachable += 1;
        }
        board
            .genpd
            .power_off(access.name())
            .with_context(|| format!("stream {id}: power off failed in cycle {cycle}"))?;
    }
    debug!("stream {}: {} of {} cycles reachable", id, reachable, cycles);
    Ok(reachable)
}

pub fn run(args: &EmulatorArgs) -> anyhow::Result<RunReport> {
    let config = load_config(args)?;
    let hooks = load_hooks(args)?;

    let board = EmuBoard::new(&config);
    board.pmu.set_wake_after(Some(args.wake_after));

    let access = AgdspAccess::probe(&config, resources(&board)).context("probe failed")?;
    access.set_mailbox(board.mailbox.clone() as Arc<dyn MailboxChannel>);

    let report = drive(args, &config, &board, &access, hooks.as_ref());
    access.remove();
    report
}

fn drive(
    args: &EmulatorArgs,
    config: &AgdspPdConfig,
    board: &EmuBoard,
    access: &Arc<AgdspAccess>,
    hooks: Option<&BoardHooks>,
) -> anyhow::Result<RunReport> {
    poll_until(HANDSHAKE_TIMEOUT, Duration::from_millis(1), || Ok(access.is_ready()))
        .context("handshake channel never opened")?;

    let endpoint = board.sipc.dsp_endpoint(config.ipc.dst, config.ipc.channel);
    let mut dsp = EmuDsp::new(endpoint, board.smem.clone(), config.ddr_addr_offset);
    let reported_addr = dsp
        .handshake(HANDSHAKE_TIMEOUT)
        .context("dsp init handshake failed")?;
    info!("dsp handshake complete, access state at 0x{:x}", reported_addr);
    if args.dsp_holds && !dsp.acquire() {
        bail!("dsp could not take a reference");
    }

    if let Some(hooks) = hooks {
        if hooks.binding(BoardFunction::Speaker).is_some() {
            hooks.apply(BoardFunction::Speaker, true)?;
        }
    }

    let reachable = thread::scope(|s| -> anyhow::Result<u32> {
        let handles: Vec<_> = (0..args.streams)
            .map(|id| s.spawn(move || stream(board, access, id, args.cycles)))
            .collect();
        let mut total = 0;
        for handle in handles {
            total += handle
                .join()
                .map_err(|_| anyhow!("playback stream panicked"))??;
        }
        Ok(total)
    })?;

    if let Some(hooks) = hooks {
        if hooks.binding(BoardFunction::Speaker).is_some() {
            hooks.apply(BoardFunction::Speaker, false)?;
        }
    }
    if args.dsp_holds {
        dsp.release();
    }

    let state = access
        .access_state()
        .ok_or_else(|| anyhow!("access state released during the run"))?;
    let cycles = args.streams * args.cycles;
    info!(
        "{} cycles, {} reachable, {} wakes, ap_enable_cnt {}, cp_enable_cnt {}",
        cycles,
        reachable,
        board.mailbox.messages().len(),
        state.ap_enable_cnt,
        state.cp_enable_cnt
    );
    if state.ap_enable_cnt != 0 {
        bail!("ap_enable_cnt is {} after balanced cycles", state.ap_enable_cnt);
    }

    Ok(RunReport {
        reported_addr,
        cycles,
        wakes: board.mailbox.messages().len(),
        ap_enable_cnt: state.ap_enable_cnt,
        cp_enable_cnt: state.cp_enable_cnt,
    })
}
