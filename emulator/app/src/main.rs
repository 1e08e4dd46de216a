/*++

Licensed under the Apache-2.0 license.

File Name:

    main.rs

Abstract:

    Entry point for the AGDSP access emulator.

--*/

use agdsp_emulator::{run, EmulatorArgs};
use clap::Parser;
use simple_logger::SimpleLogger;

fn main() -> anyhow::Result<()> {
    let cli = EmulatorArgs::parse();
    SimpleLogger::new().with_level(cli.log_level).init()?;

    let report = run(&cli)?;
    println!(
        "ok: {} cycles, {} wakes, access state at 0x{:x}",
        report.cycles, report.wakes, report.reported_addr
    );
    Ok(())
}
