//! Full bring-up command

use spiboot_core::bringup::{BootConfig, Bringup, BringupReport, QuadReadMode};
use spiboot_core::poll::PollConfig;
use spiboot_core::startup::{StartupConfig, MIN_READY_POLL_DELAY_US};
use spiboot_dummy::EmulatedFlash;

use crate::cli::EmulatorArgs;
use crate::error::Result;

/// Run bring-up against the emulated part and print the report
pub fn run_boot(
    emulator: &EmulatorArgs,
    quad: Option<QuadReadMode>,
    sfdp_probe: bool,
    ready_polls: u32,
) -> Result<()> {
    let mut flash = EmulatedFlash::new(emulator.to_config());
    let config = BootConfig {
        quad,
        busy_poll: PollConfig::default(),
        startup: StartupConfig {
            ready_poll: PollConfig::new(ready_polls, MIN_READY_POLL_DELAY_US),
            sfdp_vendor_probe: sfdp_probe,
        },
    };

    let result = Bringup::new(config).run(&mut flash);
    log::debug!(
        "{} SPI transactions, {} us of delay",
        flash.transactions().len(),
        flash.delays().iter().map(|&d| d as u64).sum::<u64>()
    );

    let report = result?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &BringupReport) {
    println!("Flash:      {}", report.identity);
    println!("Startup:    {}", report.startup);
    match &report.unlock {
        Ok(()) => println!("Unlock:     ok"),
        Err(e) => println!("Unlock:     {}", e),
    }
    println!("Quad:       {}", report.quad);
    println!("Read mode:  {}", report.io_mode);
}
