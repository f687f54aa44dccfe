//! spiboot - Boot-time SPI NOR flash bring-up
//!
//! Runs the bring-up driver from `spiboot-core` against an emulated flash
//! part from `spiboot-dummy`. Every fault a board can show during early boot
//! (a vendor part that never settles, sticky status bits, an unknown
//! vendor) can be dialled in from the command line to see what the driver
//! does about it.

mod cli;
mod commands;
mod error;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let result = match cli.command {
        Commands::Boot {
            emulator,
            quad,
            sfdp_probe,
            ready_polls,
        } => commands::boot::run_boot(&emulator, quad, sfdp_probe, ready_polls),
        Commands::Id { emulator } => commands::id::run_id(&emulator),
        Commands::Sfdp {
            emulator,
            addr,
            len,
        } => commands::sfdp::run_sfdp(&emulator, addr, len),
        Commands::Vendors => {
            commands::vendors::list_vendors();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
