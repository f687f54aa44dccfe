//! Identify command

use spiboot_core::identity::read_identity;
use spiboot_core::quad::{self, QUAD_ENABLE_TABLE};
use spiboot_core::startup::{find_quirk, STARTUP_QUIRKS};
use spiboot_core::unlock::UnlockLayout;
use spiboot_dummy::EmulatedFlash;

use crate::cli::EmulatorArgs;
use crate::error::Result;

/// Read the JEDEC ID and show which procedures would apply
pub fn run_id(emulator: &EmulatorArgs) -> Result<()> {
    let mut flash = EmulatedFlash::new(emulator.to_config());
    let identity = read_identity(&mut flash)?;

    println!("JEDEC ID:   {}", identity);
    if identity.is_ambiguous() {
        println!("            (ambiguous, no part answering?)");
        return Ok(());
    }

    let vendor = quad::lookup(QUAD_ENABLE_TABLE, identity).map_or("unknown", |e| e.vendor);
    println!("Vendor:     {}", vendor);
    println!("Quad:       {}", quad::select_strategy(identity));
    println!("Unlock:     {:?}", UnlockLayout::for_identity(identity));

    match find_quirk(STARTUP_QUIRKS, identity.manufacturer_id()) {
        Some(q) if q.is_known_good(identity) => println!("Startup:    {} (known good)", q.vendor),
        Some(q) => println!("Startup:    {} handshake", q.vendor),
        None => println!("Startup:    none"),
    }
    Ok(())
}
