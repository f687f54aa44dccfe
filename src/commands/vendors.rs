//! Vendor table listing

use spiboot_core::quad::{QuadModeStrategy, QUAD_ENABLE_TABLE};
use spiboot_core::startup::STARTUP_QUIRKS;

/// Print the quad enable and startup quirk tables
pub fn list_vendors() {
    println!("Quad enable:");
    println!();
    println!("{:<10} {:>6} {:>8} {:>8}  {}", "Vendor", "Mfr", "Device", "Mask", "Strategy");
    println!("{}", "-".repeat(50));
    for entry in QUAD_ENABLE_TABLE {
        let strategy = match entry.strategy {
            QuadModeStrategy::StatusRegister2Bit(_) => format!("{} via {}", entry.strategy, entry.sr2_write),
            other => other.to_string(),
        };
        println!(
            "{:<10} {:>6} {:>8} {:>8}  {}",
            entry.vendor,
            format!("0x{:02X}", entry.manufacturer_id),
            format!("0x{:04X}", entry.device_id),
            format!("0x{:04X}", entry.device_mask),
            strategy
        );
    }

    println!();
    println!("Startup handshake:");
    println!();
    println!("{:<10} {:>6}  {}", "Vendor", "Mfr", "Known good RDID");
    println!("{}", "-".repeat(50));
    for quirk in STARTUP_QUIRKS {
        let ranges: Vec<String> = quirk
            .known_good
            .iter()
            .map(|r| format!("{:02X}{:02X}-{:02X}", r.memory_type, r.capacity_min, r.capacity_max))
            .collect();
        println!(
            "{:<10} {:>6}  {}",
            quirk.vendor,
            format!("0x{:02X}", quirk.manufacturer_id),
            if ranges.is_empty() { "-".to_string() } else { ranges.join(", ") }
        );
    }
}
