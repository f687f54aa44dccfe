//! SFDP read command

use spiboot_core::sfdp::{self, MAX_SFDP_READ};
use spiboot_dummy::EmulatedFlash;

use crate::cli::EmulatorArgs;
use crate::error::{CliError, Result};

/// Read `len` SFDP bytes at `addr` and print them
pub fn run_sfdp(emulator: &EmulatorArgs, addr: u32, len: u8) -> Result<()> {
    if len as usize > MAX_SFDP_READ {
        return Err(CliError::InvalidParameter(format!(
            "--len {} exceeds the {} byte limit",
            len, MAX_SFDP_READ
        )));
    }

    let mut flash = EmulatedFlash::new(emulator.to_config());
    let bytes = sfdp::read_sfdp(&mut flash, addr, len)?;

    let hex: Vec<String> = bytes.iter().map(|b| format!("{:02X}", b)).collect();
    println!("SFDP[0x{:06X}]: {}", addr, hex.join(" "));
    if !bytes.is_empty() {
        println!("Value (LE):   0x{:0width$X}", sfdp::to_u32_le(&bytes), width = bytes.len() * 2);
    }

    if addr == 0 {
        match sfdp::read_header(&mut flash) {
            Ok(header) => println!(
                "Header:       rev {}.{}, {} parameter header(s)",
                header.revision.major,
                header.revision.minor,
                header.num_param_headers()
            ),
            Err(e) => println!("Header:       {}", e),
        }
    }
    Ok(())
}
