//! CLI argument parsing

use clap::{Parser, Subcommand};
use spiboot_core::bringup::QuadReadMode;
use spiboot_core::bus::SpiFeatures;
use spiboot_dummy::EmulatorConfig;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let value = parse_hex_u32(s)?;
    u16::try_from(value).map_err(|_| format!("Value 0x{:X} does not fit in 16 bits", value))
}

fn parse_hex_u8(s: &str) -> Result<u8, String> {
    let value = parse_hex_u32(s)?;
    u8::try_from(value).map_err(|_| format!("Value 0x{:X} does not fit in 8 bits", value))
}

fn parse_jedec_id(s: &str) -> Result<u32, String> {
    let value = parse_hex_u32(s)?;
    if value > 0x00FF_FFFF {
        return Err(format!("JEDEC ID 0x{:X} is wider than 24 bits", value));
    }
    Ok(value)
}

fn parse_quad_mode(s: &str) -> Result<QuadReadMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "qio" => Ok(QuadReadMode::Qio),
        "qout" => Ok(QuadReadMode::Qout),
        _ => Err(format!("Unknown quad mode '{}' (expected qio or qout)", s)),
    }
}

#[derive(Parser)]
#[command(name = "spiboot")]
#[command(author, version, about = "Boot-time SPI NOR flash bring-up", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Emulated flash part options shared across commands
#[derive(clap::Args, Debug, Clone)]
pub struct EmulatorArgs {
    /// JEDEC ID reported at power-on (hex or decimal)
    #[arg(long, value_parser = parse_jedec_id, default_value = "0xEF4018")]
    pub jedec: u32,

    /// Initial status register 1
    #[arg(long, value_parser = parse_hex_u8, default_value = "0")]
    pub sr1: u8,

    /// Initial status register 2
    #[arg(long, value_parser = parse_hex_u8, default_value = "0")]
    pub sr2: u8,

    /// Status bits that ignore writes (SR2 in the high byte)
    #[arg(long, value_parser = parse_hex_u16, default_value = "0")]
    pub stuck: u16,

    /// The part needs the vendor startup handshake before erase/program
    #[arg(long)]
    pub needs_startup: bool,

    /// Status reads reporting busy after release from power-down
    #[arg(long, default_value_t = 0, conflicts_with = "never_ready")]
    pub ready_after: u32,

    /// The part never reports ready after release from power-down
    #[arg(long)]
    pub never_ready: bool,

    /// JEDEC ID reported after release from power-down
    #[arg(long, value_parser = parse_jedec_id)]
    pub wake_jedec: Option<u32>,

    /// Vendor ID stored in the SFDP table (default: the JEDEC manufacturer)
    #[arg(long, value_parser = parse_hex_u8)]
    pub sfdp_vendor: Option<u8>,

    /// Emulate a host bus limited to single I/O
    #[arg(long)]
    pub single_io_bus: bool,
}

impl EmulatorArgs {
    /// Build the emulator configuration
    pub fn to_config(&self) -> EmulatorConfig {
        EmulatorConfig {
            jedec_id: self.jedec,
            sr1: self.sr1,
            sr2: self.sr2,
            stuck_bits: self.stuck,
            needs_startup: self.needs_startup,
            ready_after: (!self.never_ready).then_some(self.ready_after),
            wake_jedec_id: self.wake_jedec,
            sfdp_vendor: self.sfdp_vendor,
            features: if self.single_io_bus {
                SpiFeatures::empty()
            } else {
                SpiFeatures::QUAD
            },
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full bring-up sequence and print the report
    Boot {
        #[command(flatten)]
        emulator: EmulatorArgs,

        /// Enable a quad read mode (qio or qout)
        #[arg(long, value_parser = parse_quad_mode)]
        quad: Option<QuadReadMode>,

        /// Check the SFDP vendor ID before skipping the startup handshake
        #[arg(long)]
        sfdp_probe: bool,

        /// Readiness polls allowed after the startup handshake
        #[arg(long, default_value_t = 50)]
        ready_polls: u32,
    },

    /// Read the JEDEC ID and show how the part would be handled
    Id {
        #[command(flatten)]
        emulator: EmulatorArgs,
    },

    /// Read up to four bytes of SFDP data
    Sfdp {
        #[command(flatten)]
        emulator: EmulatorArgs,

        /// SFDP address (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        addr: u32,

        /// Number of bytes (0-4)
        #[arg(long, default_value_t = 4)]
        len: u8,
    },

    /// List the vendor dispatch tables
    Vendors,
}
