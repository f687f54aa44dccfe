//! Flash identification (JEDEC RDID)

use core::fmt;

use crate::bus::SpiBus;
use crate::error::Result;
use crate::spi::{opcodes, SpiCommand};

/// 24-bit JEDEC identity of the attached flash part
///
/// The raw value is the three RDID response bytes assembled big-endian:
/// manufacturer in bits 23-16, device ID (memory type + capacity) in bits
/// 15-0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlashIdentity {
    raw: u32,
}

impl FlashIdentity {
    /// Build an identity from a raw RDID value; bits above 23 are dropped
    pub const fn from_raw(raw: u32) -> Self {
        Self {
            raw: raw & 0x00FF_FFFF,
        }
    }

    /// Build an identity from its manufacturer and device parts
    pub const fn from_parts(manufacturer_id: u8, device_id: u16) -> Self {
        Self {
            raw: ((manufacturer_id as u32) << 16) | device_id as u32,
        }
    }

    /// The raw 24-bit value
    pub const fn raw(&self) -> u32 {
        self.raw
    }

    /// JEDEC manufacturer ID (bits 23-16)
    pub const fn manufacturer_id(&self) -> u8 {
        (self.raw >> 16) as u8
    }

    /// Device ID (bits 15-0)
    pub const fn device_id(&self) -> u16 {
        self.raw as u16
    }

    /// Memory type byte (bits 15-8)
    pub const fn memory_type(&self) -> u8 {
        (self.raw >> 8) as u8
    }

    /// Capacity byte (bits 7-0)
    pub const fn capacity(&self) -> u8 {
        self.raw as u8
    }

    /// True for the all-zeros / all-ones values an absent or unpowered part
    /// drives onto MISO
    ///
    /// Such an identity is not an error by itself; vendor dispatch simply
    /// finds no match for it.
    pub const fn is_ambiguous(&self) -> bool {
        self.raw == 0 || self.raw == 0x00FF_FFFF
    }
}

impl fmt::Display for FlashIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X} {:04X}",
            self.manufacturer_id(),
            self.device_id()
        )
    }
}

/// Read the JEDEC identity of the attached part
///
/// Sends RDID (0x9F) and clocks in three bytes. A dead or missing part
/// still produces a value (usually a sentinel, see
/// [`FlashIdentity::is_ambiguous`]); only transport failures reported by the
/// bus are returned as errors.
pub fn read_identity<B: SpiBus + ?Sized>(bus: &mut B) -> Result<FlashIdentity> {
    let mut buf = [0u8; 3];
    let mut cmd = SpiCommand::read_reg(opcodes::RDID, &mut buf);
    bus.execute(&mut cmd)?;

    let identity = FlashIdentity::from_parts(buf[0], u16::from_be_bytes([buf[1], buf[2]]));
    log::debug!("RDID: {}", identity);
    Ok(identity)
}
