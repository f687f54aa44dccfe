//! Quad Enable (QE) handling
//!
//! A flash part ignores 1-1-4 and 1-4-4 reads until its Quad Enable bit is
//! set (or, on some parts, until a vendor command switches it over). Where
//! that bit lives is vendor specific, so the strategy comes from a static
//! table keyed on the JEDEC identity. Unknown parts are left alone: a wrong
//! guess could flip a protect bit instead of QE.
//!
//! Enabling only makes the *part* accept quad transfers. Switching the host
//! controller's read mode is the caller's job.

use core::fmt;

use crate::bus::SpiBus;
use crate::error::Error;
use crate::identity::{read_identity, FlashIdentity};
use crate::poll::PollConfig;
use crate::protocol;
use crate::spi::{opcodes, IoMode};

/// SR1 bits that reflect an operation in flight rather than configuration
const SR1_VOLATILE: u8 = opcodes::SR1_WIP | opcodes::SR1_WEL;

/// How to put a given part into quad mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuadModeStrategy {
    /// Set this bit of status register 1, written with one-byte WRSR
    StatusRegister1Bit(u8),
    /// Set this bit of status register 2, written as the table row's
    /// [`Sr2Write`] says
    StatusRegister2Bit(u8),
    /// Issue this opcode; the part has no QE register bit
    VendorCommand(u8),
    /// No known procedure for this part
    Unsupported,
}

impl fmt::Display for QuadModeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuadModeStrategy::StatusRegister1Bit(bit) => write!(f, "SR1 bit {}", bit),
            QuadModeStrategy::StatusRegister2Bit(bit) => write!(f, "SR2 bit {}", bit),
            QuadModeStrategy::VendorCommand(opcode) => write!(f, "command 0x{:02X}", opcode),
            QuadModeStrategy::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// How status register 2 is written back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Sr2Write {
    /// WRSR (0x01) with SR1 and SR2
    #[default]
    TwoByteWrsr,
    /// WRSR2 (0x31) with SR2 alone
    Wrsr2,
}

impl fmt::Display for Sr2Write {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sr2Write::TwoByteWrsr => write!(f, "WRSR"),
            Sr2Write::Wrsr2 => write!(f, "WRSR2"),
        }
    }
}

/// One row of the quad-enable dispatch table
#[derive(Debug, Clone, Copy)]
pub struct QuadEnableEntry {
    /// Vendor name, for logs
    pub vendor: &'static str,
    /// JEDEC manufacturer ID
    pub manufacturer_id: u8,
    /// Device ID after masking
    pub device_id: u16,
    /// Mask applied to the identity's device ID before comparing
    pub device_mask: u16,
    /// Procedure for matching parts
    pub strategy: QuadModeStrategy,
    /// Write opcode for [`QuadModeStrategy::StatusRegister2Bit`]
    pub sr2_write: Sr2Write,
}

impl QuadEnableEntry {
    const fn new(
        vendor: &'static str,
        manufacturer_id: u8,
        device_id: u16,
        device_mask: u16,
        strategy: QuadModeStrategy,
    ) -> Self {
        Self {
            vendor,
            manufacturer_id,
            device_id,
            device_mask,
            strategy,
            sr2_write: Sr2Write::TwoByteWrsr,
        }
    }

    const fn wrsr2(self) -> Self {
        Self {
            sr2_write: Sr2Write::Wrsr2,
            ..self
        }
    }

    /// True if this row applies to `identity`
    pub fn matches(&self, identity: FlashIdentity) -> bool {
        identity.manufacturer_id() == self.manufacturer_id
            && identity.device_id() & self.device_mask == self.device_id
    }
}

/// Known quad-enable procedures, first match wins
pub static QUAD_ENABLE_TABLE: &[QuadEnableEntry] = &[
    QuadEnableEntry::new("MXIC", 0xC2, 0x2000, 0xFF00, QuadModeStrategy::StatusRegister1Bit(6)),
    // IDs 0x40xx and 0x70xx
    QuadEnableEntry::new("ISSI", 0x9D, 0x4000, 0xCF00, QuadModeStrategy::StatusRegister1Bit(6)),
    QuadEnableEntry::new("Winbond", 0xEF, 0x4000, 0xFF00, QuadModeStrategy::StatusRegister2Bit(1)),
    QuadEnableEntry::new("GD", 0xC8, 0x6000, 0xFF00, QuadModeStrategy::StatusRegister2Bit(1)).wrsr2(),
    QuadEnableEntry::new("XMC", 0x20, 0x4000, 0xFF00, QuadModeStrategy::StatusRegister2Bit(1)),
    QuadEnableEntry::new("TH", 0xEB, 0x6000, 0xFF00, QuadModeStrategy::StatusRegister2Bit(1)).wrsr2(),
    QuadEnableEntry::new("SST26", 0xBF, 0x2600, 0xFF00, QuadModeStrategy::VendorCommand(opcodes::EQIO)),
];

/// Find the table row for `identity`
///
/// Ambiguous identities never match, even if a row would.
pub fn lookup(
    table: &'static [QuadEnableEntry],
    identity: FlashIdentity,
) -> Option<&'static QuadEnableEntry> {
    if identity.is_ambiguous() {
        return None;
    }
    table.iter().find(|entry| entry.matches(identity))
}

/// Strategy for `identity` from [`QUAD_ENABLE_TABLE`]
pub fn select_strategy(identity: FlashIdentity) -> QuadModeStrategy {
    lookup(QUAD_ENABLE_TABLE, identity).map_or(QuadModeStrategy::Unsupported, |e| e.strategy)
}

/// Host read mode requested once the part accepts quad transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuadReadMode {
    /// Quad I/O, 1-4-4
    #[default]
    Qio,
    /// Quad Output, 1-1-4
    Qout,
}

impl QuadReadMode {
    /// The I/O mode the host bus should switch to
    pub const fn io_mode(&self) -> IoMode {
        match self {
            QuadReadMode::Qio => IoMode::QuadIo,
            QuadReadMode::Qout => IoMode::QuadOut,
        }
    }
}

/// Quad enable failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuadModeError {
    /// No strategy known for this part; nothing was written
    UnsupportedVendor {
        /// Identity that failed to match
        identity: FlashIdentity,
    },
    /// The QE bit did not read back as set after writing
    VerifyMismatch {
        /// Register value written
        expected: u8,
        /// Register value read back
        found: u8,
    },
    /// The table names a register bit that does not exist
    InvalidStrategy(QuadModeStrategy),
    /// SPI communication error
    Bus(Error),
}

impl From<Error> for QuadModeError {
    fn from(e: Error) -> Self {
        QuadModeError::Bus(e)
    }
}

impl fmt::Display for QuadModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuadModeError::UnsupportedVendor { identity } => {
                write!(f, "no quad enable procedure for flash {}", identity)
            }
            QuadModeError::VerifyMismatch { expected, found } => write!(
                f,
                "quad enable verify failed: wrote 0x{:02X}, read 0x{:02X}",
                expected, found
            ),
            QuadModeError::InvalidStrategy(strategy) => {
                write!(f, "invalid quad enable strategy: {}", strategy)
            }
            QuadModeError::Bus(e) => write!(f, "SPI error during quad enable: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for QuadModeError {}

/// Applies the table-selected quad enable procedure
#[derive(Debug, Clone, Copy)]
pub struct QuadModeEnabler {
    poll: PollConfig,
    table: &'static [QuadEnableEntry],
}

impl QuadModeEnabler {
    /// Enabler using [`QUAD_ENABLE_TABLE`]
    pub fn new(poll: PollConfig) -> Self {
        Self::with_table(poll, QUAD_ENABLE_TABLE)
    }

    /// Enabler using a custom dispatch table
    pub fn with_table(poll: PollConfig, table: &'static [QuadEnableEntry]) -> Self {
        Self { poll, table }
    }

    /// Strategy this enabler would apply to `identity`
    pub fn select(&self, identity: FlashIdentity) -> QuadModeStrategy {
        lookup(self.table, identity).map_or(QuadModeStrategy::Unsupported, |e| e.strategy)
    }

    /// Identify the part, then enable quad mode on it
    pub fn enable<B: SpiBus + ?Sized>(&self, bus: &mut B) -> Result<QuadModeStrategy, QuadModeError> {
        let identity = read_identity(bus)?;
        self.enable_with_identity(bus, identity)
    }

    /// Enable quad mode on a part whose identity is already known
    ///
    /// Returns the strategy that was applied. Verify mismatches are
    /// reported, never retried.
    pub fn enable_with_identity<B: SpiBus + ?Sized>(
        &self,
        bus: &mut B,
        identity: FlashIdentity,
    ) -> Result<QuadModeStrategy, QuadModeError> {
        if identity.is_ambiguous() {
            log::warn!("flash identity {} is ambiguous, treating as unsupported", identity);
        }

        let entry = lookup(self.table, identity)
            .filter(|entry| entry.strategy != QuadModeStrategy::Unsupported);
        let Some(entry) = entry else {
            log::warn!("no quad enable procedure for flash {}", identity);
            return Err(QuadModeError::UnsupportedVendor { identity });
        };

        let strategy = entry.strategy;
        match strategy {
            QuadModeStrategy::StatusRegister1Bit(bit) => self.set_sr1_bit(bus, bit)?,
            QuadModeStrategy::StatusRegister2Bit(bit) => self.set_sr2_bit(bus, bit, entry.sr2_write)?,
            QuadModeStrategy::VendorCommand(opcode) => protocol::send_command(bus, opcode)?,
            QuadModeStrategy::Unsupported => return Err(QuadModeError::UnsupportedVendor { identity }),
        }

        log::info!("quad mode enabled on {} ({})", identity, strategy);
        Ok(strategy)
    }

    fn set_sr1_bit<B: SpiBus + ?Sized>(&self, bus: &mut B, bit: u8) -> Result<(), QuadModeError> {
        let mask = bit_mask(bit).ok_or(QuadModeError::InvalidStrategy(
            QuadModeStrategy::StatusRegister1Bit(bit),
        ))?;
        protocol::wait_ready(bus, self.poll)?;

        let sr1 = protocol::read_status1(bus)? & !SR1_VOLATILE;
        if sr1 & mask != 0 {
            log::debug!("QE already set (SR1 0x{:02X})", sr1);
            return Ok(());
        }

        let expected = sr1 | mask;
        protocol::write_status1(bus, expected, self.poll)?;

        let found = protocol::read_status1(bus)? & !SR1_VOLATILE;
        if found & mask == 0 {
            return Err(QuadModeError::VerifyMismatch { expected, found });
        }
        Ok(())
    }

    fn set_sr2_bit<B: SpiBus + ?Sized>(
        &self,
        bus: &mut B,
        bit: u8,
        write: Sr2Write,
    ) -> Result<(), QuadModeError> {
        let mask = bit_mask(bit).ok_or(QuadModeError::InvalidStrategy(
            QuadModeStrategy::StatusRegister2Bit(bit),
        ))?;
        protocol::wait_ready(bus, self.poll)?;

        let sr1 = protocol::read_status1(bus)? & !SR1_VOLATILE;
        let sr2 = protocol::read_status2(bus)?;
        if sr2 & mask != 0 {
            log::debug!("QE already set (SR2 0x{:02X})", sr2);
            return Ok(());
        }

        let expected = sr2 | mask;
        match write {
            Sr2Write::TwoByteWrsr => {
                protocol::write_status12(bus, u16::from_le_bytes([sr1, expected]), self.poll)?
            }
            Sr2Write::Wrsr2 => protocol::write_status2(bus, expected, self.poll)?,
        }

        let found = protocol::read_status2(bus)?;
        if found & mask == 0 {
            return Err(QuadModeError::VerifyMismatch { expected, found });
        }
        Ok(())
    }
}

impl Default for QuadModeEnabler {
    fn default() -> Self {
        Self::new(PollConfig::default())
    }
}

fn bit_mask(bit: u8) -> Option<u8> {
    1u8.checked_shl(bit as u32)
}

/// Identify the part and enable quad mode with the default table
pub fn enable_quad_mode<B: SpiBus + ?Sized>(bus: &mut B) -> Result<QuadModeStrategy, QuadModeError> {
    QuadModeEnabler::default().enable(bus)
}
