//! Flash bus trait
//!
//! The bring-up driver never touches hardware directly. The boot code hands
//! it a bus implementing [`SpiBus`], borrowed exclusively for the whole
//! sequence. The lower hardware layer owns chip-select and clocking; this
//! crate only decides which commands go out and in what order.

use crate::error::Result;
use crate::spi::SpiCommand;
use bitflags::bitflags;

bitflags! {
    /// SPI bus feature flags
    ///
    /// These flags indicate which transfer widths the host side of the bus
    /// can switch to once the flash part accepts them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SpiFeatures: u32 {
        /// Can read four bits at once (1-1-4 mode)
        const QUAD_IN = 1 << 0;
        /// Can transfer four bits at once (1-4-4 mode)
        const QUAD_IO = 1 << 1;

        /// Shorthand for quad mode (both QUAD_IN and QUAD_IO)
        const QUAD = Self::QUAD_IN.bits() | Self::QUAD_IO.bits();
    }
}

impl Default for SpiFeatures {
    fn default() -> Self {
        SpiFeatures::empty()
    }
}

/// Blocking SPI bus used during bring-up
///
/// ## Example
///
/// ```ignore
/// impl SpiBus for RomSpi {
///     fn features(&self) -> SpiFeatures {
///         SpiFeatures::QUAD
///     }
///
///     fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
///         let mut header = [0u8; 8];
///         cmd.encode_header(&mut header);
///         self.transfer(&header[..cmd.header_len()], cmd.write_data, cmd.read_buf)
///     }
///
///     fn delay_us(&mut self, us: u32) {
///         rom_delay_us(us)
///     }
/// }
/// ```
pub trait SpiBus {
    /// Get the transfer widths the host side supports
    fn features(&self) -> SpiFeatures;

    /// Execute a single SPI command
    ///
    /// The command contains all the information needed for the transaction:
    /// - `opcode`: The SPI command opcode
    /// - `address`: Optional address (with width)
    /// - `dummy_cycles`: Number of dummy clock cycles after address
    /// - `write_data`: Data to write after the header
    /// - `read_buf`: Buffer to read into
    ///
    /// Chip-select is asserted for the whole command and released afterwards.
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()>;

    /// Busy-wait for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}

impl<B: SpiBus + ?Sized> SpiBus for &mut B {
    fn features(&self) -> SpiFeatures {
        (**self).features()
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        (**self).execute(cmd)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}
