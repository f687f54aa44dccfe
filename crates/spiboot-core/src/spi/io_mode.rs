//! SPI I/O modes

/// I/O mode of the host's flash read path
///
/// Bring-up itself only ever talks to the part in `Single` mode. The mode
/// reported after quad enabling tells the host bus driver which transfer
/// width the flash will now accept for code fetch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum IoMode {
    /// Standard SPI: 1-1-1 (cmd, addr, data all on single line)
    #[default]
    Single,
    /// Quad Output: 1-1-4 (data phase on 4 lines)
    QuadOut,
    /// Quad I/O: 1-4-4 (addr and data on 4 lines)
    QuadIo,
}

impl core::fmt::Display for IoMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Single => write!(f, "single (1-1-1)"),
            Self::QuadOut => write!(f, "QOUT (1-1-4)"),
            Self::QuadIo => write!(f, "QIO (1-4-4)"),
        }
    }
}

use crate::bus::SpiFeatures;
use crate::error::{Error, Result};

/// Check if a bus supports the requested I/O mode
///
/// Returns `Ok(())` if the mode is supported, or `Err(IoModeNotSupported)` if not.
pub fn check_io_mode_supported(mode: IoMode, features: SpiFeatures) -> Result<()> {
    let required = match mode {
        IoMode::Single => return Ok(()),
        IoMode::QuadOut => SpiFeatures::QUAD_IN,
        IoMode::QuadIo => SpiFeatures::QUAD_IO,
    };
    if features.contains(required) {
        Ok(())
    } else {
        Err(Error::IoModeNotSupported)
    }
}
