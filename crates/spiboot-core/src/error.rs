//! Error types for spiboot-core
//!
//! This module provides the no_std compatible bus-level error type shared by
//! every component. Component-specific failures (unlock, quad enable,
//! bring-up) live next to their components and wrap this type.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Bus errors
    /// SPI transfer failed
    SpiTransferFailed,
    /// Opcode is not supported by the bus implementation
    OpcodeNotSupported,
    /// A busy/ready poll ran out of attempts
    Timeout,
    /// Requested I/O mode is not supported by the bus
    IoModeNotSupported,

    // Caller errors
    /// Argument outside the operation's contract (e.g. SFDP length > 4)
    InvalidArgument,

    // Parameter table errors
    /// SFDP header signature or revision not recognised
    SfdpInvalid,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpiTransferFailed => write!(f, "SPI transfer failed"),
            Self::OpcodeNotSupported => write!(f, "SPI opcode not supported by bus"),
            Self::Timeout => write!(f, "flash did not become ready within the poll limit"),
            Self::IoModeNotSupported => write!(f, "I/O mode not supported by bus"),
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::SfdpInvalid => write!(f, "SFDP header not valid"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
