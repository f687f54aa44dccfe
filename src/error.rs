//! Error type for the command line front end

use spiboot_core::bringup::BringupError;
use thiserror::Error;

/// Errors reported by a subcommand
#[derive(Debug, Error)]
pub enum CliError {
    /// The bring-up sequence stopped
    #[error("{0}")]
    Bringup(#[from] BringupError),

    /// A single bus operation failed
    #[error("SPI error: {0}")]
    Spi(#[from] spiboot_core::Error),

    /// Rejected command line value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl CliError {
    /// Process exit status for this error
    ///
    /// A device that needs a reset gets its own status so a boot harness can
    /// power-cycle instead of retrying.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Bringup(BringupError::ResetRequired { .. }) => 2,
            _ => 1,
        }
    }
}

/// Result type for CLI commands
pub type Result<T> = std::result::Result<T, CliError>;
