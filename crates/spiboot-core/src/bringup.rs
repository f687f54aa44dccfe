//! One-shot flash bring-up
//!
//! [`Bringup`] runs the whole sequence the boot code needs before it may
//! touch the flash: identify, vendor startup, write protection unlock and
//! optionally quad enable. Only a failed vendor startup stops the sequence.
//! Unlock and quad failures are logged and recorded in the
//! [`BringupReport`]; the boot continues in single I/O mode.

use core::fmt;

use crate::bus::SpiBus;
use crate::error::Error;
use crate::identity::{read_identity, FlashIdentity};
use crate::poll::PollConfig;
use crate::quad::{QuadModeEnabler, QuadModeError, QuadModeStrategy};
use crate::spi::{check_io_mode_supported, IoMode};
use crate::startup::{StartupConfig, StartupOutcome, VendorStartupSequencer};
use crate::unlock::{DefaultUnlocker, UnlockError, WriteProtectUnlocker};

pub use crate::quad::QuadReadMode;

/// Bring-up configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BootConfig {
    /// Quad read mode to enable, `None` to stay in single I/O
    pub quad: Option<QuadReadMode>,
    /// Busy polling around status register writes
    pub busy_poll: PollConfig,
    /// Vendor startup handshake settings
    pub startup: StartupConfig,
}

/// What happened to the quad enable request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuadStatus {
    /// `BootConfig::quad` was `None`
    NotRequested,
    /// The part accepts quad transfers
    Enabled(QuadModeStrategy),
    /// The host bus cannot do the requested mode; the part was not touched
    BusUnsupported,
    /// Quad enable failed
    Failed(QuadModeError),
}

impl QuadStatus {
    /// True if the part was switched to accept quad transfers
    pub fn is_enabled(&self) -> bool {
        matches!(self, QuadStatus::Enabled(_))
    }
}

impl fmt::Display for QuadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuadStatus::NotRequested => write!(f, "not requested"),
            QuadStatus::Enabled(strategy) => write!(f, "enabled ({})", strategy),
            QuadStatus::BusUnsupported => write!(f, "not supported by host bus"),
            QuadStatus::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Result of a completed bring-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BringupReport {
    /// Identity the part reports once the startup flow has run
    pub identity: FlashIdentity,
    /// Vendor startup outcome (never `Failed` in a report)
    pub startup: StartupOutcome,
    /// Write protection unlock result
    pub unlock: Result<(), UnlockError>,
    /// Quad enable result
    pub quad: QuadStatus,
    /// I/O mode the host bus should switch to for code fetch
    pub io_mode: IoMode,
}

/// Fatal bring-up failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BringupError {
    /// Vendor startup failed; no erase or program is allowed until the
    /// device has been fully reset
    ResetRequired {
        /// Identity read before the startup flow
        identity: FlashIdentity,
    },
    /// SPI communication error while identifying the part
    Bus(Error),
}

impl From<Error> for BringupError {
    fn from(e: Error) -> Self {
        BringupError::Bus(e)
    }
}

impl fmt::Display for BringupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BringupError::ResetRequired { identity } => write!(
                f,
                "flash {} failed its startup sequence, device reset required",
                identity
            ),
            BringupError::Bus(e) => write!(f, "SPI error during bring-up: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BringupError {}

/// Flash bring-up sequence
#[derive(Debug, Clone, Copy)]
pub struct Bringup<U = DefaultUnlocker> {
    config: BootConfig,
    unlocker: U,
}

impl Bringup<DefaultUnlocker> {
    /// Bring-up with the vendor-table unlock procedure
    pub fn new(config: BootConfig) -> Self {
        let unlocker = DefaultUnlocker::new(config.busy_poll);
        Self { config, unlocker }
    }
}

impl<U: WriteProtectUnlocker> Bringup<U> {
    /// Bring-up with a board-specific unlock procedure
    pub fn with_unlocker(config: BootConfig, unlocker: U) -> Self {
        Self { config, unlocker }
    }

    /// Run the sequence on `bus`
    pub fn run<B: SpiBus + ?Sized>(&self, bus: &mut B) -> Result<BringupReport, BringupError> {
        let identity = read_identity(bus)?;
        if identity.is_ambiguous() {
            log::warn!("flash identity {} is ambiguous, is the part powered?", identity);
        }

        let started = VendorStartupSequencer::new(self.config.startup).start(bus, identity);
        let startup = started.outcome;
        if !startup.writes_allowed() {
            log::error!("flash {} startup failed, reset required", identity);
            return Err(BringupError::ResetRequired { identity });
        }
        let identity = started.identity;

        let unlock = self.unlocker.unlock(bus, identity);
        if let Err(e) = &unlock {
            log::warn!("{}, continuing with write protection in place", e);
        }

        let quad = match self.config.quad {
            None => QuadStatus::NotRequested,
            Some(mode) => self.enable_quad(bus, identity, mode),
        };

        let io_mode = match self.config.quad {
            Some(mode) if quad.is_enabled() => mode.io_mode(),
            _ => IoMode::Single,
        };

        log::info!("flash {} ready, read mode {}", identity, io_mode);
        Ok(BringupReport {
            identity,
            startup,
            unlock,
            quad,
            io_mode,
        })
    }

    fn enable_quad<B: SpiBus + ?Sized>(
        &self,
        bus: &mut B,
        identity: FlashIdentity,
        mode: QuadReadMode,
    ) -> QuadStatus {
        if check_io_mode_supported(mode.io_mode(), bus.features()).is_err() {
            log::warn!("host bus cannot do {}, staying in single I/O", mode.io_mode());
            return QuadStatus::BusUnsupported;
        }

        match QuadModeEnabler::new(self.config.busy_poll).enable_with_identity(bus, identity) {
            Ok(strategy) => QuadStatus::Enabled(strategy),
            Err(e) => {
                log::warn!("{}, staying in single I/O", e);
                QuadStatus::Failed(e)
            }
        }
    }
}
