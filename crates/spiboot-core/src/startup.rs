//! Vendor startup handshake
//!
//! Some parts (XMC XM25QHxxC family) can come out of power-up in a state
//! where erase and program commands are unsafe. The vendor's recovery is a
//! trip through deep and ultra-deep power-down followed by a release and a
//! readiness check. If the part does not settle, its mode latch is
//! ambiguous and the only way out is a full power-on or watchdog reset.
//! [`StartupOutcome::Failed`] carries that obligation to the caller.

use core::fmt;

use crate::bus::SpiBus;
use crate::error::Result;
use crate::identity::{read_identity, FlashIdentity};
use crate::poll::PollConfig;
use crate::protocol;
use crate::sfdp;
use crate::spi::opcodes;

/// Exit time from ultra-deep power-down (tXUDPD)
pub const T_XUDPD_US: u32 = 2_000;
/// Release-from-power-down to ready (tRES1)
pub const T_RES_US: u32 = 20;
/// Lower bound for the delay between readiness polls
pub const MIN_READY_POLL_DELAY_US: u32 = 20;

/// Result of the vendor startup handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupOutcome {
    /// The part needs no handshake
    Skipped,
    /// Handshake not needed for this exact part, or completed and verified
    Succeeded,
    /// The part did not settle; no erase/program until a device reset
    Failed,
}

impl StartupOutcome {
    /// Whether erase/program may be issued in this boot cycle
    pub fn writes_allowed(&self) -> bool {
        !matches!(self, StartupOutcome::Failed)
    }
}

impl fmt::Display for StartupOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupOutcome::Skipped => write!(f, "skipped"),
            StartupOutcome::Succeeded => write!(f, "succeeded"),
            StartupOutcome::Failed => write!(f, "failed (device reset required)"),
        }
    }
}

/// Startup outcome plus the identity to use for the rest of bring-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupResult {
    /// What the handshake did
    pub outcome: StartupOutcome,
    /// Identity re-read after a successful handshake, otherwise the one
    /// passed in
    pub identity: FlashIdentity,
}

/// Inclusive range of RDID capacity bytes for one memory type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceRange {
    /// Memory type byte (RDID bits 15-8)
    pub memory_type: u8,
    /// Smallest capacity byte
    pub capacity_min: u8,
    /// Largest capacity byte
    pub capacity_max: u8,
}

impl DeviceRange {
    const fn new(memory_type: u8, capacity_min: u8, capacity_max: u8) -> Self {
        Self {
            memory_type,
            capacity_min,
            capacity_max,
        }
    }

    fn contains(&self, identity: FlashIdentity) -> bool {
        identity.memory_type() == self.memory_type
            && (self.capacity_min..=self.capacity_max).contains(&identity.capacity())
    }
}

/// A vendor whose parts need the startup handshake
#[derive(Debug, Clone, Copy)]
pub struct StartupQuirk {
    /// Vendor name, for logs
    pub vendor: &'static str,
    /// JEDEC manufacturer ID the quirk is keyed on
    pub manufacturer_id: u8,
    /// RDID values that prove the part already started cleanly
    pub known_good: &'static [DeviceRange],
}

impl StartupQuirk {
    /// True if `identity` is one of the vendor's parts reporting a clean start
    pub fn is_known_good(&self, identity: FlashIdentity) -> bool {
        identity.manufacturer_id() == self.manufacturer_id
            && self.known_good.iter().any(|r| r.contains(identity))
    }

    /// True if `identity`, read after the handshake, still belongs to this vendor
    pub fn accepts(&self, identity: FlashIdentity) -> bool {
        !identity.is_ambiguous() && identity.manufacturer_id() == self.manufacturer_id
    }
}

const XMC_KNOWN_GOOD: &[DeviceRange] = &[
    DeviceRange::new(0x40, 0x13, 0x20),
    DeviceRange::new(0x41, 0x17, 0x20),
    DeviceRange::new(0x50, 0x15, 0x16),
];

/// Vendors that need the startup handshake
///
/// XMC parts report 0x20 when healthy; 0x37 is the manufacturer byte seen on
/// XMC parts whose startup left them in the ambiguous mode.
pub static STARTUP_QUIRKS: &[StartupQuirk] = &[
    StartupQuirk {
        vendor: "XMC",
        manufacturer_id: 0x20,
        known_good: XMC_KNOWN_GOOD,
    },
    StartupQuirk {
        vendor: "XMC",
        manufacturer_id: 0x37,
        known_good: &[],
    },
];

/// Look up the startup quirk for a manufacturer ID in `table`
pub fn find_quirk(table: &'static [StartupQuirk], manufacturer_id: u8) -> Option<&'static StartupQuirk> {
    table.iter().find(|q| q.manufacturer_id == manufacturer_id)
}

/// Startup handshake configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupConfig {
    /// Readiness polling after release from power-down; the delay is raised
    /// to at least [`MIN_READY_POLL_DELAY_US`]
    pub ready_poll: PollConfig,
    /// When the RDID manufacturer is not a quirk vendor, also check the
    /// manufacturer recorded in SFDP before skipping
    pub sfdp_vendor_probe: bool,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            ready_poll: PollConfig::new(50, MIN_READY_POLL_DELAY_US),
            sfdp_vendor_probe: false,
        }
    }
}

/// Runs the vendor startup handshake when the identity calls for it
#[derive(Debug, Clone, Copy)]
pub struct VendorStartupSequencer {
    config: StartupConfig,
    quirks: &'static [StartupQuirk],
}

impl VendorStartupSequencer {
    /// Sequencer using [`STARTUP_QUIRKS`]
    pub fn new(config: StartupConfig) -> Self {
        Self::with_quirks(config, STARTUP_QUIRKS)
    }

    /// Sequencer using a custom quirk table
    pub fn with_quirks(config: StartupConfig, quirks: &'static [StartupQuirk]) -> Self {
        Self { config, quirks }
    }

    /// Run the handshake for `identity` if its vendor needs one
    ///
    /// Returns `Skipped` without bus activity for vendors outside the quirk
    /// table (unless the SFDP probe is enabled). A `Failed` outcome must not
    /// be retried in place; the caller has to reset the device before any
    /// erase or program.
    pub fn run_startup<B: SpiBus + ?Sized>(&self, bus: &mut B, identity: FlashIdentity) -> StartupOutcome {
        self.start(bus, identity).outcome
    }

    /// Like [`run_startup`](Self::run_startup), also returning the identity
    /// the part reports once the handshake is done
    pub fn start<B: SpiBus + ?Sized>(&self, bus: &mut B, identity: FlashIdentity) -> StartupResult {
        let unchanged = |outcome| StartupResult { outcome, identity };

        let quirk = match self.select(bus, identity) {
            Some(quirk) => quirk,
            None => return unchanged(StartupOutcome::Skipped),
        };

        if quirk.is_known_good(identity) {
            log::debug!("{} chip {} started cleanly, skipping startup flow", quirk.vendor, identity);
            return unchanged(StartupOutcome::Succeeded);
        }

        log::info!("{} startup flow (RDID {})", quirk.vendor, identity);
        match self.handshake(bus, quirk) {
            Ok(Some(woken)) => {
                if woken != identity {
                    log::info!("flash identity changed from {} to {} after startup flow", identity, woken);
                }
                StartupResult {
                    outcome: StartupOutcome::Succeeded,
                    identity: woken,
                }
            }
            Ok(None) => unchanged(StartupOutcome::Failed),
            Err(e) => {
                log::error!("{} startup flow aborted: {}", quirk.vendor, e);
                unchanged(StartupOutcome::Failed)
            }
        }
    }

    fn select<B: SpiBus + ?Sized>(&self, bus: &mut B, identity: FlashIdentity) -> Option<&'static StartupQuirk> {
        if let Some(quirk) = find_quirk(self.quirks, identity.manufacturer_id()) {
            return Some(quirk);
        }
        if !self.config.sfdp_vendor_probe {
            return None;
        }

        match sfdp::read_vendor_id(bus) {
            Ok(vendor_id) => {
                let quirk = find_quirk(self.quirks, vendor_id);
                if quirk.is_none() {
                    log::debug!("SFDP vendor 0x{:02X} needs no startup flow", vendor_id);
                }
                quirk
            }
            Err(e) => {
                log::warn!("SFDP vendor probe failed: {}", e);
                None
            }
        }
    }

    fn handshake<B: SpiBus + ?Sized>(
        &self,
        bus: &mut B,
        quirk: &StartupQuirk,
    ) -> Result<Option<FlashIdentity>> {
        protocol::deep_power_down(bus)?;
        protocol::send_command(bus, opcodes::UDPD)?;
        protocol::send_command(bus, opcodes::EXIT_UDPD)?;
        bus.delay_us(T_XUDPD_US);
        protocol::release_power_down(bus)?;
        bus.delay_us(T_RES_US);

        let poll = self.config.ready_poll.with_min_delay(MIN_READY_POLL_DELAY_US);
        if !poll.poll(bus, |bus| Ok(!protocol::is_busy(bus)?))? {
            log::error!(
                "{} flash not ready after {} polls, startup failed",
                quirk.vendor,
                poll.max_attempts
            );
            return Ok(None);
        }

        let identity = read_identity(bus)?;
        if !self.same_vendor(quirk, identity) {
            log::error!("{} flash reports {} after startup flow", quirk.vendor, identity);
            return Ok(None);
        }
        Ok(Some(identity))
    }

    /// The part may come back under another of the vendor's manufacturer IDs
    fn same_vendor(&self, quirk: &StartupQuirk, identity: FlashIdentity) -> bool {
        quirk.accepts(identity)
            || find_quirk(self.quirks, identity.manufacturer_id())
                .is_some_and(|other| other.vendor == quirk.vendor && other.accepts(identity))
    }
}

impl Default for VendorStartupSequencer {
    fn default() -> Self {
        Self::new(StartupConfig::default())
    }
}

/// Run the startup handshake with the default configuration
pub fn run_startup<B: SpiBus + ?Sized>(bus: &mut B, identity: FlashIdentity) -> StartupOutcome {
    VendorStartupSequencer::default().run_startup(bus, identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFlash;

    fn sequencer(max_attempts: u32) -> VendorStartupSequencer {
        VendorStartupSequencer::new(StartupConfig {
            ready_poll: PollConfig::new(max_attempts, 0),
            sfdp_vendor_probe: false,
        })
    }

    #[test]
    fn test_other_vendor_skipped_without_bus_activity() {
        let mut bus = MockFlash::new(0xEF4016);
        let id = FlashIdentity::from_raw(bus.jedec);
        assert_eq!(run_startup(&mut bus, id), StartupOutcome::Skipped);
        assert!(bus.log.is_empty());
        assert!(bus.delays.is_empty());
    }

    #[test]
    fn test_quirk_vendor_never_skipped() {
        let mut bus = MockFlash::new(0x375216);
        bus.wake_busy_reads = 2;
        let id = FlashIdentity::from_raw(0x375216);
        let outcome = sequencer(5).run_startup(&mut bus, id);
        assert_eq!(outcome, StartupOutcome::Succeeded);
        assert_eq!(
            &bus.opcodes()[..4],
            &[opcodes::DP, opcodes::UDPD, opcodes::EXIT_UDPD, opcodes::RDP]
        );
        assert_eq!(bus.count(opcodes::RDSR), 3);
        assert_eq!(bus.opcodes().last(), Some(&opcodes::RDID));
        assert_eq!(&bus.delays[..2], &[T_XUDPD_US, T_RES_US]);
        assert!(bus.delays[2..].iter().all(|&d| d >= MIN_READY_POLL_DELAY_US));
    }

    #[test]
    fn test_relabelled_part_wakes_with_real_id() {
        let mut bus = MockFlash::new(0x375216);
        bus.wake_jedec = Some(0x204016);
        let id = FlashIdentity::from_raw(0x375216);
        let result = sequencer(5).start(&mut bus, id);
        assert_eq!(result.outcome, StartupOutcome::Succeeded);
        assert_eq!(result.identity, FlashIdentity::from_raw(0x204016));
    }

    #[test]
    fn test_start_keeps_identity_without_handshake() {
        let mut bus = MockFlash::new(0x204016);
        let id = FlashIdentity::from_raw(0x204016);
        let result = sequencer(5).start(&mut bus, id);
        assert_eq!(result.outcome, StartupOutcome::Succeeded);
        assert_eq!(result.identity, id);
        assert!(bus.log.is_empty());

        let mut failed = MockFlash::new(0x375216);
        failed.wake_busy_reads = u32::MAX;
        let id = FlashIdentity::from_raw(0x375216);
        let result = sequencer(3).start(&mut failed, id);
        assert_eq!(result.outcome, StartupOutcome::Failed);
        assert_eq!(result.identity, id);
    }

    #[test]
    fn test_readiness_never_settles() {
        let mut bus = MockFlash::new(0x375216);
        bus.wake_busy_reads = u32::MAX;
        let id = FlashIdentity::from_raw(0x375216);
        let outcome = sequencer(8).run_startup(&mut bus, id);
        assert_eq!(outcome, StartupOutcome::Failed);
        assert!(!outcome.writes_allowed());
        assert_eq!(bus.count(opcodes::RDSR), 8);
        assert_eq!(bus.count(opcodes::RDID), 0);
    }

    #[test]
    fn test_known_good_xmc_fast_path() {
        let mut bus = MockFlash::new(0x204017);
        let id = FlashIdentity::from_raw(0x204017);
        assert_eq!(sequencer(5).run_startup(&mut bus, id), StartupOutcome::Succeeded);
        assert!(bus.log.is_empty());
    }

    #[test]
    fn test_xmc_outside_known_range_runs_flow() {
        let mut bus = MockFlash::new(0x204012);
        let id = FlashIdentity::from_raw(0x204012);
        assert_eq!(sequencer(5).run_startup(&mut bus, id), StartupOutcome::Succeeded);
        assert_eq!(bus.count(opcodes::RDP), 1);
    }

    #[test]
    fn test_identity_lost_after_flow() {
        let mut bus = MockFlash::new(0x375216);
        bus.wake_jedec = Some(0xFFFFFF);
        let id = FlashIdentity::from_raw(0x375216);
        assert_eq!(sequencer(5).run_startup(&mut bus, id), StartupOutcome::Failed);
    }

    #[test]
    fn test_sfdp_probe_finds_quirk_vendor() {
        let mut bus = MockFlash::new(0xFFFFFF);
        bus.sfdp[sfdp::VENDOR_ID_ADDR as usize] = 0x37;
        bus.wake_jedec = Some(0x375216);
        let seq = VendorStartupSequencer::new(StartupConfig {
            ready_poll: PollConfig::new(3, 0),
            sfdp_vendor_probe: true,
        });
        let outcome = seq.run_startup(&mut bus, FlashIdentity::from_raw(0xFFFFFF));
        assert_eq!(outcome, StartupOutcome::Succeeded);
        assert_eq!(bus.opcodes()[0], opcodes::RDSFDP);
    }

    #[test]
    fn test_sfdp_probe_other_vendor_skips() {
        let mut bus = MockFlash::new(0xEF4016);
        let seq = VendorStartupSequencer::new(StartupConfig {
            ready_poll: PollConfig::new(3, 0),
            sfdp_vendor_probe: true,
        });
        let outcome = seq.run_startup(&mut bus, FlashIdentity::from_raw(0xEF4016));
        assert_eq!(outcome, StartupOutcome::Skipped);
        assert_eq!(bus.opcodes(), std::vec![opcodes::RDSFDP]);
    }

    #[test]
    fn test_quirk_lookup_is_pure() {
        assert_eq!(find_quirk(STARTUP_QUIRKS, 0x37).map(|q| q.manufacturer_id), Some(0x37));
        assert_eq!(find_quirk(STARTUP_QUIRKS, 0x20).map(|q| q.vendor), Some("XMC"));
        assert!(find_quirk(STARTUP_QUIRKS, 0xEF).is_none());
    }
}
