//! Status register write protection unlock
//!
//! Block-protect and status-register-protect bits left set by the factory
//! or a previous image make the part silently ignore erase/program
//! commands. Bring-up clears them once, before anything tries to write.
//!
//! Vendors disagree on where those bits live and how the registers must be
//! written back, so the default procedure picks an [`UnlockLayout`] from the
//! identity. Boards with stranger parts supply their own
//! [`WriteProtectUnlocker`] instead.

use core::fmt;

use crate::bus::SpiBus;
use crate::error::Error;
use crate::identity::{read_identity, FlashIdentity};
use crate::poll::PollConfig;
use crate::protocol;
use crate::spi::opcodes;

/// SR1 bits that reflect an operation in flight rather than configuration
const SR1_VOLATILE: u8 = opcodes::SR1_WIP | opcodes::SR1_WEL;

/// Protect bits of ISSI and MXIC parts: BP0-BP3 and SRWD
pub const ISSI_MXIC_PROTECT_MASK: u8 =
    opcodes::SR1_SRP0 | opcodes::SR1_TB | opcodes::SR1_BP2 | opcodes::SR1_BP1 | opcodes::SR1_BP0;

/// Writable protect bits of SR1: BP0-BP2, TB, SEC and SRP0
pub const SR1_PROTECT_MASK: u8 = !SR1_VOLATILE;

/// Writable protect bits of SR2: SRP1 and CMP
pub const SR2_PROTECT_MASK: u8 = opcodes::SR2_SRP1 | opcodes::SR2_CMP;

/// Quad Enable bit position when SR1 and SR2 are treated as one 16-bit register
pub const QE_16BIT: u16 = (opcodes::SR2_QE as u16) << 8;

/// Protect bits of SR1 (low byte) and SR2 (high byte)
pub const PROTECT_16BIT: u16 = SR1_PROTECT_MASK as u16 | (SR2_PROTECT_MASK as u16) << 8;

/// Bits checked after a 16-bit write. Lock and suspend bits in SR2 are
/// read-only or one-time programmable and never take part.
const VERIFY_16BIT: u16 = PROTECT_16BIT | QE_16BIT;

/// Unlock failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockError {
    /// Read-back after the write did not show the requested value
    ///
    /// Only protect and QE bits are compared. For 16-bit layouts SR2 is in
    /// the high byte.
    VerifyMismatch {
        /// Value written
        expected: u16,
        /// Compared bits as read back
        found: u16,
    },
    /// SPI communication error
    Bus(Error),
}

impl From<Error> for UnlockError {
    fn from(e: Error) -> Self {
        UnlockError::Bus(e)
    }
}

impl fmt::Display for UnlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnlockError::VerifyMismatch { expected, found } => write!(
                f,
                "write protect unlock verify failed: wrote 0x{:04X}, read 0x{:04X}",
                expected, found
            ),
            UnlockError::Bus(e) => write!(f, "SPI error during unlock: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for UnlockError {}

/// How a vendor's protect bits are laid out and written back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockLayout {
    /// SR1 only; clear the given mask and keep every other bit (ISSI, MXIC)
    Sr1Mask(u8),
    /// Clear SR1 entirely, keep only QE in SR2, write SR2 with 0x31 (GigaDevice Q)
    Sr1ClearSr2KeepQe,
    /// SR1+SR2 as one 16-bit register written with two-byte WRSR; keep only QE
    Sr12KeepQe,
}

impl UnlockLayout {
    /// Pick the layout for an identity
    pub fn for_identity(identity: FlashIdentity) -> Self {
        match identity.manufacturer_id() {
            0x9D | 0xC2 => UnlockLayout::Sr1Mask(ISSI_MXIC_PROTECT_MASK),
            0xC8 if matches!(identity.memory_type(), 0x40 | 0x60) => {
                UnlockLayout::Sr1ClearSr2KeepQe
            }
            _ => UnlockLayout::Sr12KeepQe,
        }
    }
}

/// Write protection unlock procedure
///
/// The boot orchestrator is constructed with one of these. Implementations
/// must be idempotent: unlocking an already unlocked part succeeds without
/// writing.
pub trait WriteProtectUnlocker {
    /// Clear write protection on the part identified by `identity`
    fn unlock<B: SpiBus + ?Sized>(
        &self,
        bus: &mut B,
        identity: FlashIdentity,
    ) -> Result<(), UnlockError>;
}

/// Vendor-table driven unlock used when the board supplies none
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUnlocker {
    /// Busy polling used around status register writes
    pub poll: PollConfig,
}

impl DefaultUnlocker {
    /// Create an unlocker with the given busy-poll ceiling
    pub const fn new(poll: PollConfig) -> Self {
        Self { poll }
    }

    fn unlock_sr1_mask<B: SpiBus + ?Sized>(&self, bus: &mut B, mask: u8) -> Result<(), UnlockError> {
        let current = protocol::read_status1(bus)? & !SR1_VOLATILE;
        let target = current & !mask;
        if current == target {
            log::debug!("SR1 0x{:02X}: already unlocked", current);
            return Ok(());
        }

        log::debug!("SR1 0x{:02X} -> 0x{:02X}", current, target);
        protocol::write_status1(bus, target, self.poll)?;

        let found = protocol::read_status1(bus)? & !SR1_VOLATILE;
        if found != target {
            return Err(UnlockError::VerifyMismatch {
                expected: target as u16,
                found: found as u16,
            });
        }
        Ok(())
    }

    fn unlock_sr1_clear_sr2_keep_qe<B: SpiBus + ?Sized>(&self, bus: &mut B) -> Result<(), UnlockError> {
        let sr1 = protocol::read_status1(bus)? & SR1_PROTECT_MASK;
        let sr2 = protocol::read_status2(bus)?;
        let target_sr2 = sr2 & opcodes::SR2_QE;

        if sr1 == 0 && sr2 & SR2_PROTECT_MASK == 0 {
            log::debug!("SR1 0x00 SR2 0x{:02X}: already unlocked", sr2);
            return Ok(());
        }

        if sr1 != 0 {
            log::debug!("SR1 0x{:02X} -> 0x00", sr1);
            protocol::write_status1(bus, 0, self.poll)?;
        }
        if sr2 & SR2_PROTECT_MASK != 0 {
            log::debug!("SR2 0x{:02X} -> 0x{:02X}", sr2, target_sr2);
            protocol::write_status2(bus, target_sr2, self.poll)?;
        }

        let found_sr1 = protocol::read_status1(bus)? & SR1_PROTECT_MASK;
        let found_sr2 = protocol::read_status2(bus)? & (SR2_PROTECT_MASK | opcodes::SR2_QE);
        if found_sr1 != 0 || found_sr2 != target_sr2 {
            return Err(UnlockError::VerifyMismatch {
                expected: u16::from_le_bytes([0, target_sr2]),
                found: u16::from_le_bytes([found_sr1, found_sr2]),
            });
        }
        Ok(())
    }

    fn unlock_sr12_keep_qe<B: SpiBus + ?Sized>(&self, bus: &mut B) -> Result<(), UnlockError> {
        let current = protocol::read_status12(bus)? & !(SR1_VOLATILE as u16);
        if current & PROTECT_16BIT == 0 {
            log::debug!("SR1/SR2 0x{:04X}: already unlocked", current);
            return Ok(());
        }

        let target = current & QE_16BIT;
        log::debug!("SR1/SR2 0x{:04X} -> 0x{:04X}", current, target);
        protocol::write_status12(bus, target, self.poll)?;

        let found = protocol::read_status12(bus)? & VERIFY_16BIT;
        if found != target {
            return Err(UnlockError::VerifyMismatch {
                expected: target,
                found,
            });
        }
        Ok(())
    }
}

impl WriteProtectUnlocker for DefaultUnlocker {
    fn unlock<B: SpiBus + ?Sized>(
        &self,
        bus: &mut B,
        identity: FlashIdentity,
    ) -> Result<(), UnlockError> {
        protocol::wait_ready(bus, self.poll)?;

        match UnlockLayout::for_identity(identity) {
            UnlockLayout::Sr1Mask(mask) => self.unlock_sr1_mask(bus, mask),
            UnlockLayout::Sr1ClearSr2KeepQe => self.unlock_sr1_clear_sr2_keep_qe(bus),
            UnlockLayout::Sr12KeepQe => self.unlock_sr12_keep_qe(bus),
        }
    }
}

/// Identify the part and run the default unlock procedure on it
pub fn unlock<B: SpiBus + ?Sized>(bus: &mut B) -> Result<(), UnlockError> {
    let identity = read_identity(bus)?;
    DefaultUnlocker::default().unlock(bus, identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFlash;

    fn fast() -> DefaultUnlocker {
        DefaultUnlocker::new(PollConfig::new(4, 0))
    }

    #[test]
    fn test_layout_selection() {
        let layout = |raw| UnlockLayout::for_identity(FlashIdentity::from_raw(raw));
        assert_eq!(layout(0x9D4016), UnlockLayout::Sr1Mask(0xBC));
        assert_eq!(layout(0xC22016), UnlockLayout::Sr1Mask(0xBC));
        assert_eq!(layout(0xC84016), UnlockLayout::Sr1ClearSr2KeepQe);
        assert_eq!(layout(0xC86017), UnlockLayout::Sr1ClearSr2KeepQe);
        assert_eq!(layout(0xC82016), UnlockLayout::Sr12KeepQe);
        assert_eq!(layout(0xEF4016), UnlockLayout::Sr12KeepQe);
        assert_eq!(layout(0x204016), UnlockLayout::Sr12KeepQe);
    }

    #[test]
    fn test_already_unlocked_no_writes() {
        let mut bus = MockFlash::new(0xEF4016);
        bus.sr2 = opcodes::SR2_QE;
        let id = FlashIdentity::from_raw(bus.jedec);
        assert_eq!(fast().unlock(&mut bus, id), Ok(()));
        assert_eq!(bus.status_writes(), 0);
        assert_eq!(bus.count(opcodes::WREN), 0);
    }

    #[test]
    fn test_unlock_is_idempotent() {
        let mut bus = MockFlash::new(0xEF4016);
        bus.sr1 = opcodes::SR1_BP0 | opcodes::SR1_BP2 | opcodes::SR1_SRP0;
        bus.sr2 = opcodes::SR2_QE | opcodes::SR2_SRP1;
        let id = FlashIdentity::from_raw(bus.jedec);

        let first = fast().unlock(&mut bus, id);
        assert_eq!(first, Ok(()));
        assert_eq!(bus.status_writes(), 1);
        assert_eq!(bus.sr1, 0);
        assert_eq!(bus.sr2, opcodes::SR2_QE);

        bus.clear_log();
        let second = fast().unlock(&mut bus, id);
        assert_eq!(second, first);
        assert_eq!(bus.status_writes(), 0);
    }

    #[test]
    fn test_issi_keeps_qe_and_clears_mask() {
        let mut bus = MockFlash::new(0x9D6016);
        bus.sr1 = 0xFC; // QE (bit 6) + BP0-BP3 + SRWD
        let id = FlashIdentity::from_raw(bus.jedec);
        fast().unlock(&mut bus, id).unwrap();
        assert_eq!(bus.sr1, opcodes::SR1_SEC);
        assert_eq!(bus.count(opcodes::WRSR), 1);
        assert_eq!(bus.count(opcodes::WRSR2), 0);
    }

    #[test]
    fn test_gd_writes_sr2_separately() {
        let mut bus = MockFlash::new(0xC84016);
        bus.sr1 = opcodes::SR1_BP1;
        bus.sr2 = opcodes::SR2_QE | opcodes::SR2_CMP;
        let id = FlashIdentity::from_raw(bus.jedec);
        fast().unlock(&mut bus, id).unwrap();
        assert_eq!(bus.sr1, 0);
        assert_eq!(bus.sr2, opcodes::SR2_QE);
        assert_eq!(bus.count(opcodes::WRSR), 1);
        assert_eq!(bus.count(opcodes::WRSR2), 1);
    }

    #[test]
    fn test_locked_security_register_is_not_protection() {
        let mut bus = MockFlash::new(0xEF4016);
        bus.sr2 = opcodes::SR2_LB1;
        bus.stuck_mask = (opcodes::SR2_LB1 as u16) << 8;
        let id = FlashIdentity::from_raw(bus.jedec);

        assert_eq!(fast().unlock(&mut bus, id), Ok(()));
        assert_eq!(fast().unlock(&mut bus, id), Ok(()));
        assert_eq!(bus.status_writes(), 0);
        assert_eq!(bus.count(opcodes::WREN), 0);
    }

    #[test]
    fn test_unlock_ignores_lock_bit_on_verify() {
        let mut bus = MockFlash::new(0xEF4016);
        bus.sr1 = opcodes::SR1_BP0;
        bus.sr2 = opcodes::SR2_LB1 | opcodes::SR2_QE;
        bus.stuck_mask = (opcodes::SR2_LB1 as u16) << 8;
        let id = FlashIdentity::from_raw(bus.jedec);

        assert_eq!(fast().unlock(&mut bus, id), Ok(()));
        assert_eq!(bus.status_writes(), 1);
        assert_eq!(bus.sr1, 0);
        assert_eq!(bus.sr2, opcodes::SR2_LB1 | opcodes::SR2_QE);

        bus.clear_log();
        assert_eq!(fast().unlock(&mut bus, id), Ok(()));
        assert_eq!(bus.status_writes(), 0);
    }

    #[test]
    fn test_gd_lock_bit_needs_no_write() {
        let mut bus = MockFlash::new(0xC84016);
        bus.sr2 = opcodes::SR2_LB1 | opcodes::SR2_QE;
        bus.stuck_mask = (opcodes::SR2_LB1 as u16) << 8;
        let id = FlashIdentity::from_raw(bus.jedec);
        assert_eq!(fast().unlock(&mut bus, id), Ok(()));
        assert_eq!(bus.status_writes(), 0);
    }

    #[test]
    fn test_verify_mismatch_is_not_retried() {
        let mut bus = MockFlash::new(0xEF4016);
        bus.sr1 = opcodes::SR1_BP0;
        bus.stuck_mask = opcodes::SR1_BP0 as u16;
        let id = FlashIdentity::from_raw(bus.jedec);

        let err = fast().unlock(&mut bus, id).unwrap_err();
        assert_eq!(
            err,
            UnlockError::VerifyMismatch {
                expected: 0x0000,
                found: opcodes::SR1_BP0 as u16
            }
        );
        assert_eq!(bus.status_writes(), 1);
        assert!(!bus.wel);
    }

    #[test]
    fn test_free_function_identifies_first() {
        let mut bus = MockFlash::new(0xC22016);
        bus.sr1 = opcodes::SR1_BP0;
        unlock(&mut bus).unwrap();
        assert_eq!(bus.opcodes()[0], opcodes::RDID);
        assert_eq!(bus.sr1, 0);
    }

    #[test]
    fn test_busy_part_times_out() {
        let mut bus = MockFlash::new(0xEF4016);
        bus.busy_reads = u32::MAX;
        let id = FlashIdentity::from_raw(bus.jedec);
        assert_eq!(
            fast().unlock(&mut bus, id),
            Err(UnlockError::Bus(Error::Timeout))
        );
        assert_eq!(bus.status_writes(), 0);
    }
}
