//! spiboot-dummy - In-memory SPI NOR flash emulator
//!
//! [`EmulatedFlash`] answers the commands the bring-up driver issues (RDID,
//! status register access, RDSFDP, power-down and the vendor startup
//! handshake) so the whole sequence can run without hardware. Faults a real
//! board shows are configurable: a part that never settles after wake-up, a
//! different identity after the handshake, status bits that ignore writes.
//!
//! Erase and program commands are accepted but not backed by an array. They
//! panic while the part's startup state is ambiguous, which turns "erased a
//! flash that still needed a reset" into a test failure.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

#[cfg(feature = "alloc")]
use spiboot_core::bus::{SpiBus, SpiFeatures};
#[cfg(feature = "alloc")]
use spiboot_core::error::{Error, Result};
use spiboot_core::sfdp::SFDP_SIGNATURE;
#[cfg(feature = "alloc")]
use spiboot_core::spi::{opcodes, SpiCommand};

/// Size of the image returned by [`build_sfdp_image`]
pub const SFDP_IMAGE_LEN: usize = 0x80;

/// Offset of the Basic Flash Parameter Table in the generated image
const BFPT_OFFSET: usize = 0x30;
/// Offset of the vendor table in the generated image
const VENDOR_TABLE_OFFSET: usize = 0x70;

/// Build a minimal JESD216 SFDP image
///
/// Two parameter headers: the JEDEC Basic Flash Parameter Table and a
/// one-dword vendor table whose ID is `manufacturer_id`. Bytes outside the
/// tables read as 0xFF.
pub fn build_sfdp_image(manufacturer_id: u8) -> [u8; SFDP_IMAGE_LEN] {
    let mut image = [0xFF; SFDP_IMAGE_LEN];

    // Header: signature, rev 1.6, two parameter headers
    image[0..4].copy_from_slice(&SFDP_SIGNATURE.to_le_bytes());
    image[4..8].copy_from_slice(&[0x06, 0x01, 0x01, 0xFF]);

    // BFPT: ID 0xFF00, rev 1.6, 16 dwords
    image[0x08..0x10].copy_from_slice(&[0x00, 0x06, 0x01, 0x10, BFPT_OFFSET as u8, 0x00, 0x00, 0xFF]);

    // Vendor table: ID LSB is the manufacturer
    image[0x10..0x18].copy_from_slice(&[
        manufacturer_id,
        0x00,
        0x01,
        0x01,
        VENDOR_TABLE_OFFSET as u8,
        0x00,
        0x00,
        0x01,
    ]);

    // BFPT dword 1: 4K erase with 0x20, dword 2: 128 Mbit
    image[BFPT_OFFSET..BFPT_OFFSET + 4].copy_from_slice(&0xFFF1_20E5u32.to_le_bytes());
    image[BFPT_OFFSET + 4..BFPT_OFFSET + 8].copy_from_slice(&0x07FF_FFFFu32.to_le_bytes());

    image
}

/// Configuration for the emulated flash
#[cfg(feature = "alloc")]
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// RDID value at power-on
    pub jedec_id: u32,
    /// Initial status register 1
    pub sr1: u8,
    /// Initial status register 2
    pub sr2: u8,
    /// SR1 (low byte) and SR2 (high byte) bits that ignore writes
    pub stuck_bits: u16,
    /// The part needs the vendor startup handshake before erase/program
    pub needs_startup: bool,
    /// Status reads that still report WIP after release from power-down;
    /// `None` never settles
    pub ready_after: Option<u32>,
    /// RDID value after release from power-down
    pub wake_jedec_id: Option<u32>,
    /// Vendor ID stored in the SFDP image, defaults to the RDID manufacturer
    pub sfdp_vendor: Option<u8>,
    /// Transfer widths reported by the emulated host bus
    pub features: SpiFeatures,
}

#[cfg(feature = "alloc")]
impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            jedec_id: 0xEF4018, // W25Q128JV
            sr1: 0,
            sr2: 0,
            stuck_bits: 0,
            needs_startup: false,
            ready_after: Some(0),
            wake_jedec_id: None,
            sfdp_vendor: None,
            features: SpiFeatures::QUAD,
        }
    }
}

#[cfg(feature = "alloc")]
impl EmulatorConfig {
    /// Configuration for a part with the given RDID value
    pub fn with_jedec_id(jedec_id: u32) -> Self {
        Self {
            jedec_id,
            ..Self::default()
        }
    }
}

/// Power state of the emulated part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    /// Accepting commands
    Active,
    /// Deep power-down, left with RDP
    DeepPowerDown,
    /// Ultra deep power-down, left with the exit sequence then RDP
    UltraDeepPowerDown,
}

/// Where the part is in its vendor startup handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupState {
    /// The part has no startup requirement
    NotRequired,
    /// The handshake has not run yet
    Pending,
    /// Released from power-down, WIP not yet seen clear
    Settling,
    /// Handshake finished and the part reported ready
    Ready,
}

impl StartupState {
    /// True while erase/program would hit a part in an undefined state
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, StartupState::Pending | StartupState::Settling)
    }
}

/// One recorded SPI transaction
#[cfg(feature = "alloc")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Opcode, address and dummy bytes as they went on the wire
    pub header: Vec<u8>,
    /// Bytes written after the header
    pub write: Vec<u8>,
    /// Bytes returned to the host
    pub read: Vec<u8>,
}

#[cfg(feature = "alloc")]
impl Transaction {
    /// The opcode byte
    pub fn opcode(&self) -> u8 {
        self.header[0]
    }
}

/// Largest header the emulator decodes
#[cfg(feature = "alloc")]
const MAX_HEADER_LEN: usize = 8;

/// Status reads that report WIP after a status register write
#[cfg(feature = "alloc")]
const WRITE_BUSY_READS: u32 = 1;

/// SR1 block protect bits checked before accepting erase/program
#[cfg(feature = "alloc")]
const SR1_BP_MASK: u8 = opcodes::SR1_BP0 | opcodes::SR1_BP1 | opcodes::SR1_BP2;

/// Emulated SPI NOR flash
#[cfg(feature = "alloc")]
pub struct EmulatedFlash {
    config: EmulatorConfig,
    jedec_id: u32,
    sr1: u8,
    sr2: u8,
    write_enabled: bool,
    busy_reads: u32,
    power: PowerState,
    startup: StartupState,
    sfdp: [u8; SFDP_IMAGE_LEN],
    transactions: Vec<Transaction>,
    counts: [u32; 256],
    delays: Vec<u32>,
    accepted_writes: u32,
}

#[cfg(feature = "alloc")]
impl EmulatedFlash {
    /// Create an emulated part in its power-on state
    pub fn new(config: EmulatorConfig) -> Self {
        let vendor = config.sfdp_vendor.unwrap_or((config.jedec_id >> 16) as u8);
        Self {
            jedec_id: config.jedec_id & 0x00FF_FFFF,
            sr1: config.sr1,
            sr2: config.sr2,
            write_enabled: false,
            busy_reads: 0,
            power: PowerState::Active,
            startup: if config.needs_startup {
                StartupState::Pending
            } else {
                StartupState::NotRequired
            },
            sfdp: build_sfdp_image(vendor),
            transactions: Vec::new(),
            counts: [0; 256],
            delays: Vec::new(),
            accepted_writes: 0,
            config,
        }
    }

    /// Create a plain part with the given RDID value
    pub fn with_jedec_id(jedec_id: u32) -> Self {
        Self::new(EmulatorConfig::with_jedec_id(jedec_id))
    }

    /// Current status register 1
    pub fn status1(&self) -> u8 {
        self.sr1
    }

    /// Current status register 2
    pub fn status2(&self) -> u8 {
        self.sr2
    }

    /// Current power state
    pub fn power_state(&self) -> PowerState {
        self.power
    }

    /// Current startup state
    pub fn startup_state(&self) -> StartupState {
        self.startup
    }

    /// Every transaction seen so far
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Opcodes seen so far, in order
    pub fn opcodes(&self) -> Vec<u8> {
        self.transactions.iter().map(Transaction::opcode).collect()
    }

    /// How many times `opcode` was sent
    pub fn count(&self, opcode: u8) -> u32 {
        self.counts[opcode as usize]
    }

    /// Number of status register writes (WRSR and WRSR2)
    pub fn status_writes(&self) -> u32 {
        self.count(opcodes::WRSR) + self.count(opcodes::WRSR2)
    }

    /// Delays requested by the driver, in microseconds
    pub fn delays(&self) -> &[u32] {
        &self.delays
    }

    /// Erase/program commands the part actually carried out
    pub fn accepted_writes(&self) -> u32 {
        self.accepted_writes
    }

    /// Forget recorded transactions and counters
    pub fn clear_log(&mut self) {
        self.transactions.clear();
        self.counts = [0; 256];
        self.delays.clear();
    }

    fn store_status(&mut self, sr1: Option<u8>, sr2: Option<u8>) {
        if !self.write_enabled {
            log::debug!("status write without WEL ignored");
            return;
        }
        if let Some(value) = sr1 {
            let stuck = self.config.stuck_bits as u8;
            self.sr1 = (self.sr1 & stuck) | (value & !stuck);
        }
        if let Some(value) = sr2 {
            let stuck = (self.config.stuck_bits >> 8) as u8;
            self.sr2 = (self.sr2 & stuck) | (value & !stuck);
        }
        self.write_enabled = false;
        self.busy_reads = self.busy_reads.max(WRITE_BUSY_READS);
    }

    fn read_status1(&mut self) -> u8 {
        let mut value = self.sr1;
        if self.write_enabled {
            value |= opcodes::SR1_WEL;
        }
        if self.busy_reads > 0 {
            value |= opcodes::SR1_WIP;
            if self.busy_reads != u32::MAX {
                self.busy_reads -= 1;
            }
        } else if self.startup == StartupState::Settling {
            log::debug!("emulated part ready after startup handshake");
            self.startup = StartupState::Ready;
        }
        value
    }

    fn release_power_down(&mut self) {
        self.power = PowerState::Active;
        if let Some(jedec_id) = self.config.wake_jedec_id {
            self.jedec_id = jedec_id & 0x00FF_FFFF;
        }
        if self.startup.is_ambiguous() {
            self.startup = StartupState::Settling;
            self.busy_reads = self.config.ready_after.unwrap_or(u32::MAX);
        }
    }

    fn erase_or_program(&mut self, opcode: u8) {
        if self.startup.is_ambiguous() {
            panic!(
                "opcode 0x{:02X} issued while startup state is {:?}",
                opcode, self.startup
            );
        }
        if self.write_enabled && self.busy_reads == 0 && self.sr1 & SR1_BP_MASK == 0 {
            self.accepted_writes += 1;
        }
        self.write_enabled = false;
    }

    fn handle(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        match self.power {
            PowerState::Active => {}
            PowerState::DeepPowerDown => {
                match cmd.opcode {
                    opcodes::RDP => self.release_power_down(),
                    opcodes::UDPD => self.power = PowerState::UltraDeepPowerDown,
                    _ => cmd.read_buf.fill(0xFF),
                }
                return Ok(());
            }
            PowerState::UltraDeepPowerDown => {
                match cmd.opcode {
                    opcodes::EXIT_UDPD => self.power = PowerState::DeepPowerDown,
                    _ => cmd.read_buf.fill(0xFF),
                }
                return Ok(());
            }
        }

        match cmd.opcode {
            opcodes::RDID => {
                let id = self.jedec_id.to_be_bytes();
                for (i, b) in cmd.read_buf.iter_mut().enumerate() {
                    *b = id.get(i + 1).copied().unwrap_or(0xFF);
                }
            }

            opcodes::RDSR => {
                let value = self.read_status1();
                cmd.read_buf.fill(value);
            }
            opcodes::RDSR2 => cmd.read_buf.fill(self.sr2),

            opcodes::WRSR => {
                let sr1 = cmd.write_data.first().copied();
                let sr2 = cmd.write_data.get(1).copied();
                self.store_status(sr1, sr2);
            }
            opcodes::WRSR2 => {
                let sr2 = cmd.write_data.first().copied();
                self.store_status(None, sr2);
            }

            opcodes::WREN => self.write_enabled = true,
            opcodes::WRDI => self.write_enabled = false,

            opcodes::RDSFDP => {
                let addr = cmd.address.unwrap_or(0) as usize;
                for (i, b) in cmd.read_buf.iter_mut().enumerate() {
                    *b = self.sfdp.get(addr + i).copied().unwrap_or(0xFF);
                }
            }

            opcodes::DP => self.power = PowerState::DeepPowerDown,
            opcodes::UDPD => self.power = PowerState::UltraDeepPowerDown,
            // Exit UDPD is a no-op for an active part
            opcodes::EXIT_UDPD => {}
            opcodes::RDP => self.release_power_down(),

            opcodes::EQIO => log::debug!("emulated part switched to quad I/O"),

            opcodes::PP | opcodes::SE_20 | opcodes::BE_D8 | opcodes::CE_C7 => {
                self.erase_or_program(cmd.opcode)
            }

            _ => return Err(Error::OpcodeNotSupported),
        }
        Ok(())
    }
}

#[cfg(feature = "alloc")]
impl SpiBus for EmulatedFlash {
    fn features(&self) -> SpiFeatures {
        self.config.features
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        let header_len = cmd.header_len();
        if header_len > MAX_HEADER_LEN {
            return Err(Error::SpiTransferFailed);
        }
        let mut header = [0u8; MAX_HEADER_LEN];
        cmd.encode_header(&mut header);

        self.counts[cmd.opcode as usize] += 1;
        let result = self.handle(cmd);

        log::trace!(
            "emulated flash: {:02X?} w{:02X?} r{:02X?}",
            &header[..header_len],
            cmd.write_data,
            cmd.read_buf
        );
        self.transactions.push(Transaction {
            header: header[..header_len].to_vec(),
            write: cmd.write_data.to_vec(),
            read: cmd.read_buf.to_vec(),
        });
        result
    }

    fn delay_us(&mut self, us: u32) {
        // Time is not modelled, the delay is only recorded
        self.delays.push(us);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spiboot_core::identity::read_identity;
    use spiboot_core::protocol;
    use spiboot_core::sfdp;
    use spiboot_core::spi::SpiCommand;

    fn xmc_config() -> EmulatorConfig {
        EmulatorConfig {
            needs_startup: true,
            ready_after: Some(2),
            ..EmulatorConfig::with_jedec_id(0x375216)
        }
    }

    #[test]
    fn test_read_jedec_id() {
        let mut flash = EmulatedFlash::new(EmulatorConfig::default());
        let id = read_identity(&mut flash).unwrap();
        assert_eq!(id.manufacturer_id(), 0xEF);
        assert_eq!(id.device_id(), 0x4018);
        assert_eq!(flash.count(opcodes::RDID), 1);
    }

    #[test]
    fn test_transaction_header_on_wire() {
        let mut flash = EmulatedFlash::new(EmulatorConfig::default());
        sfdp::read_sfdp(&mut flash, 0x10, 1).unwrap();
        let t = &flash.transactions()[0];
        assert_eq!(t.header, [opcodes::RDSFDP, 0x00, 0x00, 0x10, 0xFF]);
        assert_eq!(t.read, [0xEF]);
    }

    #[test]
    fn test_sfdp_image_parses() {
        let mut flash = EmulatedFlash::with_jedec_id(0xC84017);
        let header = sfdp::read_header(&mut flash).unwrap();
        assert_eq!(header.num_param_headers(), 2);
        assert_eq!(sfdp::read_vendor_id(&mut flash).unwrap(), 0xC8);
        assert_eq!(sfdp::read_sfdp_u32(&mut flash, 0x34, 4).unwrap(), 0x07FF_FFFF);
    }

    #[test]
    fn test_powered_down_reads_float() {
        let mut flash = EmulatedFlash::new(EmulatorConfig::default());
        protocol::deep_power_down(&mut flash).unwrap();
        assert_eq!(flash.power_state(), PowerState::DeepPowerDown);
        assert!(read_identity(&mut flash).unwrap().is_ambiguous());

        protocol::release_power_down(&mut flash).unwrap();
        assert_eq!(flash.power_state(), PowerState::Active);
        assert_eq!(read_identity(&mut flash).unwrap().raw(), 0xEF4018);
    }

    #[test]
    fn test_ultra_deep_needs_exit_then_release() {
        let mut flash = EmulatedFlash::new(xmc_config());
        protocol::deep_power_down(&mut flash).unwrap();
        protocol::send_command(&mut flash, opcodes::UDPD).unwrap();
        assert_eq!(flash.power_state(), PowerState::UltraDeepPowerDown);

        // RDP alone does not wake from UDPD
        protocol::release_power_down(&mut flash).unwrap();
        assert_eq!(flash.power_state(), PowerState::UltraDeepPowerDown);

        protocol::send_command(&mut flash, opcodes::EXIT_UDPD).unwrap();
        protocol::release_power_down(&mut flash).unwrap();
        assert_eq!(flash.power_state(), PowerState::Active);
        assert_eq!(flash.startup_state(), StartupState::Settling);
    }

    #[test]
    fn test_handshake_settles_after_configured_reads() {
        let mut flash = EmulatedFlash::new(xmc_config());
        protocol::release_power_down(&mut flash).unwrap();
        assert!(protocol::is_busy(&mut flash).unwrap());
        assert!(protocol::is_busy(&mut flash).unwrap());
        assert!(!protocol::is_busy(&mut flash).unwrap());
        assert_eq!(flash.startup_state(), StartupState::Ready);
    }

    #[test]
    fn test_wake_identity_override() {
        let mut flash = EmulatedFlash::new(EmulatorConfig {
            wake_jedec_id: Some(0x204016),
            ..xmc_config()
        });
        protocol::release_power_down(&mut flash).unwrap();
        assert_eq!(read_identity(&mut flash).unwrap().raw(), 0x204016);
    }

    #[test]
    #[should_panic(expected = "startup state")]
    fn test_erase_before_startup_panics() {
        let mut flash = EmulatedFlash::new(xmc_config());
        protocol::write_enable(&mut flash).unwrap();
        let mut cmd = SpiCommand::simple(opcodes::CE_C7);
        let _ = flash.execute(&mut cmd);
    }

    #[test]
    fn test_erase_honours_protection() {
        let mut flash = EmulatedFlash::new(EmulatorConfig {
            sr1: opcodes::SR1_BP1,
            ..EmulatorConfig::default()
        });
        protocol::write_enable(&mut flash).unwrap();
        flash.execute(&mut SpiCommand::simple(opcodes::CE_C7)).unwrap();
        assert_eq!(flash.accepted_writes(), 0);

        protocol::write_enable(&mut flash).unwrap();
        flash
            .execute(&mut SpiCommand::write_reg(opcodes::WRSR, &[0x00]))
            .unwrap();
        protocol::wait_ready(&mut flash, Default::default()).unwrap();
        protocol::write_enable(&mut flash).unwrap();
        flash.execute(&mut SpiCommand::simple(opcodes::CE_C7)).unwrap();
        assert_eq!(flash.accepted_writes(), 1);
    }

    #[test]
    fn test_stuck_bits_ignore_writes() {
        let mut flash = EmulatedFlash::new(EmulatorConfig {
            sr2: 0x40,
            stuck_bits: 0x4000,
            ..EmulatorConfig::default()
        });
        protocol::write_enable(&mut flash).unwrap();
        flash
            .execute(&mut SpiCommand::write_reg(opcodes::WRSR, &[0x00, opcodes::SR2_QE]))
            .unwrap();
        assert_eq!(flash.status2(), 0x40 | opcodes::SR2_QE);
    }

    #[test]
    fn test_unknown_opcode_rejected() {
        let mut flash = EmulatedFlash::new(EmulatorConfig::default());
        assert_eq!(
            flash.execute(&mut SpiCommand::simple(0x66)),
            Err(Error::OpcodeNotSupported)
        );
        assert_eq!(flash.count(0x66), 1);
    }
}
