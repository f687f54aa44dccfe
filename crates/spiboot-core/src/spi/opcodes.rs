//! SPI flash opcodes and status register bits used during bring-up
//!
//! Standard JEDEC opcodes plus the vendor commands the startup handshake
//! and quad-enable table refer to.

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required before any status register write
pub const WREN: u8 = 0x06;
/// Write Disable - clears WEL bit in status register
pub const WRDI: u8 = 0x04;

// ============================================================================
// Status register operations
// ============================================================================

/// Read Status Register 1
pub const RDSR: u8 = 0x05;
/// Read Status Register 2
pub const RDSR2: u8 = 0x35;
/// Write Status Register 1 (or SR1+SR2 with two data bytes)
pub const WRSR: u8 = 0x01;
/// Write Status Register 2
pub const WRSR2: u8 = 0x31;

// ============================================================================
// Identification
// ============================================================================

/// Read JEDEC ID (manufacturer + device ID)
pub const RDID: u8 = 0x9F;

// ============================================================================
// SFDP (Serial Flash Discoverable Parameters)
// ============================================================================

/// Read SFDP (JEDEC JESD216)
pub const RDSFDP: u8 = 0x5A;
/// Dummy clocks between the RDSFDP address and the first data byte
pub const RDSFDP_DUMMY_CYCLES: u8 = 8;

// ============================================================================
// Power management
// ============================================================================

/// Deep Power Down
pub const DP: u8 = 0xB9;
/// Release from Deep Power Down
pub const RDP: u8 = 0xAB;
/// Enter Ultra Deep Power Down (XMC)
pub const UDPD: u8 = 0x79;
/// Exit Ultra Deep Power Down (XMC)
pub const EXIT_UDPD: u8 = 0xFF;

// ============================================================================
// Quad mode
// ============================================================================

/// Enable Quad I/O (SST26)
pub const EQIO: u8 = 0x38;

// ============================================================================
// Erase / program (recognised by bus doubles only; bring-up never issues them)
// ============================================================================

/// Page Program
pub const PP: u8 = 0x02;
/// Sector Erase 4KB
pub const SE_20: u8 = 0x20;
/// Block Erase 64KB
pub const BE_D8: u8 = 0xD8;
/// Chip Erase
pub const CE_C7: u8 = 0xC7;

// ============================================================================
// Status register bit definitions
// ============================================================================

/// Status Register 1: Write In Progress / Busy
pub const SR1_WIP: u8 = 0x01;
/// Status Register 1: Write Enable Latch
pub const SR1_WEL: u8 = 0x02;
/// Status Register 1: Block Protect bit 0
pub const SR1_BP0: u8 = 0x04;
/// Status Register 1: Block Protect bit 1
pub const SR1_BP1: u8 = 0x08;
/// Status Register 1: Block Protect bit 2
pub const SR1_BP2: u8 = 0x10;
/// Status Register 1: Top/Bottom Protect (BP3 on ISSI/MXIC)
pub const SR1_TB: u8 = 0x20;
/// Status Register 1: Sector/Block Protect (QE on ISSI/MXIC)
pub const SR1_SEC: u8 = 0x40;
/// Status Register 1: Status Register Protect 0 / SRWD
pub const SR1_SRP0: u8 = 0x80;

/// Status Register 2: Status Register Protect 1
pub const SR2_SRP1: u8 = 0x01;
/// Status Register 2: Quad Enable
pub const SR2_QE: u8 = 0x02;
/// Status Register 2: Security Register Lock 1 (one-time programmable)
pub const SR2_LB1: u8 = 0x08;
/// Status Register 2: Complement Protect
pub const SR2_CMP: u8 = 0x40;
