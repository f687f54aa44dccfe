//! SFDP (Serial Flash Discoverable Parameters) access
//!
//! SFDP data lives in a separate address space of the flash part and is
//! read with the RDSFDP command (0x5A): a 3-byte address, 8 dummy clocks,
//! then data. During bring-up only a few bytes at a time are needed, so a
//! single read is capped at four bytes and returned without allocation.
//!
//! The driver does not know how large the part's table is. Reads past its
//! end return whatever the part drives (usually 0xFF) and are not errors.

use crate::bus::SpiBus;
use crate::error::{Error, Result};
use crate::spi::{opcodes, AddressWidth, SpiCommand};

/// SFDP signature magic value ("SFDP" in little-endian)
pub const SFDP_SIGNATURE: u32 = 0x50444653;

/// Largest number of bytes a single [`read_sfdp`] may return
pub const MAX_SFDP_READ: usize = 4;

/// Address of the second parameter header's ID LSB, which holds the JEDEC
/// manufacturer ID of the vendor-specific table
pub const VENDOR_ID_ADDR: u32 = 0x10;

/// Bytes returned by an SFDP read, in the order the part sent them
pub type SfdpBytes = heapless::Vec<u8, MAX_SFDP_READ>;

/// A validated SFDP read request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SfdpQuery {
    address: u32,
    length: u8,
}

impl SfdpQuery {
    /// Validate a request
    ///
    /// Fails with `Error::InvalidArgument` if `length` exceeds
    /// [`MAX_SFDP_READ`] or `address` does not fit in 24 bits.
    pub fn new(address: u32, length: u8) -> Result<Self> {
        if length as usize > MAX_SFDP_READ || address > AddressWidth::ThreeByte.max_address() {
            return Err(Error::InvalidArgument);
        }
        Ok(Self { address, length })
    }

    /// Execute the request on `bus`
    ///
    /// A zero-length query returns an empty result without touching the bus.
    pub fn read<B: SpiBus + ?Sized>(&self, bus: &mut B) -> Result<SfdpBytes> {
        let mut out = SfdpBytes::new();
        if self.length == 0 {
            return Ok(out);
        }

        let mut buf = [0u8; MAX_SFDP_READ];
        let data = &mut buf[..self.length as usize];
        let mut cmd = SpiCommand::read_3b(opcodes::RDSFDP, self.address, data)
            .with_dummy_cycles(opcodes::RDSFDP_DUMMY_CYCLES);
        bus.execute(&mut cmd)?;

        out.extend_from_slice(&buf[..self.length as usize])
            .map_err(|_| Error::InvalidArgument)?;
        log::trace!("SFDP[0x{:06X}] = {:02X?}", self.address, out.as_slice());
        Ok(out)
    }
}

/// Read `length` (0..=4) bytes of SFDP data starting at `address`
pub fn read_sfdp<B: SpiBus + ?Sized>(bus: &mut B, address: u32, length: u8) -> Result<SfdpBytes> {
    SfdpQuery::new(address, length)?.read(bus)
}

/// Interpret up to four SFDP bytes as a little-endian integer
pub fn to_u32_le(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(MAX_SFDP_READ)
        .enumerate()
        .fold(0, |acc, (i, &b)| acc | (b as u32) << (8 * i))
}

/// Read `length` (0..=4) SFDP bytes and return them as a little-endian value
pub fn read_sfdp_u32<B: SpiBus + ?Sized>(bus: &mut B, address: u32, length: u8) -> Result<u32> {
    let bytes = read_sfdp(bus, address, length)?;
    Ok(to_u32_le(&bytes))
}

/// SFDP revision number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SfdpRevision {
    /// Major revision number
    pub major: u8,
    /// Minor revision number
    pub minor: u8,
}

/// SFDP header (first 8 bytes of the SFDP space)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SfdpHeader {
    /// SFDP signature (should be 0x50444653)
    pub signature: u32,
    /// SFDP revision
    pub revision: SfdpRevision,
    /// Number of parameter headers (0-based, so actual count is nph + 1)
    pub nph: u8,
}

impl SfdpHeader {
    /// Parse SFDP header from raw bytes
    pub fn parse(data: &[u8; 8]) -> Self {
        Self {
            signature: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            revision: SfdpRevision {
                minor: data[4],
                major: data[5],
            },
            nph: data[6],
        }
    }

    /// Check if the signature is valid
    pub fn is_valid(&self) -> bool {
        self.signature == SFDP_SIGNATURE
    }

    /// Get the number of parameter headers
    pub fn num_param_headers(&self) -> usize {
        (self.nph as usize) + 1
    }
}

/// Read and validate the SFDP header
///
/// Returns `Error::SfdpInvalid` if the signature is wrong or the major
/// revision is not 1.
pub fn read_header<B: SpiBus + ?Sized>(bus: &mut B) -> Result<SfdpHeader> {
    let mut raw = [0u8; 8];
    raw[..4].copy_from_slice(&read_sfdp(bus, 0x00, 4)?);
    raw[4..].copy_from_slice(&read_sfdp(bus, 0x04, 4)?);

    let header = SfdpHeader::parse(&raw);
    if !header.is_valid() {
        log::debug!("SFDP signature invalid: 0x{:08X}", header.signature);
        return Err(Error::SfdpInvalid);
    }
    if header.revision.major != 1 {
        log::debug!("SFDP major version {} not supported", header.revision.major);
        return Err(Error::SfdpInvalid);
    }
    Ok(header)
}

/// Read the manufacturer ID recorded in the SFDP parameter headers
pub fn read_vendor_id<B: SpiBus + ?Sized>(bus: &mut B) -> Result<u8> {
    Ok(read_sfdp_u32(bus, VENDOR_ID_ADDR, 1)? as u8)
}
