//! SPI command structure

use super::AddressWidth;

/// A single SPI transaction
///
/// Designed to avoid allocation - uses slices for data.
/// The lifetime parameter `'a` ties the command to the buffers it references.
/// Every bring-up command is issued in single I/O (1-1-1) mode.
pub struct SpiCommand<'a> {
    /// The opcode byte
    pub opcode: u8,

    /// Address (if any)
    pub address: Option<u32>,

    /// Address width
    pub address_width: AddressWidth,

    /// Number of dummy cycles after address
    pub dummy_cycles: u8,

    /// Data to write after opcode/address/dummy
    pub write_data: &'a [u8],

    /// Buffer to read into (mutable)
    pub read_buf: &'a mut [u8],
}

impl<'a> SpiCommand<'a> {
    /// Create a simple command with no address or data (e.g., WREN, DP)
    pub fn simple(opcode: u8) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            dummy_cycles: 0,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Create a read register command with no address (e.g., RDSR, RDID)
    pub fn read_reg(opcode: u8, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            dummy_cycles: 0,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Create a write register command with no address (e.g., WRSR)
    pub fn write_reg(opcode: u8, data: &'a [u8]) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            dummy_cycles: 0,
            write_data: data,
            read_buf: &mut [],
        }
    }

    /// Create a read command with 3-byte address (e.g., RDSFDP)
    pub fn read_3b(opcode: u8, addr: u32, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: AddressWidth::ThreeByte,
            dummy_cycles: 0,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Set the number of dummy cycles
    pub fn with_dummy_cycles(mut self, cycles: u8) -> Self {
        self.dummy_cycles = cycles;
        self
    }

    /// Length of opcode + address + dummy bytes
    pub fn header_len(&self) -> usize {
        1 + self.address_width.bytes() as usize + (self.dummy_cycles as usize) / 8
    }

    /// Encode opcode, address and dummy bytes into `buf`
    ///
    /// `buf` must be at least [`header_len`](Self::header_len) bytes. Dummy
    /// bytes are sent as 0xFF.
    pub fn encode_header(&self, buf: &mut [u8]) {
        buf[0] = self.opcode;
        let addr_len = self.address_width.bytes() as usize;
        if let Some(addr) = self.address {
            self.address_width.encode(addr, &mut buf[1..1 + addr_len]);
        }
        for b in &mut buf[1 + addr_len..self.header_len()] {
            *b = 0xFF;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spi::opcodes;

    #[test]
    fn test_sfdp_header_encoding() {
        let mut buf = [0u8; 4];
        let cmd = SpiCommand::read_3b(opcodes::RDSFDP, 0x10, &mut buf).with_dummy_cycles(8);
        assert_eq!(cmd.header_len(), 5);

        let mut header = [0u8; 5];
        cmd.encode_header(&mut header);
        assert_eq!(header, [0x5A, 0x00, 0x00, 0x10, 0xFF]);
    }

    #[test]
    fn test_simple_header_len() {
        let cmd = SpiCommand::simple(opcodes::WREN);
        assert_eq!(cmd.header_len(), 1);
    }
}
