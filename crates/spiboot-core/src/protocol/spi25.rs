//! SPI25 protocol implementation
//!
//! This module implements the JEDEC command sequences used during
//! bring-up: status register access, write enable latch handling, busy
//! polling and power-down control.
//!
//! Every status register write follows the same shape:
//! WREN, write, wait for WIP to clear, WRDI. The trailing WRDI guarantees
//! the write enable latch is off again before control returns, even on
//! parts that leave WEL set after a status write.

use crate::bus::SpiBus;
use crate::error::{Error, Result};
use crate::poll::PollConfig;
use crate::spi::{opcodes, SpiCommand};

/// Read the status register 1
pub fn read_status1<B: SpiBus + ?Sized>(bus: &mut B) -> Result<u8> {
    let mut buf = [0u8; 1];
    let mut cmd = SpiCommand::read_reg(opcodes::RDSR, &mut buf);
    bus.execute(&mut cmd)?;
    Ok(buf[0])
}

/// Read the status register 2
pub fn read_status2<B: SpiBus + ?Sized>(bus: &mut B) -> Result<u8> {
    let mut buf = [0u8; 1];
    let mut cmd = SpiCommand::read_reg(opcodes::RDSR2, &mut buf);
    bus.execute(&mut cmd)?;
    Ok(buf[0])
}

/// Read SR1 and SR2 as one 16-bit value (SR2 in the high byte)
pub fn read_status12<B: SpiBus + ?Sized>(bus: &mut B) -> Result<u16> {
    let sr1 = read_status1(bus)?;
    let sr2 = read_status2(bus)?;
    Ok(u16::from_le_bytes([sr1, sr2]))
}

/// Send a command that has no address and no data phase
pub fn send_command<B: SpiBus + ?Sized>(bus: &mut B, opcode: u8) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcode);
    bus.execute(&mut cmd)
}

/// Send the Write Enable command
pub fn write_enable<B: SpiBus + ?Sized>(bus: &mut B) -> Result<()> {
    send_command(bus, opcodes::WREN)
}

/// Send the Write Disable command
pub fn write_disable<B: SpiBus + ?Sized>(bus: &mut B) -> Result<()> {
    send_command(bus, opcodes::WRDI)
}

/// Check if a write or erase operation is in progress
pub fn is_busy<B: SpiBus + ?Sized>(bus: &mut B) -> Result<bool> {
    let status = read_status1(bus)?;
    Ok(status & opcodes::SR1_WIP != 0)
}

/// Wait for the WIP (Write In Progress) bit to clear
///
/// Returns `Error::Timeout` if the bit is still set after
/// `poll.max_attempts` reads.
pub fn wait_ready<B: SpiBus + ?Sized>(bus: &mut B, poll: PollConfig) -> Result<()> {
    if poll.poll(bus, |bus| Ok(!is_busy(bus)?))? {
        Ok(())
    } else {
        Err(Error::Timeout)
    }
}

fn write_status_raw<B: SpiBus + ?Sized>(
    bus: &mut B,
    opcode: u8,
    data: &[u8],
    poll: PollConfig,
) -> Result<()> {
    wait_ready(bus, poll)?;
    write_enable(bus)?;
    let mut cmd = SpiCommand::write_reg(opcode, data);
    bus.execute(&mut cmd)?;
    wait_ready(bus, poll)?;
    write_disable(bus)
}

/// Write the status register 1
pub fn write_status1<B: SpiBus + ?Sized>(bus: &mut B, value: u8, poll: PollConfig) -> Result<()> {
    write_status_raw(bus, opcodes::WRSR, &[value], poll)
}

/// Write status registers 1 and 2 together with the two-byte WRSR form
pub fn write_status12<B: SpiBus + ?Sized>(
    bus: &mut B,
    value: u16,
    poll: PollConfig,
) -> Result<()> {
    write_status_raw(bus, opcodes::WRSR, &value.to_le_bytes(), poll)
}

/// Write SR2 directly using opcode 0x31
pub fn write_status2<B: SpiBus + ?Sized>(bus: &mut B, value: u8, poll: PollConfig) -> Result<()> {
    write_status_raw(bus, opcodes::WRSR2, &[value], poll)
}

/// Enter Deep Power Down
pub fn deep_power_down<B: SpiBus + ?Sized>(bus: &mut B) -> Result<()> {
    send_command(bus, opcodes::DP)
}

/// Release from Deep Power Down
pub fn release_power_down<B: SpiBus + ?Sized>(bus: &mut B) -> Result<()> {
    send_command(bus, opcodes::RDP)
}
