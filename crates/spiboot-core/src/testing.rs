//! Recording bus double for unit tests

use std::vec::Vec;

use crate::bus::{SpiBus, SpiFeatures};
use crate::error::{Error, Result};
use crate::spi::{opcodes, SpiCommand};

/// Minimal flash model that records every opcode it sees
pub struct MockFlash {
    pub jedec: u32,
    pub sr1: u8,
    pub sr2: u8,
    /// Status reads left that report WIP; `u32::MAX` never clears
    pub busy_reads: u32,
    /// Value loaded into `busy_reads` when the part is released from power-down
    pub wake_busy_reads: u32,
    /// Identity reported after release from power-down
    pub wake_jedec: Option<u32>,
    /// SR1 (low byte) / SR2 (high byte) bits that ignore writes
    pub stuck_mask: u16,
    pub sfdp: [u8; 32],
    pub features: SpiFeatures,
    pub wel: bool,
    pub log: Vec<u8>,
    pub delays: Vec<u32>,
}

impl MockFlash {
    pub fn new(jedec: u32) -> Self {
        let mut sfdp = [0xFF; 32];
        sfdp[..8].copy_from_slice(&[0x53, 0x46, 0x44, 0x50, 0x06, 0x01, 0x01, 0xFF]);
        sfdp[0x10] = (jedec >> 16) as u8;
        Self {
            jedec,
            sr1: 0,
            sr2: 0,
            busy_reads: 0,
            wake_busy_reads: 0,
            wake_jedec: None,
            stuck_mask: 0,
            sfdp,
            features: SpiFeatures::QUAD,
            wel: false,
            log: Vec::new(),
            delays: Vec::new(),
        }
    }

    pub fn opcodes(&self) -> Vec<u8> {
        self.log.clone()
    }

    pub fn count(&self, opcode: u8) -> usize {
        self.log.iter().filter(|&&op| op == opcode).count()
    }

    pub fn status_writes(&self) -> usize {
        self.count(opcodes::WRSR) + self.count(opcodes::WRSR2)
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    fn store_sr1(&mut self, value: u8) {
        let stuck = self.stuck_mask as u8;
        self.sr1 = (self.sr1 & stuck) | (value & !stuck);
    }

    fn store_sr2(&mut self, value: u8) {
        let stuck = (self.stuck_mask >> 8) as u8;
        self.sr2 = (self.sr2 & stuck) | (value & !stuck);
    }
}

impl SpiBus for MockFlash {
    fn features(&self) -> SpiFeatures {
        self.features
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        self.log.push(cmd.opcode);
        match cmd.opcode {
            opcodes::RDID => {
                cmd.read_buf.copy_from_slice(&self.jedec.to_be_bytes()[1..4]);
            }
            opcodes::RDSR => {
                let mut value = self.sr1;
                if self.wel {
                    value |= opcodes::SR1_WEL;
                }
                if self.busy_reads > 0 {
                    value |= opcodes::SR1_WIP;
                    if self.busy_reads != u32::MAX {
                        self.busy_reads -= 1;
                    }
                }
                cmd.read_buf[0] = value;
            }
            opcodes::RDSR2 => cmd.read_buf[0] = self.sr2,
            opcodes::WREN => self.wel = true,
            opcodes::WRDI => self.wel = false,
            opcodes::WRSR => {
                if self.wel {
                    self.store_sr1(cmd.write_data[0]);
                    if let Some(&sr2) = cmd.write_data.get(1) {
                        self.store_sr2(sr2);
                    }
                }
            }
            opcodes::WRSR2 => {
                if self.wel {
                    self.store_sr2(cmd.write_data[0]);
                }
            }
            opcodes::RDSFDP => {
                let addr = cmd.address.unwrap_or(0) as usize;
                for (i, b) in cmd.read_buf.iter_mut().enumerate() {
                    *b = self.sfdp.get(addr + i).copied().unwrap_or(0xFF);
                }
            }
            opcodes::RDP => {
                self.busy_reads = self.wake_busy_reads;
                if let Some(jedec) = self.wake_jedec {
                    self.jedec = jedec;
                }
            }
            opcodes::DP | opcodes::UDPD | opcodes::EXIT_UDPD | opcodes::EQIO => {}
            _ => return Err(Error::OpcodeNotSupported),
        }
        Ok(())
    }

    fn delay_us(&mut self, us: u32) {
        self.delays.push(us);
    }
}
