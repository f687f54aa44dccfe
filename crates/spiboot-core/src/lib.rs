//! spiboot-core - Boot-time SPI NOR flash bring-up
//!
//! This crate implements the one-shot sequence a first-stage bootloader runs
//! against the SPI NOR flash that holds the firmware image, before caches,
//! heap or scheduler exist:
//!
//! 1. identify the part (JEDEC RDID),
//! 2. run any vendor startup handshake that must complete before the first
//!    erase/program,
//! 3. clear status register write protection,
//! 4. optionally set the part's Quad Enable bit so the host can fetch code
//!    over four data lines.
//!
//! Everything is synchronous and blocking. All waiting is attempt-bounded
//! polling driven by the bus-provided delay, since no timer service can be
//! assumed this early.
//!
//! # Features
//!
//! - `std` - Implement `std::error::Error` for the error types
//!
//! # Example
//!
//! ```ignore
//! use spiboot_core::bringup::{BootConfig, Bringup, BringupError, QuadReadMode};
//!
//! fn boot<B: spiboot_core::bus::SpiBus>(bus: &mut B) {
//!     let config = BootConfig {
//!         quad: Some(QuadReadMode::Qio),
//!         ..BootConfig::default()
//!     };
//!     match Bringup::new(config).run(bus) {
//!         Ok(report) => bus_switch_to(report.io_mode),
//!         Err(BringupError::ResetRequired { .. }) => trigger_device_reset(),
//!         Err(e) => log::error!("flash bring-up failed: {}", e),
//!     }
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod bringup;
pub mod bus;
pub mod error;
pub mod identity;
pub mod poll;
pub mod protocol;
pub mod quad;
pub mod sfdp;
pub mod spi;
pub mod startup;
pub mod unlock;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use identity::FlashIdentity;
