//! Protocol implementations
//!
//! This module contains the SPI25 command sequences the bring-up
//! components are built from.

mod spi25;

pub use spi25::*;
