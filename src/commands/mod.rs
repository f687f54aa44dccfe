//! CLI command implementations
//!
//! Each command builds an `EmulatedFlash` from the shared emulator options
//! and drives the core driver against it.

pub mod boot;
pub mod id;
pub mod sfdp;
pub mod vendors;
