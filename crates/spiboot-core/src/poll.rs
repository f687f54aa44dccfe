//! Attempt-bounded polling
//!
//! No timer service exists this early in boot, so every wait is a loop with
//! an attempt ceiling and a fixed delay between attempts. The delay comes
//! from [`SpiBus::delay_us`], which lets tests poll with zero delay.

use crate::bus::SpiBus;
use crate::error::Result;

/// Ceiling and spacing for a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Maximum number of times the condition is checked
    pub max_attempts: u32,
    /// Delay between two consecutive checks, in microseconds
    pub delay_us: u32,
}

impl PollConfig {
    /// Create a poll configuration
    pub const fn new(max_attempts: u32, delay_us: u32) -> Self {
        Self {
            max_attempts,
            delay_us,
        }
    }

    /// Status register write: 5-200ms typical, polled every 1ms up to 500ms
    pub const STATUS_WRITE: Self = Self::new(500, 1_000);

    /// Return a copy whose delay is at least `min_delay_us`
    pub const fn with_min_delay(self, min_delay_us: u32) -> Self {
        let delay_us = if self.delay_us < min_delay_us {
            min_delay_us
        } else {
            self.delay_us
        };
        Self::new(self.max_attempts, delay_us)
    }

    /// Poll `done` until it returns `true` or the attempts run out
    ///
    /// Returns `Ok(true)` when the condition settled, `Ok(false)` when the
    /// ceiling was reached. Errors from `done` abort the loop.
    pub fn poll<B, F>(&self, bus: &mut B, mut done: F) -> Result<bool>
    where
        B: SpiBus + ?Sized,
        F: FnMut(&mut B) -> Result<bool>,
    {
        for attempt in 0..self.max_attempts {
            if done(bus)? {
                log::trace!("poll settled after {} attempt(s)", attempt + 1);
                return Ok(true);
            }
            if attempt + 1 < self.max_attempts && self.delay_us > 0 {
                bus.delay_us(self.delay_us);
            }
        }
        Ok(false)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::STATUS_WRITE
    }
}
