//! Basic blocking delay
//!
//! This module provides a basic asm-based blocking delay.
use embedded_hal_1::delay::DelayNs;

/// A basic delay implementation.
#[derive(Copy, Clone)]
pub struct AsmDelay {
    frequency_mhz: u32,
}

impl AsmDelay {
    /// Create a new delay.
    ///
    /// # Args
    /// * `freq` - The CPU core frequency in Hz.
    pub fn new(freq: u32) -> AsmDelay {
        AsmDelay {
            frequency_mhz: freq / 1_000_000,
        }
    }
}

impl DelayNs for AsmDelay {
    fn delay_ns(&mut self, ns: u32) {
        // Round up so that sub-cycle delays such as the AD7980 tCONV never come out short.
        let cycles = (ns as u64 * self.frequency_mhz as u64).div_ceil(1_000);
        cortex_m::asm::delay(cycles as u32)
    }
}
