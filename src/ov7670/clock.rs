//! Master clock (XCLK) generation for the OV7670.
//!
//! The sensor needs an external clock between 10 MHz and 48 MHz. On the STM32F7 this comes from
//! a microcontroller clock output (MCO) whose source is divided by an integer prescaler, so the
//! driver only has to pick a divider.

/// A clock output able to drive the sensor's XCLK input at a fixed 50% duty cycle.
pub trait MasterClock {
    /// Frequency feeding the output divider, in Hz.
    fn source_hz(&self) -> u32;

    /// Largest divider the output stage supports.
    fn max_divider(&self) -> u32;

    /// Start driving the output at `source_hz() / divider`.
    fn enable(&mut self, divider: u32);
}

/// Slowest XCLK the OV7670 accepts.
pub const XCLK_MIN_HZ: u32 = 10_000_000;

/// Fastest XCLK the OV7670 accepts.
pub const XCLK_MAX_HZ: u32 = 48_000_000;

/// Find the divider producing `target_hz` from `source_hz` to within 1%. Returns `None` if the
/// target is outside the sensor's XCLK range or no divider in `1..=max_divider` gets close.
pub fn divider_for(source_hz: u32, max_divider: u32, target_hz: u32) -> Option<u32> {
    if !(XCLK_MIN_HZ..=XCLK_MAX_HZ).contains(&target_hz) {
        return None;
    }

    // Round to the nearest divider
    let divider = (source_hz + target_hz / 2) / target_hz;
    if divider == 0 || divider > max_divider {
        return None;
    }

    let actual = source_hz / divider;
    let error = if actual > target_hz {
        actual - target_hz
    } else {
        target_hz - actual
    };
    if error > target_hz / 100 {
        return None;
    }

    Some(divider)
}
