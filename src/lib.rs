//! Bit-banged capture driver for the OV7670 image sensor.
//!
//! The sensor is configured over SCCB and its parallel pixel bus is sampled by polling GPIOs
//! in lock-step with the sensor's own pixel clock. Captured frames land in caller-provided,
//! fixed-size storage and can be packaged as 24-bit bitmaps on the fly.

#![cfg_attr(not(test), no_std)]

/// Print a diagnostic message over RTT when the `rttdebug` feature is enabled.
macro_rules! trace {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "rttdebug")]
        rtt_target::rprintln!($fmt $(, $arg)*);
        #[cfg(not(feature = "rttdebug"))]
        {
            $(let _ = &$arg;)*
        }
    }};
}

pub mod bmp;
pub mod config;
pub mod frame;
pub mod ring;
pub mod storage;

/// Drivers and helper functions for using the OV7670.
pub mod ov7670;

#[cfg(feature = "board")]
pub mod pins;
