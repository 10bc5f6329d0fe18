//! OV7670 register addresses and the register programs for each mode. Every program is
//! order-significant: later writes assume earlier ones have latched, and some registers are
//! written more than once on purpose.

use crate::frame::{PixelFormat, Resolution};

/// Device address is 0x42, however the I2C driver will left-shift the provided address by 1
pub const OV7670_ADDRESS: u8 = 0x21;

/// Expected product ID
pub const OV7670_PID: u8 = 0x76;

/// Expected version
pub const OV7670_VER: u8 = 0x73;

/// Device register addresses.
pub struct Register;

impl Register {
    // Internal clock prescaler
    pub const CLKRC: u8 = 0x11;

    // Common control 7: reset and output format
    pub const COM_CNTRL_07: u8 = 0x12;

    // Product ID registers
    pub const PROD_ID: u8 = 0x0A;
    pub const PROD_VER: u8 = 0x0B;
}

/// Writing this to `COM_CNTRL_07` resets every register to its default.
pub const RESET: (u8, u8) = (Register::COM_CNTRL_07, 0x80);

/// Time the sensor needs to come back after `RESET`.
pub const RESET_SETTLE_MS: u16 = 100;

/// Base mode applied once after reset.
pub const BASE_MODE: [(u8, u8); 15] = [
    (0x3A, 0x04),
    // Fast AGC/AEC, AGC/AEC off while the rest settles
    (0x13, 0xC0),
    (0x00, 0x00),
    (0x10, 0x00),
    (0x0D, 0x40),
    (0x14, 0x18),
    // AGC/AEC stable operating region
    (0x24, 0x95),
    (0x25, 0x33),
    // AGC and AEC on
    (0x13, 0xC5),
    (0x6A, 0x40),
    // Blue and red channel gain
    (0x01, 0x40),
    (0x02, 0x60),
    // AGC, AWB and AEC on
    (0x13, 0xC7),
    (0x41, 0x08),
    // PCLK does not toggle during horizontal blank
    (0x15, 0x20),
];

const GREYSCALE: [(u8, u8); 6] = [
    (0x12, 0x00),
    (0x8C, 0x00),
    (0x04, 0x00),
    (0x40, 0xC0),
    (0x14, 0x1A),
    (0x3D, 0x40),
];

const RGB565: [(u8, u8); 12] = [
    // RGB output, RGB565 with full output range
    (0x12, 0x04),
    (0x8C, 0x00),
    (0x04, 0x00),
    (0x40, 0xD0),
    (0x14, 0x6A),
    // Colour matrix
    (0x4F, 0xB3),
    (0x50, 0xB3),
    (0x51, 0x00),
    (0x52, 0x3D),
    (0x53, 0xA7),
    (0x54, 0xE4),
    (0x3D, 0x40),
];

const BAYER: [(u8, u8); 4] = [
    (0x12, 0x01),
    (0x3D, 0x08),
    (0x41, 0x3D),
    (0x76, 0xE1),
];

const VGA: [(u8, u8); 7] = [
    (0x0C, 0x00),
    (0x32, 0xF6),
    (0x17, 0x13),
    (0x18, 0x01),
    (0x19, 0x02),
    (0x1A, 0x7A),
    (0x03, 0x0A),
];

const QVGA: [(u8, u8); 10] = [
    // Scaling enabled, PCLK divided by 2
    (0x0C, 0x04),
    (0x3E, 0x19),
    (0x72, 0x11),
    (0x73, 0xF1),
    // Window
    (0x17, 0x16),
    (0x18, 0x04),
    (0x32, 0xA4),
    (0x19, 0x02),
    (0x1A, 0x7A),
    (0x03, 0x0A),
];

const QQVGA: [(u8, u8); 10] = [
    // Window
    (0x19, 0x00),
    (0x1A, 0x7A),
    (0x03, 0x00),
    (0x17, 0x16),
    (0x18, 0x05),
    (0x32, 0x32),
    // Scaling enabled, PCLK divided by 4
    (0x0C, 0x04),
    (0x3E, 0x1A),
    (0x72, 0x22),
    (0x73, 0xF2),
];

/// Register program selecting `format`.
pub fn format_sequence(format: PixelFormat) -> &'static [(u8, u8)] {
    match format {
        PixelFormat::Greyscale => &GREYSCALE,
        PixelFormat::Rgb565 => &RGB565,
        PixelFormat::Bayer => &BAYER,
    }
}

/// Register program selecting `resolution`.
pub fn resolution_sequence(resolution: Resolution) -> &'static [(u8, u8)] {
    match resolution {
        Resolution::Vga => &VGA,
        Resolution::Qvga => &QVGA,
        Resolution::Qqvga => &QQVGA,
    }
}
