//! Build-time camera configuration.
//!
//! The capture mode is picked with cargo features (`qvga`, `vga`, `rgb565`, `bayer`), which the
//! build script turns into `resolution` and `pixel_format` cfg values. Without any of them the
//! camera captures QQVGA greyscale.

use crate::frame::{frame_capacity, PixelFormat, Resolution};

#[cfg(resolution = "qqvga")]
pub const RESOLUTION: Resolution = Resolution::Qqvga;
#[cfg(resolution = "qvga")]
pub const RESOLUTION: Resolution = Resolution::Qvga;
#[cfg(resolution = "vga")]
pub const RESOLUTION: Resolution = Resolution::Vga;

#[cfg(pixel_format = "greyscale")]
pub const PIXEL_FORMAT: PixelFormat = PixelFormat::Greyscale;
#[cfg(pixel_format = "rgb565")]
pub const PIXEL_FORMAT: PixelFormat = PixelFormat::Rgb565;
#[cfg(pixel_format = "bayer")]
pub const PIXEL_FORMAT: PixelFormat = PixelFormat::Bayer;

/// Master clock fed to the sensor's XCLK input.
pub const MCLK_HZ: u32 = 43_200_000;

/// Sensor internal clock prescaler. Polling the pixel bus from GPIO is much slower than the
/// sensor's native PCLK.
pub const PCLK_DIVIDER: u8 = 32;

/// Check VSYNC before every row and report frames that end early.
pub const SAFE_MODE: bool = true;

/// Bytes sent to the storage co-processor between pauses.
pub const STORAGE_CHUNK_SIZE: usize = 512;

/// Pause before each chunk, long enough for the co-processor to flush a chunk to the card.
pub const STORAGE_PAUSE_US: u32 = 1_000;

/// Largest frame the device may hold: QVGA RGB565 fits in internal SRAM, VGA does not.
#[cfg(not(feature = "large-frames"))]
pub const FRAME_MEMORY_CEILING: usize = frame_capacity(PixelFormat::Rgb565, Resolution::Qvga);
#[cfg(feature = "large-frames")]
pub const FRAME_MEMORY_CEILING: usize = usize::MAX;

/// Everything the application needs to bring the camera up, with the build-time values as
/// defaults.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CameraConfig {
    pub format: PixelFormat,
    pub resolution: Resolution,
    pub mclk_hz: u32,
    pub pclk_divider: u8,
    pub safe_mode: bool,
    pub frame_memory_ceiling: usize,
    pub storage_chunk_size: usize,
    pub storage_pause_us: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        CameraConfig {
            format: PIXEL_FORMAT,
            resolution: RESOLUTION,
            mclk_hz: MCLK_HZ,
            pclk_divider: PCLK_DIVIDER,
            safe_mode: SAFE_MODE,
            frame_memory_ceiling: FRAME_MEMORY_CEILING,
            storage_chunk_size: STORAGE_CHUNK_SIZE,
            storage_pause_us: STORAGE_PAUSE_US,
        }
    }
}

impl CameraConfig {
    /// Bytes needed to hold one frame in the configured mode.
    pub fn frame_size(&self) -> usize {
        frame_capacity(self.format, self.resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_fits_under_ceiling() {
        let config = CameraConfig::default();
        if config.resolution != Resolution::Vga {
            assert!(config.frame_size() <= config.frame_memory_ceiling);
        }
    }

    #[cfg(not(feature = "large-frames"))]
    #[test]
    fn ceiling_is_qvga_rgb565() {
        assert_eq!(FRAME_MEMORY_CEILING, 153_600);
    }

    #[test]
    fn master_clock_in_sensor_range() {
        use crate::ov7670::clock::{XCLK_MAX_HZ, XCLK_MIN_HZ};
        assert!((XCLK_MIN_HZ..=XCLK_MAX_HZ).contains(&MCLK_HZ));
        assert!((1..=64).contains(&PCLK_DIVIDER));
    }
}
