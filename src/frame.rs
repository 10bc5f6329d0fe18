//! Fixed-size frame storage, sized from the sensor's pixel format and resolution.
//!
//! Frames never allocate. The caller hands in a memory region (a static buffer, a region of
//! external RAM, ...) and the frame takes exactly the number of bytes the mode needs from it.

use core::fmt;

use crate::ring::{Consumer, Producer, RingBuffer};

/// Pixel output formats supported by the driver.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum PixelFormat {
    /// Luma only, one byte per sample.
    Greyscale = 0,
    /// Packed 16-bit colour, two bytes per sample.
    Rgb565 = 1,
    /// Raw Bayer pattern, one byte per sample.
    Bayer = 2,
}

/// Output resolution tiers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Resolution {
    /// 640x480
    Vga = 0,
    /// 320x240
    Qvga = 1,
    /// 160x120
    Qqvga = 2,
}

/// Pixel format and resolution the sensor is programmed for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Mode {
    pub format: PixelFormat,
    pub resolution: Resolution,
}

/// A raw mode code that does not name any `PixelFormat` or `Resolution`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("unrecognised mode code {0}")]
pub struct UnknownMode(pub u8);

/// Frame allocation errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum FrameError {
    /// The frame does not fit in the memory ceiling or in the region provided.
    #[error("frame needs {required} bytes but only {available} are available")]
    Capacity { required: usize, available: usize },
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 3] = [PixelFormat::Greyscale, PixelFormat::Rgb565, PixelFormat::Bayer];

    /// Number of bytes the sensor emits per pixel in this format.
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            PixelFormat::Greyscale | PixelFormat::Bayer => 1,
            PixelFormat::Rgb565 => 2,
        }
    }
}

impl Resolution {
    pub const ALL: [Resolution; 3] = [Resolution::Vga, Resolution::Qvga, Resolution::Qqvga];

    /// Frame dimensions as `(width, height)` in pixels.
    pub const fn dimensions(self) -> (u16, u16) {
        match self {
            Resolution::Vga => (640, 480),
            Resolution::Qvga => (320, 240),
            Resolution::Qqvga => (160, 120),
        }
    }
}

impl TryFrom<u8> for PixelFormat {
    type Error = UnknownMode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(PixelFormat::Greyscale),
            1 => Ok(PixelFormat::Rgb565),
            2 => Ok(PixelFormat::Bayer),
            _ => Err(UnknownMode(code)),
        }
    }
}

impl TryFrom<u8> for Resolution {
    type Error = UnknownMode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Resolution::Vga),
            1 => Ok(Resolution::Qvga),
            2 => Ok(Resolution::Qqvga),
            _ => Err(UnknownMode(code)),
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelFormat::Greyscale => "GREYSCALE",
            PixelFormat::Rgb565 => "RGB565",
            PixelFormat::Bayer => "BAYER",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resolution::Vga => "VGA",
            Resolution::Qvga => "QVGA",
            Resolution::Qqvga => "QQVGA",
        };
        f.write_str(name)
    }
}

impl Mode {
    pub const fn new(format: PixelFormat, resolution: Resolution) -> Self {
        Mode { format, resolution }
    }

    /// Number of bytes in one frame captured in this mode.
    pub const fn frame_size(self) -> usize {
        frame_capacity(self.format, self.resolution)
    }
}

/// Dimensions for a raw resolution code. Unknown codes fall back to the largest tier.
pub fn size_for_raw(code: u8) -> (u16, u16) {
    Resolution::try_from(code)
        .unwrap_or(Resolution::Vga)
        .dimensions()
}

/// Bytes per sample for a raw pixel format code. Unknown codes are treated as single-byte.
pub fn bytes_per_sample_raw(code: u8) -> usize {
    PixelFormat::try_from(code).map_or(1, PixelFormat::bytes_per_sample)
}

/// Number of bytes needed to store one frame.
pub const fn frame_capacity(format: PixelFormat, resolution: Resolution) -> usize {
    let (width, height) = resolution.dimensions();
    (width as usize) * (height as usize) * format.bytes_per_sample()
}

/// Anything the capture loop can append sampled bytes to.
pub trait FrameSink {
    /// Called once before the first byte of a capture.
    fn begin(&mut self) {}

    /// Append one sampled byte. Returns `false` when the sink has no room left.
    fn push(&mut self, byte: u8) -> bool;

    /// The mode this sink was sized for, if it was sized at all.
    fn mode(&self) -> Option<Mode> {
        None
    }
}

/// Creates frames, refusing any that exceed the device memory ceiling.
#[derive(Clone, Copy, Debug)]
pub struct FrameBuilder {
    ceiling: usize,
}

impl Default for FrameBuilder {
    fn default() -> Self {
        FrameBuilder::new(crate::config::FRAME_MEMORY_CEILING)
    }
}

impl FrameBuilder {
    /// `ceiling` is the largest frame, in bytes, this device may hold.
    pub const fn new(ceiling: usize) -> Self {
        FrameBuilder { ceiling }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Create a random-access frame backed by the start of `memory`.
    pub fn contiguous<'a>(
        &self,
        format: PixelFormat,
        resolution: Resolution,
        memory: &'a mut [u8],
    ) -> Result<Frame<'a>, FrameError> {
        let mode = Mode::new(format, resolution);
        let store = self.reserve(mode, memory)?;
        trace!("frame: {} {} contiguous, {} bytes", format, resolution, store.len());

        Ok(Frame {
            mode,
            store,
            filled: 0,
        })
    }

    /// Create a sequential frame backed by a ring buffer over the start of `memory`, so that a
    /// second context can drain it while capture is still filling it.
    pub fn streaming<'a>(
        &self,
        format: PixelFormat,
        resolution: Resolution,
        memory: &'a mut [u8],
    ) -> Result<StreamingFrame<'a>, FrameError> {
        let mode = Mode::new(format, resolution);
        let store = self.reserve(mode, memory)?;
        trace!("frame: {} {} streaming, {} bytes", format, resolution, store.len());

        Ok(StreamingFrame {
            mode,
            ring: RingBuffer::new(store),
        })
    }

    fn reserve<'a>(&self, mode: Mode, memory: &'a mut [u8]) -> Result<&'a mut [u8], FrameError> {
        let required = mode.frame_size();
        let available = core::cmp::min(self.ceiling, memory.len());
        if required > available {
            return Err(FrameError::Capacity {
                required,
                available,
            });
        }
        Ok(&mut memory[..required])
    }
}

/// A frame stored as one flat byte array.
pub struct Frame<'a> {
    mode: Mode,

    /// Exactly `mode.frame_size()` bytes.
    store: &'a mut [u8],

    /// Number of leading bytes written by the last capture.
    filled: usize,
}

impl<'a> Frame<'a> {
    pub fn format(&self) -> PixelFormat {
        self.mode.format
    }

    pub fn resolution(&self) -> Resolution {
        self.mode.resolution
    }

    pub fn capacity(&self) -> usize {
        self.store.len()
    }

    /// The whole store. Bytes past `valid_len` are left over from earlier captures.
    pub fn as_bytes(&self) -> &[u8] {
        self.store
    }

    /// Bytes written by the last capture. After a corrupted capture this is the prefix made
    /// of the completed rows.
    pub fn valid_bytes(&self) -> &[u8] {
        &self.store[..self.filled]
    }

    pub fn valid_len(&self) -> usize {
        self.filled
    }

    pub fn is_complete(&self) -> bool {
        self.filled == self.store.len()
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        self.store.get(index).copied()
    }
}

impl<'a> FrameSink for Frame<'a> {
    fn begin(&mut self) {
        self.filled = 0;
    }

    #[inline(always)]
    fn push(&mut self, byte: u8) -> bool {
        match self.store.get_mut(self.filled) {
            Some(slot) => {
                *slot = byte;
                self.filled += 1;
                true
            }
            None => false,
        }
    }

    fn mode(&self) -> Option<Mode> {
        Some(self.mode)
    }
}

/// A frame stored in a ring buffer for incremental draining.
pub struct StreamingFrame<'a> {
    mode: Mode,
    ring: RingBuffer<'a, u8>,
}

impl<'a> StreamingFrame<'a> {
    pub fn format(&self) -> PixelFormat {
        self.mode.format
    }

    pub fn resolution(&self) -> Resolution {
        self.mode.resolution
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Number of captured bytes not yet drained.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Take the oldest captured byte.
    pub fn pop(&mut self) -> Option<u8> {
        self.ring.pop()
    }

    /// Split into a capture-side sink and a drain-side consumer.
    pub fn split<'r>(&'r mut self) -> (FrameProducer<'r, 'a>, Consumer<'r, 'a, u8>) {
        let mode = self.mode;
        let (producer, consumer) = self.ring.split();
        (FrameProducer { mode, producer }, consumer)
    }
}

impl<'a> FrameSink for StreamingFrame<'a> {
    #[inline(always)]
    fn push(&mut self, byte: u8) -> bool {
        self.ring.push(byte)
    }

    fn mode(&self) -> Option<Mode> {
        Some(self.mode)
    }
}

/// Capture-side half of a split `StreamingFrame`.
pub struct FrameProducer<'r, 'a> {
    mode: Mode,
    producer: Producer<'r, 'a, u8>,
}

impl<'r, 'a> FrameSink for FrameProducer<'r, 'a> {
    #[inline(always)]
    fn push(&mut self, byte: u8) -> bool {
        self.producer.push(byte)
    }

    fn mode(&self) -> Option<Mode> {
        Some(self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_matches_mode_for_every_pair() {
        let builder = FrameBuilder::new(usize::MAX);
        let mut memory = vec![0u8; 640 * 480 * 2];

        for &format in PixelFormat::ALL.iter() {
            for &resolution in Resolution::ALL.iter() {
                let (w, h) = resolution.dimensions();
                let expected = w as usize * h as usize * format.bytes_per_sample();

                let frame = builder.contiguous(format, resolution, &mut memory).unwrap();
                assert_eq!(frame.capacity(), expected);

                let frame = builder.streaming(format, resolution, &mut memory).unwrap();
                assert_eq!(frame.capacity(), expected);
            }
        }
    }

    #[test]
    fn raw_codes_fall_back_to_defaults() {
        assert_eq!(size_for_raw(2), (160, 120));
        assert_eq!(size_for_raw(1), (320, 240));
        assert_eq!(size_for_raw(42), (640, 480));
        assert_eq!(bytes_per_sample_raw(1), 2);
        assert_eq!(bytes_per_sample_raw(0), 1);
        assert_eq!(bytes_per_sample_raw(200), 1);
    }

    #[test]
    fn mode_codes_round_trip() {
        for &format in PixelFormat::ALL.iter() {
            assert_eq!(PixelFormat::try_from(format as u8), Ok(format));
        }
        assert_eq!(PixelFormat::try_from(3), Err(UnknownMode(3)));
        assert_eq!(Resolution::try_from(9), Err(UnknownMode(9)));
    }

    #[test]
    fn ceiling_guards_largest_tier() {
        let builder = FrameBuilder::new(160 * 120 * 2);
        let mut memory = vec![0u8; 640 * 480];

        let err = builder
            .contiguous(PixelFormat::Greyscale, Resolution::Vga, &mut memory)
            .err();
        assert_eq!(
            err,
            Some(FrameError::Capacity {
                required: 640 * 480,
                available: 160 * 120 * 2,
            })
        );
        assert!(builder
            .contiguous(PixelFormat::Rgb565, Resolution::Qqvga, &mut memory)
            .is_ok());
    }

    #[test]
    fn region_smaller_than_frame_is_rejected() {
        let builder = FrameBuilder::new(usize::MAX);
        let mut memory = [0u8; 100];

        assert!(matches!(
            builder.streaming(PixelFormat::Greyscale, Resolution::Qqvga, &mut memory),
            Err(FrameError::Capacity {
                required: 19_200,
                available: 100
            })
        ));
    }

    #[test]
    fn contiguous_frame_tracks_valid_prefix() {
        let builder = FrameBuilder::new(usize::MAX);
        let mut memory = vec![0xAAu8; 160 * 120];
        let mut frame = builder
            .contiguous(PixelFormat::Greyscale, Resolution::Qqvga, &mut memory)
            .unwrap();

        frame.begin();
        assert!(frame.push(1));
        assert!(frame.push(2));
        assert_eq!(frame.valid_bytes(), &[1, 2]);
        assert_eq!(frame.get(2), Some(0xAA));
        assert!(!frame.is_complete());

        frame.begin();
        assert_eq!(frame.valid_len(), 0);
        for _ in 0..frame.capacity() {
            assert!(frame.push(0));
        }
        assert!(frame.is_complete());
        assert!(!frame.push(0));
    }

    #[test]
    fn streaming_frame_drains_in_order() {
        let builder = FrameBuilder::new(usize::MAX);
        let mut memory = vec![0u8; 160 * 120];
        let mut frame = builder
            .streaming(PixelFormat::Bayer, Resolution::Qqvga, &mut memory)
            .unwrap();

        {
            let (mut producer, mut consumer) = frame.split();
            assert_eq!(
                producer.mode(),
                Some(Mode::new(PixelFormat::Bayer, Resolution::Qqvga))
            );
            for b in 0..10 {
                assert!(producer.push(b));
            }
            assert_eq!(consumer.pop(), Some(0));
        }

        assert_eq!(frame.len(), 9);
        assert_eq!(frame.pop(), Some(1));
    }
}
