//! Lazy 24-bit bitmap encoding of a captured frame.
//!
//! The stream walks a cursor over a fixed 54-byte header followed by the frame's pixel data and
//! hands out one small unit per call, so a frame can be written to slow storage without ever
//! holding the encoded image in memory. Rows are emitted in capture order.

use crate::frame::{Frame, PixelFormat, Resolution};

/// Size of the file header plus the BITMAPINFOHEADER.
pub const HEADER_LEN: usize = 54;

/// One encoded unit: a single header byte or one RGB triple.
pub type Unit = heapless::Vec<u8, 3>;

/// 160x120, 24 bpp.
pub const HEADER_QQVGA: [u8; HEADER_LEN] = [
    0x42, 0x4D, // "BM"
    0x36, 0xE1, 0x00, 0x00, // File size
    0x00, 0x00, 0x00, 0x00, // Reserved
    0x36, 0x00, 0x00, 0x00, // Pixel data offset
    0x28, 0x00, 0x00, 0x00, // Info header size
    0xA0, 0x00, 0x00, 0x00, // Width
    0x78, 0x00, 0x00, 0x00, // Height
    0x01, 0x00, // Planes
    0x18, 0x00, // Bits per pixel
    0x00, 0x00, 0x00, 0x00, // BI_RGB
    0x00, 0xE1, 0x00, 0x00, // Image size
    0x13, 0x0B, 0x00, 0x00, // 2835 px/m
    0x13, 0x0B, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, // Palette
    0x00, 0x00, 0x00, 0x00,
];

/// 320x240, 24 bpp.
pub const HEADER_QVGA: [u8; HEADER_LEN] = [
    0x42, 0x4D,
    0x36, 0x84, 0x03, 0x00,
    0x00, 0x00, 0x00, 0x00,
    0x36, 0x00, 0x00, 0x00,
    0x28, 0x00, 0x00, 0x00,
    0x40, 0x01, 0x00, 0x00,
    0xF0, 0x00, 0x00, 0x00,
    0x01, 0x00,
    0x18, 0x00,
    0x00, 0x00, 0x00, 0x00,
    0x00, 0x84, 0x03, 0x00,
    0x13, 0x0B, 0x00, 0x00,
    0x13, 0x0B, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00,
];

/// 640x480, 24 bpp.
pub const HEADER_VGA: [u8; HEADER_LEN] = [
    0x42, 0x4D,
    0x36, 0x10, 0x0E, 0x00,
    0x00, 0x00, 0x00, 0x00,
    0x36, 0x00, 0x00, 0x00,
    0x28, 0x00, 0x00, 0x00,
    0x80, 0x02, 0x00, 0x00,
    0xE0, 0x01, 0x00, 0x00,
    0x01, 0x00,
    0x18, 0x00,
    0x00, 0x00, 0x00, 0x00,
    0x00, 0x10, 0x0E, 0x00,
    0x13, 0x0B, 0x00, 0x00,
    0x13, 0x0B, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00,
];

/// Header for frames captured at `resolution`.
pub fn header(resolution: Resolution) -> &'static [u8; HEADER_LEN] {
    match resolution {
        Resolution::Vga => &HEADER_VGA,
        Resolution::Qvga => &HEADER_QVGA,
        Resolution::Qqvga => &HEADER_QQVGA,
    }
}

/// Bitmap encoder over a borrowed frame. Not restartable, create a new one to encode again.
pub struct BitmapStream<'f> {
    header: &'static [u8; HEADER_LEN],
    format: PixelFormat,
    payload: &'f [u8],
    cursor: usize,
    finished: bool,
}

impl<'f> BitmapStream<'f> {
    /// Start encoding `frame`. Bayer frames cannot be converted, their stream is finished from
    /// the start.
    pub fn new(frame: &'f Frame<'_>) -> Self {
        let format = frame.format();
        BitmapStream {
            header: header(frame.resolution()),
            format,
            payload: frame.as_bytes(),
            cursor: 0,
            finished: format == PixelFormat::Bayer,
        }
    }

    /// Set once the last unit has been handed out, never cleared.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Total number of bytes a fresh stream over the same frame produces.
    pub fn encoded_len(&self) -> usize {
        match self.format {
            PixelFormat::Bayer => 0,
            format => HEADER_LEN + self.payload.len() / format.bytes_per_sample() * 3,
        }
    }

    /// Next encoded unit. Once the stream is finished every call returns `[0]`.
    pub fn next_unit(&mut self) -> Unit {
        if self.finished {
            return unit(&[0x00]);
        }

        let next = if self.cursor < HEADER_LEN {
            let byte = self.header[self.cursor];
            self.cursor += 1;
            Some(unit(&[byte]))
        } else {
            self.next_pixel()
        };

        if self.cursor >= HEADER_LEN + self.payload.len() {
            self.finished = true;
        }

        match next {
            Some(next) => next,
            None => {
                self.finished = true;
                unit(&[0x00])
            }
        }
    }

    fn next_pixel(&mut self) -> Option<Unit> {
        let offset = self.cursor - HEADER_LEN;
        match self.format {
            PixelFormat::Greyscale => {
                let s = *self.payload.get(offset)?;
                self.cursor += 1;
                Some(unit(&[s, s, s]))
            }
            PixelFormat::Rgb565 => {
                // Little-endian sample, channels are not scaled to 8 bits
                let lo = *self.payload.get(offset)? as u16;
                let hi = *self.payload.get(offset + 1)? as u16;
                let v = (hi << 8) | lo;
                self.cursor += 2;
                Some(unit(&[
                    ((v >> 11) & 0x1F) as u8,
                    ((v >> 5) & 0x3F) as u8,
                    (v & 0x1F) as u8,
                ]))
            }
            PixelFormat::Bayer => None,
        }
    }

    /// Iterate over the remaining encoded bytes, stopping at the end of the stream.
    pub fn bytes(&mut self) -> Bytes<'_, 'f> {
        Bytes {
            stream: self,
            unit: Unit::new(),
            index: 0,
        }
    }
}

fn unit(bytes: &[u8]) -> Unit {
    bytes.iter().copied().collect()
}

/// Byte iterator returned by `BitmapStream::bytes`.
pub struct Bytes<'s, 'f> {
    stream: &'s mut BitmapStream<'f>,
    unit: Unit,
    index: usize,
}

impl<'s, 'f> Iterator for Bytes<'s, 'f> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        loop {
            if let Some(&byte) = self.unit.get(self.index) {
                self.index += 1;
                return Some(byte);
            }
            if self.stream.is_finished() {
                return None;
            }
            self.unit = self.stream.next_unit();
            self.index = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameBuilder, FrameSink};

    fn le32(bytes: &[u8]) -> u32 {
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn filled<'a>(
        format: PixelFormat,
        resolution: Resolution,
        memory: &'a mut [u8],
        sample: impl Fn(usize) -> u8,
    ) -> Frame<'a> {
        let mut frame = FrameBuilder::new(usize::MAX)
            .contiguous(format, resolution, memory)
            .unwrap();
        frame.begin();
        for i in 0..frame.capacity() {
            assert!(frame.push(sample(i)));
        }
        frame
    }

    #[test]
    fn headers_describe_their_tier() {
        for &resolution in Resolution::ALL.iter() {
            let (w, h) = resolution.dimensions();
            let image = w as u32 * h as u32 * 3;
            let header = header(resolution);

            assert_eq!(&header[0..2], b"BM");
            assert_eq!(le32(&header[2..]), 54 + image);
            assert_eq!(le32(&header[10..]), 54);
            assert_eq!(le32(&header[14..]), 40);
            assert_eq!(le32(&header[18..]), w as u32);
            assert_eq!(le32(&header[22..]), h as u32);
            assert_eq!(&header[26..30], &[1, 0, 24, 0]);
            assert_eq!(le32(&header[30..]), 0);
            assert_eq!(le32(&header[34..]), image);
            assert_eq!(le32(&header[38..]), 2835);
            assert_eq!(le32(&header[42..]), 2835);
        }
    }

    #[test]
    fn encoded_length_per_tier() {
        let mut memory = vec![0u8; 640 * 480];
        for &resolution in Resolution::ALL.iter() {
            let (w, h) = resolution.dimensions();
            let frame = filled(PixelFormat::Greyscale, resolution, &mut memory, |i| i as u8);
            let mut stream = BitmapStream::new(&frame);

            let expected = 54 + w as usize * h as usize * 3;
            assert_eq!(stream.encoded_len(), expected);
            assert_eq!(stream.bytes().count(), expected);
            assert!(stream.is_finished());
        }
    }

    #[test]
    fn greyscale_sample_is_replicated() {
        let mut memory = vec![0u8; 160 * 120];
        let frame = filled(PixelFormat::Greyscale, Resolution::Qqvga, &mut memory, |i| {
            (i % 251) as u8
        });
        let mut stream = BitmapStream::new(&frame);

        for i in 0..HEADER_LEN {
            assert_eq!(stream.next_unit().as_slice(), &[HEADER_QQVGA[i]]);
        }
        for i in 0..frame.capacity() {
            let s = (i % 251) as u8;
            assert_eq!(stream.next_unit().as_slice(), &[s, s, s]);
        }
        assert!(stream.is_finished());
    }

    #[test]
    fn rgb565_channels_are_extracted_unscaled() {
        let mut memory = vec![0u8; 160 * 120 * 2];
        // Every sample is 0x1234, sent low byte first
        let frame = filled(PixelFormat::Rgb565, Resolution::Qqvga, &mut memory, |i| {
            if i % 2 == 0 {
                0x34
            } else {
                0x12
            }
        });
        let mut stream = BitmapStream::new(&frame);
        assert_eq!(stream.encoded_len(), 54 + 160 * 120 * 3);

        stream.bytes().take(HEADER_LEN).for_each(drop);
        assert_eq!(stream.next_unit().as_slice(), &[0x02, 0x11, 0x14]);

        let mut units = 1;
        while !stream.is_finished() {
            assert_eq!(stream.next_unit().as_slice(), &[0x02, 0x11, 0x14]);
            units += 1;
        }
        assert_eq!(units, 160 * 120);
    }

    #[test]
    fn bayer_is_finished_from_the_start() {
        let mut memory = vec![0u8; 160 * 120];
        let frame = filled(PixelFormat::Bayer, Resolution::Qqvga, &mut memory, |_| 0xFF);
        let mut stream = BitmapStream::new(&frame);

        assert!(stream.is_finished());
        assert_eq!(stream.encoded_len(), 0);
        assert_eq!(stream.next_unit().as_slice(), &[0x00]);
        assert_eq!(stream.bytes().count(), 0);
    }

    #[test]
    fn finished_stream_yields_sentinel() {
        let mut memory = vec![0u8; 160 * 120];
        let frame = filled(PixelFormat::Greyscale, Resolution::Qqvga, &mut memory, |_| 0x80);
        let mut stream = BitmapStream::new(&frame);

        stream.bytes().for_each(drop);
        assert!(stream.is_finished());
        for _ in 0..3 {
            assert_eq!(stream.next_unit().as_slice(), &[0x00]);
            assert!(stream.is_finished());
        }
    }
}
