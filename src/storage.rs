//! Client side of the storage co-processor link.
//!
//! Encoded images are not written to local memory. They are streamed over a serial port to a
//! second microcontroller that owns an SD card. Every message is two bytes, a command followed
//! by one payload byte.

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::serial;
use nb::block;

use crate::bmp::BitmapStream;
use crate::frame::{FrameSink, Mode};

/// Commands understood by the storage co-processor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Command {
    /// Followed by the file name and a `\n`, sent as raw bytes.
    SetFileName = 0,
    OpenFile = 1,
    CloseFile = 2,
    WriteByte = 3,
    /// Let the co-processor do the bitmap encoding itself.
    ToggleAutoEncode = 4,
    MetadataByte = 5,
    LedOn = 6,
    LedOff = 7,
}

/// Metadata byte announcing the mode of the raw data that follows. Bit `resolution + 1` and
/// bit `format + 4` are set.
pub fn metadata(mode: Mode) -> u8 {
    (1 << (mode.resolution as u8 + 1)) | (1 << (mode.format as u8 + 4))
}

/// Handle for the storage link.
pub struct StorageLink<W> {
    serial: W,
}

impl<W, E> StorageLink<W>
where
    W: serial::Write<u8, Error = E>,
{
    pub fn new(serial: W) -> Self {
        StorageLink { serial }
    }

    /// Give back the serial port.
    pub fn release(self) -> W {
        self.serial
    }

    /// Send one command.
    pub fn send(&mut self, command: Command, payload: u8) -> Result<(), E> {
        block!(self.serial.write(command as u8))?;
        block!(self.serial.write(payload))?;
        Ok(())
    }

    /// Name a new file and open it for writing.
    pub fn create_file(&mut self, name: &str) -> Result<(), E> {
        self.send(Command::SetFileName, 0x00)?;
        for &byte in name.as_bytes() {
            block!(self.serial.write(byte))?;
        }
        block!(self.serial.write(b'\n'))?;
        self.send(Command::OpenFile, 0x00)
    }

    /// Close the open file and wait until everything has left the port.
    pub fn close_file(&mut self) -> Result<(), E> {
        self.send(Command::CloseFile, 0x00)?;
        block!(self.serial.flush())
    }

    /// Append one byte to the open file.
    pub fn write_byte(&mut self, byte: u8) -> Result<(), E> {
        self.send(Command::WriteByte, byte)
    }

    /// Append `data` to the open file.
    pub fn write_all(&mut self, data: &[u8]) -> Result<(), E> {
        for &byte in data {
            self.write_byte(byte)?;
        }
        Ok(())
    }

    /// Append the remaining bytes of `stream` to the open file. Returns the number of bytes
    /// written.
    pub fn write_bitmap(&mut self, stream: &mut BitmapStream<'_>) -> Result<usize, E> {
        let mut written = 0;
        for byte in stream.bytes() {
            self.write_byte(byte)?;
            written += 1;
        }
        trace!("storage: wrote {} bitmap bytes", written);
        Ok(written)
    }

    /// `write_all`, pausing for `pause_us` before every `chunk_size` bytes so the co-processor
    /// can drain its receive buffer to the card. The link has no flow control.
    pub fn write_paced<D: DelayUs<u32>>(
        &mut self,
        data: &[u8],
        chunk_size: usize,
        delay: &mut D,
        pause_us: u32,
    ) -> Result<(), E> {
        self.send_paced(data.iter().copied(), chunk_size, delay, pause_us)
            .map(|_| ())
    }

    /// `write_bitmap` with the same pacing as `write_paced`.
    pub fn write_bitmap_paced<D: DelayUs<u32>>(
        &mut self,
        stream: &mut BitmapStream<'_>,
        chunk_size: usize,
        delay: &mut D,
        pause_us: u32,
    ) -> Result<usize, E> {
        let written = self.send_paced(stream.bytes(), chunk_size, delay, pause_us)?;
        trace!("storage: wrote {} bitmap bytes", written);
        Ok(written)
    }

    fn send_paced<D: DelayUs<u32>>(
        &mut self,
        bytes: impl Iterator<Item = u8>,
        chunk_size: usize,
        delay: &mut D,
        pause_us: u32,
    ) -> Result<usize, E> {
        let chunk_size = chunk_size.max(1);
        let mut written = 0;
        for byte in bytes {
            if written % chunk_size == 0 {
                delay.delay_us(pause_us);
            }
            self.write_byte(byte)?;
            written += 1;
        }
        Ok(written)
    }

    pub fn write_metadata(&mut self, mode: Mode) -> Result<(), E> {
        self.send(Command::MetadataByte, metadata(mode))
    }

    pub fn toggle_auto_encode(&mut self) -> Result<(), E> {
        self.send(Command::ToggleAutoEncode, 0x00)
    }

    pub fn led_on(&mut self) -> Result<(), E> {
        self.send(Command::LedOn, 0x00)
    }

    pub fn led_off(&mut self) -> Result<(), E> {
        self.send(Command::LedOff, 0x00)
    }
}

/// Capture target forwarding every sampled byte straight to the open file, for devices without
/// room for a whole frame. The serial port must keep up with the pixel clock.
pub struct SerialSink<W> {
    link: StorageLink<W>,
    mode: Mode,
    failed: bool,
}

impl<W, E> SerialSink<W>
where
    W: serial::Write<u8, Error = E>,
{
    /// Announce `mode` to the co-processor and forward raw samples from then on.
    pub fn new(mut link: StorageLink<W>, mode: Mode) -> Result<Self, E> {
        link.write_metadata(mode)?;
        Ok(SerialSink {
            link,
            mode,
            failed: false,
        })
    }

    /// True if a byte could not be sent during the last capture.
    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn into_link(self) -> StorageLink<W> {
        self.link
    }
}

impl<W, E> FrameSink for SerialSink<W>
where
    W: serial::Write<u8, Error = E>,
{
    fn begin(&mut self) {
        self.failed = false;
    }

    fn push(&mut self, byte: u8) -> bool {
        if self.link.write_byte(byte).is_err() {
            self.failed = true;
        }
        !self.failed
    }

    fn mode(&self) -> Option<Mode> {
        Some(self.mode)
    }
}
