//! The OV7670 parallel data bus: eight GPIO lines read or written as one byte.
//!
//! Line `i` always carries bit `i`. The group takes exactly eight lines as an array, so a bus
//! wired with fewer lines does not compile.

use core::marker::PhantomData;
use embedded_hal::digital::v2::{InputPin, OutputPin};

/// Direction marker for groups that are sampled.
pub struct Input;

/// Direction marker for groups that are driven.
pub struct Output;

/// Eight digital lines handled as one byte.
pub struct DigitalLineGroup<P, DIR> {
    lines: [P; 8],
    direction: PhantomData<DIR>,
}

impl<P, DIR> DigitalLineGroup<P, DIR> {
    /// Group `lines`, least significant bit first.
    pub fn new(lines: [P; 8]) -> Self {
        DigitalLineGroup {
            lines,
            direction: PhantomData,
        }
    }

    /// Give the lines back.
    pub fn release(self) -> [P; 8] {
        self.lines
    }
}

impl<P, E> DigitalLineGroup<P, Input>
where
    P: InputPin<Error = E>,
{
    /// Read every line once so a broken pin shows up before the first capture.
    pub fn init(&mut self) -> Result<(), E> {
        self.sample_byte().map(|_| ())
    }

    /// Read all eight lines and pack them, line `i` into bit `i`.
    #[inline(always)]
    pub fn sample_byte(&self) -> Result<u8, E> {
        let mut byte = 0;
        for (bit, line) in self.lines.iter().enumerate() {
            if line.is_high()? {
                byte |= 1 << bit;
            }
        }
        Ok(byte)
    }
}

impl<P, E> DigitalLineGroup<P, Output>
where
    P: OutputPin<Error = E>,
{
    /// Drive every line low.
    pub fn init(&mut self) -> Result<(), E> {
        self.drive_byte(0x00)
    }

    /// Drive line `i` to bit `i` of `value`.
    pub fn drive_byte(&mut self, value: u8) -> Result<(), E> {
        for (bit, line) in self.lines.iter_mut().enumerate() {
            if value & (1 << bit) != 0 {
                line.set_high()?;
            } else {
                line.set_low()?;
            }
        }
        Ok(())
    }
}
