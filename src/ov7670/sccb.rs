//! A generic driver for the Serial Camera Control Bus on the OV7670 image sensor. Works on any
//! microcontroller implementing the embedded-hal I2C and delay interfaces.
//!
//! The OV7670 latches register writes slowly, so every write is followed by a short settle
//! delay. Bus errors are handed back to the caller as-is, nothing here retries.

use core::marker::PhantomData;
use embedded_hal::blocking::{delay::DelayMs, i2c};

/// Settle time after every register write, in milliseconds.
pub const WRITE_SETTLE_MS: u16 = 1;

/// SCCB driver.
#[derive(Debug)]
pub struct Sccb<I2C> {
    /// Marker to ensure the same I2C type is used in all calls.
    i2c: PhantomData<I2C>,
    /// Device I2C address.
    address: u8,
}

/// SCCB errors, wrapping the I2C error unchanged.
#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum SccbError<E> {
    /// I2C write error.
    #[error("SCCB write failed: {0:?}")]
    Write(E),
    /// I2C read error.
    #[error("SCCB read failed: {0:?}")]
    Read(E),
}

impl<I2C, E> Sccb<I2C>
where
    I2C: i2c::Read<Error = E> + i2c::Write<Error = E>,
{
    /// Creates a new SCCB driver talking to the device at `address`.
    pub fn new(address: u8) -> Self {
        Sccb {
            i2c: PhantomData,
            address,
        }
    }

    /// Read a register, must be two seperate transactions and we can't use `WriteRead`.
    pub fn read_register(&self, i2c: &mut I2C, reg: u8) -> Result<u8, SccbError<E>> {
        // Write the address
        i2c.write(self.address, &[reg]).map_err(SccbError::Write)?;

        // Read the value
        let mut buf = [0x00];
        i2c.read(self.address, &mut buf).map_err(SccbError::Read)?;

        Ok(buf[0])
    }

    /// Write a register and wait for the sensor to latch it.
    pub fn write_register<D: DelayMs<u16>>(
        &self,
        i2c: &mut I2C,
        delay: &mut D,
        reg: u8,
        val: u8,
    ) -> Result<(), SccbError<E>> {
        i2c.write(self.address, &[reg, val])
            .map_err(SccbError::Write)?;
        delay.delay_ms(WRITE_SETTLE_MS);
        Ok(())
    }

    /// Write a register sequence in order. Stops at the first failing write.
    pub fn apply_config<D: DelayMs<u16>>(
        &self,
        i2c: &mut I2C,
        delay: &mut D,
        sequence: &[(u8, u8)],
    ) -> Result<(), SccbError<E>> {
        for &(reg, val) in sequence {
            self.write_register(i2c, delay, reg, val)?;
        }

        Ok(())
    }
}
