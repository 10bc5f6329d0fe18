//! OV7670 device driver.
//! * Configures the sensor using the SCCB (I2C) port.
//! * Drives the sensor's master clock through a `MasterClock` output.
//! * Captures frames by polling VSYNC, HREF, PCLK and the eight data lines.
//!
//! User must call `initialize` and then `configure` before the first `capture_frame`.

pub mod clock;
pub mod lines;
pub mod regs;
pub mod sccb;

use embedded_hal::blocking::{delay::DelayMs, i2c};
use embedded_hal::digital::v2::InputPin;

use crate::frame::{FrameSink, Mode, PixelFormat, Resolution};
pub use clock::MasterClock;
pub use lines::{DigitalLineGroup, Input, Output};
use regs::Register;
pub use sccb::{Sccb, SccbError};

/// Driver lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    /// Master clock stopped, registers unknown.
    Uninitialized,
    /// Reset and base mode applied, no pixel format or resolution yet.
    Initialized,
    /// Ready to capture in the persisted mode.
    Configured,
    /// A capture is in progress.
    Capturing,
    /// The last register program or capture failed. `configure` or `initialize` recovers.
    Faulted,
}

/// The sensor's sync and clock outputs, all sampled.
pub struct SyncLines<P> {
    /// Frame sync, high between frames.
    pub vsync: P,
    /// Line sync, high while a row's pixels are on the bus.
    pub href: P,
    /// Pixel clock, one period per byte.
    pub pclk: P,
}

/// Driver errors. `BE` is the I2C error and `PE` the GPIO error, both passed through as-is.
#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum SensorError<BE, PE> {
    /// Register bus transaction failed.
    #[error("register bus: {0}")]
    Bus(SccbError<BE>),
    /// Reading a sync or data line failed.
    #[error("digital line: {0:?}")]
    Line(PE),
    /// No master clock divider reaches the requested frequency.
    #[error("no master clock divider reaches {target_hz} Hz")]
    Configuration { target_hz: u32 },
    /// A raw format, resolution or divider value is out of range.
    #[error("parameter out of range")]
    InvalidParameter,
    /// The operation is not allowed in the current state.
    #[error("not allowed while {0:?}")]
    InvalidState(State),
    /// Product ID or version mismatch.
    #[error("unexpected sensor id {pid:#04x}, version {ver:#04x}")]
    UnexpectedId { pid: u8, ver: u8 },
    /// Frame sync asserted before the next row started. The first `rows_completed` rows of the
    /// target are valid.
    #[error("frame ended early after {rows_completed} rows")]
    CorruptedFrame { rows_completed: u16 },
    /// The capture target was sized for a different mode.
    #[error("capture target was sized for a different mode")]
    FrameMismatch,
    /// The capture target refused a byte.
    #[error("capture target full after {written} bytes")]
    SinkOverrun { written: usize },
    /// A sync or clock line did not change within the configured spin limit.
    #[error("sync line wait timed out")]
    Timeout,
}

impl<BE, PE> From<SccbError<BE>> for SensorError<BE, PE> {
    fn from(e: SccbError<BE>) -> Self {
        SensorError::Bus(e)
    }
}

/// OV7670 driver, owning the register bus, the sync lines, the data bus, the master clock and
/// a delay provider.
pub struct Ov7670<I2C, P, CLK, D> {
    i2c: I2C,
    sccb: Sccb<I2C>,
    sync: SyncLines<P>,
    data: DigitalLineGroup<P, Input>,
    mclk: CLK,
    delay: D,
    state: State,

    /// Mode persisted by the last successful `configure`.
    mode: Option<Mode>,

    /// Maximum polls per busy-wait, `None` waits forever.
    spin_limit: Option<u32>,
}

impl<I2C, P, CLK, D, BE, PE> Ov7670<I2C, P, CLK, D>
where
    I2C: i2c::Read<Error = BE> + i2c::Write<Error = BE>,
    P: InputPin<Error = PE>,
    CLK: MasterClock,
    D: DelayMs<u16>,
{
    /// Creates a new driver. Nothing is written to the sensor until `initialize`.
    pub fn new(
        i2c: I2C,
        sync: SyncLines<P>,
        data: DigitalLineGroup<P, Input>,
        mclk: CLK,
        delay: D,
    ) -> Self {
        Ov7670 {
            i2c,
            sccb: Sccb::new(regs::OV7670_ADDRESS),
            sync,
            data,
            mclk,
            delay,
            state: State::Uninitialized,
            mode: None,
            spin_limit: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Mode persisted by the last successful `configure`.
    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    /// Bound every busy-wait in `capture_frame` to `limit` polls. `None` (the default) waits
    /// forever, so a stuck line hangs the capture.
    pub fn set_sync_timeout(&mut self, limit: Option<u32>) {
        self.spin_limit = limit;
    }

    /// Start the master clock at `target_clock_hz`, reset the sensor and apply the base mode.
    pub fn initialize(&mut self, target_clock_hz: u32) -> Result<(), SensorError<BE, PE>> {
        let divider = match clock::divider_for(
            self.mclk.source_hz(),
            self.mclk.max_divider(),
            target_clock_hz,
        ) {
            Some(divider) => divider,
            None => {
                return Err(SensorError::Configuration {
                    target_hz: target_clock_hz,
                })
            }
        };

        self.mclk.enable(divider);
        trace!(
            "ov7670: XCLK {} Hz (divider {})",
            self.mclk.source_hz() / divider,
            divider
        );

        let result = self.apply_base_mode();
        self.mode = None;
        self.state = match result {
            Ok(()) => State::Initialized,
            Err(_) => State::Faulted,
        };
        result
    }

    fn apply_base_mode(&mut self) -> Result<(), SensorError<BE, PE>> {
        if let Err(e) = self.data.init() {
            return Err(SensorError::Line(e));
        }

        // Reset all registers to their default values
        let (reg, val) = regs::RESET;
        self.sccb
            .write_register(&mut self.i2c, &mut self.delay, reg, val)?;
        self.delay.delay_ms(regs::RESET_SETTLE_MS);

        self.sccb
            .apply_config(&mut self.i2c, &mut self.delay, &regs::BASE_MODE)?;
        Ok(())
    }

    /// Check the product ID and version match the OV7670.
    pub fn check_id(&mut self) -> Result<(), SensorError<BE, PE>> {
        let pid = self.read_register(Register::PROD_ID)?;
        let ver = self.read_register(Register::PROD_VER)?;
        trace!("ov7670: PID {:#04x} VER {:#04x}", pid, ver);

        if pid != regs::OV7670_PID || ver != regs::OV7670_VER {
            return Err(SensorError::UnexpectedId { pid, ver });
        }
        Ok(())
    }

    /// Program the sensor for `format` at `resolution` and remember the mode. May be called
    /// again to switch modes, or to recover from `State::Faulted`.
    pub fn configure(
        &mut self,
        format: PixelFormat,
        resolution: Resolution,
    ) -> Result<(), SensorError<BE, PE>> {
        if self.state == State::Uninitialized {
            return Err(SensorError::InvalidState(self.state));
        }

        let result = self.apply_mode(format, resolution);
        match result {
            Ok(()) => {
                trace!("ov7670: configured {} {}", format, resolution);
                self.mode = Some(Mode::new(format, resolution));
                self.state = State::Configured;
            }
            Err(_) => self.state = State::Faulted,
        }
        result
    }

    fn apply_mode(
        &mut self,
        format: PixelFormat,
        resolution: Resolution,
    ) -> Result<(), SensorError<BE, PE>> {
        self.sccb.apply_config(
            &mut self.i2c,
            &mut self.delay,
            regs::format_sequence(format),
        )?;
        self.sccb.apply_config(
            &mut self.i2c,
            &mut self.delay,
            regs::resolution_sequence(resolution),
        )?;
        Ok(())
    }

    /// `configure` from raw mode codes. Unknown codes are rejected before anything is written,
    /// leaving the persisted mode and state untouched.
    pub fn configure_raw(&mut self, format: u8, resolution: u8) -> Result<(), SensorError<BE, PE>> {
        match (PixelFormat::try_from(format), Resolution::try_from(resolution)) {
            (Ok(format), Ok(resolution)) => self.configure(format, resolution),
            _ => Err(SensorError::InvalidParameter),
        }
    }

    /// Write one register and wait for it to latch.
    pub fn write_register(&mut self, reg: u8, val: u8) -> Result<(), SensorError<BE, PE>> {
        self.sccb
            .write_register(&mut self.i2c, &mut self.delay, reg, val)?;
        Ok(())
    }

    /// Read one register.
    pub fn read_register(&mut self, reg: u8) -> Result<u8, SensorError<BE, PE>> {
        Ok(self.sccb.read_register(&mut self.i2c, reg)?)
    }

    /// Slow the sensor's internal clock, and with it PCLK, by `divider` (1..=64). A slower pixel
    /// clock leaves more time per sample on slow hosts at the cost of frame rate.
    pub fn set_pixel_clock_divider(&mut self, divider: u8) -> Result<(), SensorError<BE, PE>> {
        if divider == 0 || divider > 64 {
            return Err(SensorError::InvalidParameter);
        }
        self.write_register(Register::CLKRC, divider - 1)
    }

    /// Capture one frame into `target`.
    ///
    /// Waits for the next frame boundary, then samples `height` rows of `width` pixels. With
    /// `safe_mode` each row waits for its HREF edge while watching VSYNC, and a frame that ends
    /// early fails with `CorruptedFrame`; the rows completed before that stay valid in `target`.
    ///
    /// This busy-waits on the sensor's clock, run it where nothing can preempt it.
    pub fn capture_frame<S: FrameSink>(
        &mut self,
        target: &mut S,
        safe_mode: bool,
    ) -> Result<(), SensorError<BE, PE>> {
        let mode = match (self.state, self.mode) {
            (State::Configured, Some(mode)) => mode,
            (state, _) => return Err(SensorError::InvalidState(state)),
        };
        if target.mode().map_or(false, |m| m != mode) {
            return Err(SensorError::FrameMismatch);
        }

        self.state = State::Capturing;
        target.begin();
        let result = self.read_frame(target, mode, safe_mode);

        self.state = match result {
            Ok(()) => State::Configured,
            Err(SensorError::CorruptedFrame { rows_completed }) => {
                trace!("ov7670: frame ended after {} rows", rows_completed);
                State::Faulted
            }
            Err(_) => State::Faulted,
        };
        result
    }

    fn read_frame<S: FrameSink>(
        &self,
        target: &mut S,
        mode: Mode,
        safe_mode: bool,
    ) -> Result<(), SensorError<BE, PE>> {
        let (width, height) = mode.resolution.dimensions();
        let two_bytes = mode.format.bytes_per_sample() == 2;
        let pclk = &self.sync.pclk;
        let limit = self.spin_limit;
        let mut written = 0;

        // VSYNC pulses high between frames, the frame starts on its falling edge
        Self::wait_level(&self.sync.vsync, true, limit)?;
        Self::wait_level(&self.sync.vsync, false, limit)?;

        for row in 0..height {
            if safe_mode {
                self.wait_row_start(row)?;
            }

            for _ in 0..width {
                Self::wait_level(pclk, false, limit)?;
                if !target.push(self.sample()?) {
                    return Err(SensorError::SinkOverrun { written });
                }
                written += 1;
                Self::wait_level(pclk, true, limit)?;

                // Second byte of the pixel, only kept for two-byte formats
                Self::wait_level(pclk, false, limit)?;
                if two_bytes {
                    if !target.push(self.sample()?) {
                        return Err(SensorError::SinkOverrun { written });
                    }
                    written += 1;
                }
                Self::wait_level(pclk, true, limit)?;
            }
        }

        Ok(())
    }

    /// Wait for the HREF rising edge that starts `row`, failing if VSYNC asserts first.
    fn wait_row_start(&self, row: u16) -> Result<(), SensorError<BE, PE>> {
        self.wait_href(row, false)?;
        self.wait_href(row, true)
    }

    fn wait_href(&self, row: u16, high: bool) -> Result<(), SensorError<BE, PE>> {
        let mut spins: u32 = 0;
        loop {
            if Self::level(&self.sync.vsync)? {
                return Err(SensorError::CorruptedFrame {
                    rows_completed: row,
                });
            }
            if Self::level(&self.sync.href)? == high {
                return Ok(());
            }
            Self::spin(&mut spins, self.spin_limit)?;
        }
    }

    #[inline(always)]
    fn sample(&self) -> Result<u8, SensorError<BE, PE>> {
        self.data.sample_byte().map_err(SensorError::Line)
    }

    #[inline(always)]
    fn level(line: &P) -> Result<bool, SensorError<BE, PE>> {
        line.is_high().map_err(SensorError::Line)
    }

    /// Busy-wait until `line` reads `high`.
    #[inline(always)]
    fn wait_level(line: &P, high: bool, limit: Option<u32>) -> Result<(), SensorError<BE, PE>> {
        let mut spins: u32 = 0;
        while Self::level(line)? != high {
            Self::spin(&mut spins, limit)?;
        }
        Ok(())
    }

    #[inline(always)]
    fn spin(spins: &mut u32, limit: Option<u32>) -> Result<(), SensorError<BE, PE>> {
        if let Some(limit) = limit {
            *spins += 1;
            if *spins > limit {
                return Err(SensorError::Timeout);
            }
        }
        Ok(())
    }

    /// Give back the hardware resources.
    pub fn release(self) -> (I2C, SyncLines<P>, DigitalLineGroup<P, Input>, CLK, D) {
        (self.i2c, self.sync, self.data, self.mclk, self.delay)
    }
}
