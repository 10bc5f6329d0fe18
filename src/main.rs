//! A still camera: captures OV7670 frames on a Nucleo-F767ZI and streams them as bitmaps to a
//! storage co-processor.

#![no_main]
#![no_std]

use ov7670_rs::bmp::BitmapStream;
use ov7670_rs::config::{CameraConfig, FRAME_MEMORY_CEILING, PIXEL_FORMAT, RESOLUTION};
use ov7670_rs::frame::{frame_capacity, FrameBuilder, Mode};
use ov7670_rs::ov7670::{DigitalLineGroup, MasterClock, Ov7670, SensorError};
use ov7670_rs::pins::pin_config_nucleo;
use ov7670_rs::storage::StorageLink;

use core::fmt::Write as _;
use core::panic::PanicInfo;
use core::ptr::addr_of_mut;
use cortex_m::interrupt::free;
use cortex_m_rt::entry;
use embedded_hal::blocking::{
    delay::{DelayMs, DelayUs},
    i2c,
};
use embedded_hal::digital::v2::InputPin;
use heapless::String;
use rtt_target::{rprintln, rtt_init, set_print_channel};
use stm32f7xx_hal::{
    delay::Delay,
    device::{self, RCC},
    i2c::{BlockingI2c, Mode as I2cMode},
    prelude::*,
    rcc::{HSEClock, HSEClockMode},
    serial::{self, Serial},
};

/// Frame memory for the build-time mode, in internal SRAM. Never more than the ceiling, a mode
/// that does not fit is reported at runtime.
const FRAME_BYTES: usize = {
    let needed = frame_capacity(PIXEL_FORMAT, RESOLUTION);
    if needed < FRAME_MEMORY_CEILING {
        needed
    } else {
        FRAME_MEMORY_CEILING
    }
};
static mut FRAME_MEMORY: [u8; FRAME_BYTES] = [0; FRAME_BYTES];

/// Microcontroller clock output 2, fed from SYSCLK through a 1..=5 prescaler.
struct Mco2 {
    sysclk_hz: u32,
}

impl MasterClock for Mco2 {
    fn source_hz(&self) -> u32 {
        self.sysclk_hz
    }

    fn max_divider(&self) -> u32 {
        5
    }

    fn enable(&mut self, divider: u32) {
        // Clock config for MCO2 doesn't appear to be in HAL
        let rcc_regs = unsafe { &(*RCC::ptr()) };
        rcc_regs.cfgr.modify(|_, w| w.mco2().sysclk());
        rcc_regs.cfgr.modify(|_, w| match divider {
            1 => w.mco2pre().div1(),
            2 => w.mco2pre().div2(),
            3 => w.mco2pre().div3(),
            4 => w.mco2pre().div4(),
            _ => w.mco2pre().div5(),
        });
    }
}

/// Busy-wait delay for pacing the storage link. SysTick already belongs to the camera driver.
struct CycleDelay {
    cycles_per_us: u32,
}

impl DelayUs<u32> for CycleDelay {
    fn delay_us(&mut self, us: u32) {
        cortex_m::asm::delay(us.saturating_mul(self.cycles_per_us));
    }
}

#[entry]
fn main() -> ! {
    // Setup RTT for logging
    let channels = rtt_init! {
        up: {
            0: {
                size: 4096
                mode: BlockIfFull
                name: "Terminal"
            }
        }
    };

    set_print_channel(channels.up.0);

    // Get peripherals
    let pac_periph = device::Peripherals::take().unwrap();
    let cm_periph = cortex_m::Peripherals::take().unwrap();
    let config = CameraConfig::default();

    // Nucleo board: HSE = 8 MHz, use as SYSCLK source
    let mut rcc = pac_periph.RCC.constrain();
    let hse_cfg = HSEClock::new(8.mhz(), HSEClockMode::Oscillator);
    let clocks = rcc.cfgr.hse(hse_cfg).sysclk(216.mhz()).freeze();

    // Delay configuration
    let delay = Delay::new(cm_periph.SYST, clocks);

    // GPIO configuration
    let (camera_pins, i2c_pins, uart_pins) = pin_config_nucleo();

    // I2C1 configuration (SCCB)
    let i2c = BlockingI2c::i2c1(
        pac_periph.I2C1,
        i2c_pins,
        I2cMode::standard(100.khz()),
        clocks,
        &mut rcc.apb1,
        10000,
    );

    // USART2 configuration (storage co-processor)
    let serial = Serial::new(
        pac_periph.USART2,
        uart_pins,
        clocks,
        serial::Config::default(),
    );
    let (tx, _rx) = serial.split();
    let mut storage = StorageLink::new(tx);
    let mut pacing = CycleDelay {
        cycles_per_us: clocks.sysclk().0 / 1_000_000,
    };

    let mut camera = Ov7670::new(
        i2c,
        camera_pins.sync,
        DigitalLineGroup::new(camera_pins.data),
        Mco2 {
            sysclk_hz: clocks.sysclk().0,
        },
        delay,
    );

    if let Err(e) = bring_up(&mut camera, &config) {
        rprintln!("OV7670 bring-up failed: {:?}", e);
        halt();
    }
    rprintln!("OV7670 configured for {} {}", config.format, config.resolution);

    let memory = unsafe { &mut *addr_of_mut!(FRAME_MEMORY) };
    let mut frame = match FrameBuilder::new(config.frame_memory_ceiling).contiguous(
        config.format,
        config.resolution,
        memory,
    ) {
        Ok(frame) => frame,
        Err(e) => {
            rprintln!("{}", e);
            halt();
        }
    };

    let mode = Mode::new(config.format, config.resolution);
    let mut image_number: u32 = 1;
    loop {
        // Nothing may steal pixel clock edges while sampling
        let result = free(|_| camera.capture_frame(&mut frame, config.safe_mode));
        if let Err(e) = result {
            rprintln!("Capture failed: {:?}", e);
            if let Err(e) = camera.configure(config.format, config.resolution) {
                rprintln!("Reconfigure failed: {:?}", e);
                halt();
            }
            continue;
        }

        let mut name: String<16> = String::new();
        if write!(name, "IMG{:05}.BMP", image_number).is_err() {
            halt();
        }

        let mut stream = BitmapStream::new(&frame);
        let saved = storage.led_on().and_then(|_| {
            storage.create_file(&name)?;
            if stream.is_finished() {
                // No bitmap conversion for this format, send raw samples and let the storage
                // side deal with them
                storage.write_metadata(mode)?;
                storage.write_paced(
                    frame.valid_bytes(),
                    config.storage_chunk_size,
                    &mut pacing,
                    config.storage_pause_us,
                )?;
            } else {
                storage.write_bitmap_paced(
                    &mut stream,
                    config.storage_chunk_size,
                    &mut pacing,
                    config.storage_pause_us,
                )?;
            }
            storage.close_file()?;
            storage.led_off()
        });

        match saved {
            Ok(()) => rprintln!("Saved {}", name.as_str()),
            Err(e) => rprintln!("Saving {} failed: {:?}", name.as_str(), e),
        }
        image_number += 1;
    }
}

/// Start the sensor and program it for the configured mode.
fn bring_up<I2C, P, CLK, D, BE, PE>(
    camera: &mut Ov7670<I2C, P, CLK, D>,
    config: &CameraConfig,
) -> Result<(), SensorError<BE, PE>>
where
    I2C: i2c::Read<Error = BE> + i2c::Write<Error = BE>,
    P: InputPin<Error = PE>,
    CLK: MasterClock,
    D: DelayMs<u16>,
{
    camera.initialize(config.mclk_hz)?;
    camera.check_id()?;
    camera.configure(config.format, config.resolution)?;
    camera.set_pixel_clock_divider(config.pclk_divider)?;
    Ok(())
}

fn halt() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

#[inline(never)]
#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    rprintln!("Panicked!");
    rprintln!("{:?}", _info);
    loop {}
}
