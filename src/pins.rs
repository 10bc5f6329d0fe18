//! GPIO pin configuration for the board.

use embedded_hal::digital::v2::InputPin;
use stm32f7xx_hal::{
    device, gpio,
    gpio::{Alternate, Floating, Input, Speed, AF4, AF7},
    prelude::*,
};

use crate::ov7670::SyncLines;

/// Error type shared by every GPIO input on this HAL.
pub type CameraPinError = <gpio::gpioa::PA4<Input<Floating>> as InputPin>::Error;

/// Any of the floating inputs wired to the OV7670 outputs, so that the sync lines and the data
/// bus share one pin type.
pub enum CameraPin {
    Pa4(gpio::gpioa::PA4<Input<Floating>>),
    Pa6(gpio::gpioa::PA6<Input<Floating>>),
    Pg9(gpio::gpiog::PG9<Input<Floating>>),
    Pc6(gpio::gpioc::PC6<Input<Floating>>),
    Pc7(gpio::gpioc::PC7<Input<Floating>>),
    Pc8(gpio::gpioc::PC8<Input<Floating>>),
    Pe1(gpio::gpioe::PE1<Input<Floating>>),
    Pe4(gpio::gpioe::PE4<Input<Floating>>),
    Pb6(gpio::gpiob::PB6<Input<Floating>>),
    Pe5(gpio::gpioe::PE5<Input<Floating>>),
    Pe6(gpio::gpioe::PE6<Input<Floating>>),
}

impl InputPin for CameraPin {
    type Error = CameraPinError;

    #[inline(always)]
    fn is_high(&self) -> Result<bool, CameraPinError> {
        match self {
            CameraPin::Pa4(p) => p.is_high(),
            CameraPin::Pa6(p) => p.is_high(),
            CameraPin::Pg9(p) => p.is_high(),
            CameraPin::Pc6(p) => p.is_high(),
            CameraPin::Pc7(p) => p.is_high(),
            CameraPin::Pc8(p) => p.is_high(),
            CameraPin::Pe1(p) => p.is_high(),
            CameraPin::Pe4(p) => p.is_high(),
            CameraPin::Pb6(p) => p.is_high(),
            CameraPin::Pe5(p) => p.is_high(),
            CameraPin::Pe6(p) => p.is_high(),
        }
    }

    #[inline(always)]
    fn is_low(&self) -> Result<bool, CameraPinError> {
        self.is_high().map(|high| !high)
    }
}

/// Sensor outputs, ready to hand to the driver.
pub struct CameraPins {
    pub sync: SyncLines<CameraPin>,
    /// D0 first.
    pub data: [CameraPin; 8],
}

/// Configure GPIOs and return the pins needed by the drivers. Note that the peripherals are
/// stolen, so this should only be done during init to be safe.
///
/// Pin configuration for the Nucleo-F767ZI:
///
///     I2C1 SCL:   PB8  --> Nucleo CN7.2   (D15)  --> OV7670 SIOC
///     I2C1 SDA:   PB9 <--> Nucleo CN7.4   (D14) <--> OV7670 SIOD
///     MCO2:       PC9  --> Nucleo CN8.4   (D44)  --> OV7670 XCLK
///     USART2 TX:  PD5  --> Nucleo CN9.6   (D53)  --> Storage RX
///     USART2 RX:  PD6 <--  Nucleo CN9.4   (D52) <--  Storage TX
///     PCLK:       PA6 <--  Nucleo CN7.12  (D12) <--  OV7670 PCLK
///     HREF:       PA4 <--  Nucleo CN7.17  (D24) <--  OV7670 HREF
///     VSYNC:      PG9 <--  Nucleo CN11.63       <--  OV7670 VSYNC
///     D0:         PC6 <--  Nucleo CN7.1   (D16) <--  OV7670 D0
///     D1:         PC7 <--  Nucleo CN7.11  (D21) <--  OV7670 D1
///     D2:         PC8 <--  Nucleo CN8.2   (D43) <--  OV7670 D2
///     D3:         PE1 <--  Nucleo CN11.61       <--  OV7670 D3
///     D4:         PE4 <--  Nucleo CN9.16  (D57) <--  OV7670 D4
///     D5:         PB6 <--  Nucleo CN10.13 (D26) <--  OV7670 D5
///     D6:         PE5 <--  Nucleo CN9.18  (D58) <--  OV7670 D6
///     D7:         PE6 <--  Nucleo CN9.20  (D59) <--  OV7670 D7
pub fn pin_config_nucleo() -> (
    CameraPins,
    (
        gpio::gpiob::PB8<Alternate<AF4>>,
        gpio::gpiob::PB9<Alternate<AF4>>,
    ),
    (
        gpio::gpiod::PD5<Alternate<AF7>>,
        gpio::gpiod::PD6<Alternate<AF7>>,
    ),
) {
    let pac_periph = unsafe { device::Peripherals::steal() };
    let gpioa = pac_periph.GPIOA.split();
    let gpiob = pac_periph.GPIOB.split();
    let gpioc = pac_periph.GPIOC.split();
    let gpiod = pac_periph.GPIOD.split();
    let gpioe = pac_periph.GPIOE.split();
    let gpiog = pac_periph.GPIOG.split();

    // Configure MCO2 for OV7670 XCLK
    let _xclk = gpioc.pc9.into_alternate_af0().set_speed(Speed::VeryHigh);

    // Configure I2C1 for OV7670 SCCB
    let scl = gpiob
        .pb8
        .into_alternate_af4()
        .internal_pull_up(true)
        .set_open_drain();
    let sda = gpiob
        .pb9
        .into_alternate_af4()
        .internal_pull_up(true)
        .set_open_drain();

    // Configure USART2 for the storage co-processor
    let tx = gpiod.pd5.into_alternate_af7();
    let rx = gpiod.pd6.into_alternate_af7();

    // Sync lines and data bus are polled, plain inputs
    let sync = SyncLines {
        vsync: CameraPin::Pg9(gpiog.pg9.into_floating_input()),
        href: CameraPin::Pa4(gpioa.pa4.into_floating_input()),
        pclk: CameraPin::Pa6(gpioa.pa6.into_floating_input()),
    };
    let data = [
        CameraPin::Pc6(gpioc.pc6.into_floating_input()),
        CameraPin::Pc7(gpioc.pc7.into_floating_input()),
        CameraPin::Pc8(gpioc.pc8.into_floating_input()),
        CameraPin::Pe1(gpioe.pe1.into_floating_input()),
        CameraPin::Pe4(gpioe.pe4.into_floating_input()),
        CameraPin::Pb6(gpiob.pb6.into_floating_input()),
        CameraPin::Pe5(gpioe.pe5.into_floating_input()),
        CameraPin::Pe6(gpioe.pe6.into_floating_input()),
    ];

    (CameraPins { sync, data }, (scl, sda), (tx, rx))
}
