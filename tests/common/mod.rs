//! A simulated OV7670 for driving the capture loop on the host.
//!
//! The simulated sensor is lock-stepped to the driver: every read of VSYNC, HREF or PCLK returns
//! the current tick of a prepared waveform and moves on to the next one, data lines return the
//! byte of the last tick observed. Past the end of the waveform VSYNC stays high and PCLK
//! keeps toggling.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use embedded_hal::blocking::i2c;
use embedded_hal::serial;
use embedded_hal::digital::v2::InputPin;
use embedded_hal_mock::delay::MockNoop;

use ov7670_rs::frame::Mode;
use ov7670_rs::ov7670::{DigitalLineGroup, MasterClock, Ov7670, SyncLines};

pub const SYSCLK_HZ: u32 = 216_000_000;
pub const MCLK_HZ: u32 = 43_200_000;

#[derive(Clone, Copy, Debug, Default)]
pub struct Tick {
    pub vsync: bool,
    pub href: bool,
    pub pclk: bool,
    pub data: u8,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    Vsync,
    Href,
    Pclk,
    Data(u8),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PinFault;

#[derive(Default)]
pub struct Sim {
    ticks: Vec<Tick>,
    position: usize,
    data: u8,
    pub fault: Option<Role>,
}

impl Sim {
    pub fn load(&mut self, ticks: Vec<Tick>) {
        self.ticks = ticks;
        self.position = 0;
        self.data = 0;
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn advance(&mut self) -> Tick {
        let tick = self.ticks.get(self.position).copied().unwrap_or(Tick {
            vsync: true,
            href: false,
            pclk: self.position % 2 == 0,
            data: 0,
        });
        self.position += 1;
        self.data = tick.data;
        tick
    }
}

pub struct SimPin {
    sim: Rc<RefCell<Sim>>,
    role: Role,
}

impl InputPin for SimPin {
    type Error = PinFault;

    fn is_high(&self) -> Result<bool, PinFault> {
        let mut sim = self.sim.borrow_mut();
        if sim.fault == Some(self.role) {
            return Err(PinFault);
        }

        Ok(match self.role {
            Role::Data(bit) => (sim.data >> bit) & 1 == 1,
            Role::Vsync => sim.advance().vsync,
            Role::Href => sim.advance().href,
            Role::Pclk => sim.advance().pclk,
        })
    }

    fn is_low(&self) -> Result<bool, PinFault> {
        self.is_high().map(|high| !high)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BusFault;

/// Register file behind the simulated SCCB port, with a log of every write.
pub struct Registers {
    pub values: HashMap<u8, u8>,
    pub writes: Vec<(u8, Vec<u8>)>,
    pointer: u8,
    /// Number of writes still accepted before the bus starts failing.
    pub writes_left: Option<usize>,
}

impl Default for Registers {
    fn default() -> Self {
        let mut values = HashMap::new();
        values.insert(0x0A, 0x76);
        values.insert(0x0B, 0x73);
        Registers {
            values,
            writes: Vec::new(),
            pointer: 0,
            writes_left: None,
        }
    }
}

impl Registers {
    /// Register writes as `(reg, val)` pairs, address-only writes left out.
    pub fn register_writes(&self) -> Vec<(u8, u8)> {
        self.writes
            .iter()
            .filter(|(_, bytes)| bytes.len() == 2)
            .map(|(_, bytes)| (bytes[0], bytes[1]))
            .collect()
    }
}

pub struct SimBus(Rc<RefCell<Registers>>);

impl i2c::Write for SimBus {
    type Error = BusFault;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), BusFault> {
        let mut regs = self.0.borrow_mut();
        if let Some(left) = regs.writes_left {
            if left == 0 {
                return Err(BusFault);
            }
            regs.writes_left = Some(left - 1);
        }

        regs.writes.push((address, bytes.to_vec()));
        match *bytes {
            [reg] => regs.pointer = reg,
            [reg, val] => {
                regs.values.insert(reg, val);
            }
            _ => return Err(BusFault),
        }
        Ok(())
    }
}

impl i2c::Read for SimBus {
    type Error = BusFault;

    fn read(&mut self, _address: u8, buffer: &mut [u8]) -> Result<(), BusFault> {
        let regs = self.0.borrow();
        let value = regs.values.get(&regs.pointer).copied().unwrap_or(0);
        buffer.iter_mut().for_each(|b| *b = value);
        Ok(())
    }
}

/// MCO2 style clock output: SYSCLK through a 1..=5 prescaler.
pub struct FakeClock(Rc<Cell<Option<u32>>>);

impl MasterClock for FakeClock {
    fn source_hz(&self) -> u32 {
        SYSCLK_HZ
    }

    fn max_divider(&self) -> u32 {
        5
    }

    fn enable(&mut self, divider: u32) {
        self.0.set(Some(divider));
    }
}

/// Serial port to the storage co-processor, failing every write once `limit` bytes are out.
#[derive(Default)]
pub struct SerialTap {
    pub sent: Vec<u8>,
    pub limit: Option<usize>,
}

impl serial::Write<u8> for SerialTap {
    type Error = BusFault;

    fn write(&mut self, word: u8) -> nb::Result<(), BusFault> {
        if self.limit.map_or(false, |limit| self.sent.len() >= limit) {
            return Err(nb::Error::Other(BusFault));
        }
        self.sent.push(word);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), BusFault> {
        Ok(())
    }
}

pub type Sensor = Ov7670<SimBus, SimPin, FakeClock, MockNoop>;

pub struct Rig {
    pub sensor: Sensor,
    pub sim: Rc<RefCell<Sim>>,
    pub regs: Rc<RefCell<Registers>>,
    pub divider: Rc<Cell<Option<u32>>>,
}

pub fn rig() -> Rig {
    let sim = Rc::new(RefCell::new(Sim::default()));
    let regs = Rc::new(RefCell::new(Registers::default()));
    let divider = Rc::new(Cell::new(None));

    let pin = |role| SimPin {
        sim: sim.clone(),
        role,
    };
    let sync = SyncLines {
        vsync: pin(Role::Vsync),
        href: pin(Role::Href),
        pclk: pin(Role::Pclk),
    };
    let data = DigitalLineGroup::new(core::array::from_fn(|bit| pin(Role::Data(bit as u8))));

    let sensor = Ov7670::new(
        SimBus(regs.clone()),
        sync,
        data,
        FakeClock(divider.clone()),
        MockNoop::new(),
    );

    Rig {
        sensor,
        sim,
        regs,
        divider,
    }
}

/// Initialized and configured for `mode`, with the register log cleared.
pub fn configured(mode: Mode) -> Rig {
    let mut rig = rig();
    rig.sensor.initialize(MCLK_HZ).unwrap();
    rig.sensor.configure(mode.format, mode.resolution).unwrap();
    rig.regs.borrow_mut().writes.clear();
    rig
}

fn hold(ticks: &mut Vec<Tick>, count: usize, tick: Tick) {
    ticks.extend(std::iter::repeat(tick).take(count));
}

/// One frame of `rows` rows for `mode`. The sensor always sends two bytes per pixel,
/// `sample(row, column, half)` gives each of them. With `ends_early` VSYNC asserts during the
/// blanking after the last row.
pub fn waveform(
    mode: Mode,
    rows: u16,
    ends_early: bool,
    sample: impl Fn(u16, u16, u8) -> u8,
) -> Vec<Tick> {
    let (width, _) = mode.resolution.dimensions();
    let idle = Tick {
        pclk: true,
        ..Tick::default()
    };
    let mut ticks = Vec::new();

    // Tail of the previous frame, then the VSYNC pulse and vertical blanking
    hold(&mut ticks, 3, idle);
    hold(&mut ticks, 4, Tick { vsync: true, ..idle });
    hold(&mut ticks, 6, idle);

    for row in 0..rows {
        let active = Tick { href: true, ..idle };
        hold(&mut ticks, 2, active);

        for column in 0..width {
            for half in 0..2 {
                let data = sample(row, column, half);
                hold(&mut ticks, 2, Tick { pclk: false, data, ..active });
                hold(&mut ticks, 2, Tick { data, ..active });
            }
        }

        let vsync = ends_early && row + 1 == rows;
        hold(&mut ticks, 6, Tick { vsync, ..idle });
    }

    ticks
}

/// A complete frame for `mode`.
pub fn full_frame(mode: Mode, sample: impl Fn(u16, u16, u8) -> u8) -> Vec<Tick> {
    let (_, height) = mode.resolution.dimensions();
    waveform(mode, height, false, sample)
}
