//! Solenoid valve bank (inlet, outlet, auxiliary bleed).
//!
//! Generic over `embedded_hal::digital::OutputPin`, so the same driver runs
//! on `esp-idf-hal` pin drivers in production and on mock pins in tests.
//!
//! ## Safety contract
//!
//! The driver is a dumb actuator.  Sequencing (never inlet and outlet open
//! together) is the cycle controller's job.  A failed pin write is logged
//! and the commanded state is still recorded, so the next command retries.

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::app::ports::Actuator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveId {
    Inlet,
    Outlet,
    Bleed,
}

/// Commanded open/closed state of each valve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValveState {
    pub inlet: bool,
    pub outlet: bool,
    pub bleed: bool,
}

pub struct ValveActuator<IN, OUT, AUX> {
    inlet: IN,
    outlet: OUT,
    bleed: AUX,
    active_low: bool,
    state: ValveState,
    pin_errors: u32,
}

impl<IN, OUT, AUX> ValveActuator<IN, OUT, AUX>
where
    IN: OutputPin,
    OUT: OutputPin,
    AUX: OutputPin,
{
    /// Take ownership of the three pins and drive them closed.
    pub fn new(inlet: IN, outlet: OUT, bleed: AUX, active_low: bool) -> Self {
        let mut valves = Self {
            inlet,
            outlet,
            bleed,
            active_low,
            state: ValveState::default(),
            pin_errors: 0,
        };
        valves.close_all();
        valves
    }

    pub fn state(&self) -> ValveState {
        self.state
    }

    pub fn is_open(&self, valve: ValveId) -> bool {
        match valve {
            ValveId::Inlet => self.state.inlet,
            ValveId::Outlet => self.state.outlet,
            ValveId::Bleed => self.state.bleed,
        }
    }

    /// Failed pin writes since construction.
    pub fn pin_errors(&self) -> u32 {
        self.pin_errors
    }

    /// Give the pins back.
    pub fn release(self) -> (IN, OUT, AUX) {
        (self.inlet, self.outlet, self.bleed)
    }

    fn set(&mut self, valve: ValveId, open: bool) {
        let high = open != self.active_low;
        let ok = match valve {
            ValveId::Inlet => drive(&mut self.inlet, high),
            ValveId::Outlet => drive(&mut self.outlet, high),
            ValveId::Bleed => drive(&mut self.bleed, high),
        };
        if !ok {
            self.pin_errors = self.pin_errors.saturating_add(1);
            warn!("VALVE: {:?} write failed (open={})", valve, open);
        }
        match valve {
            ValveId::Inlet => self.state.inlet = open,
            ValveId::Outlet => self.state.outlet = open,
            ValveId::Bleed => self.state.bleed = open,
        }
    }
}

fn drive<P: OutputPin>(pin: &mut P, high: bool) -> bool {
    let result = if high { pin.set_high() } else { pin.set_low() };
    result.is_ok()
}

impl<IN, OUT, AUX> Actuator for ValveActuator<IN, OUT, AUX>
where
    IN: OutputPin,
    OUT: OutputPin,
    AUX: OutputPin,
{
    fn open_inlet(&mut self) {
        self.set(ValveId::Inlet, true);
    }

    fn close_inlet(&mut self) {
        self.set(ValveId::Inlet, false);
    }

    fn open_outlet(&mut self) {
        self.set(ValveId::Outlet, true);
    }

    fn close_outlet(&mut self) {
        self.set(ValveId::Outlet, false);
    }

    fn open_bleed(&mut self) {
        self.set(ValveId::Bleed, true);
    }

    fn close_bleed(&mut self) {
        self.set(ValveId::Bleed, false);
    }
}
