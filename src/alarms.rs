//! Alarm indices and the alarm latch.
//!
//! The cycle controller posts [`Event::Alarm`] on every tick a condition
//! holds.  [`AlarmLatch`] turns that stream into latched state:
//!
//! 1. A fault alarm arrives; the latch sets its bit in the mask.
//! 2. On the first set of a bit the latch posts `AlarmDisplayOn(message)`.
//! 3. Repeats of an already-latched alarm are absorbed.
//! 4. A `KeyPress(Set)` acknowledges everything: the mask clears and
//!    `AlarmDisplayOff` is posted.
//!
//! Informational indices (calibration requested / done) pass through
//! without latching.

use core::cell::Cell;
use core::fmt;
use std::rc::Rc;

use log::{error, info};

use crate::events::{Event, EventQueue, Key, Listener, Propagation};

/// Alarm identifiers carried by [`Event::Alarm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AlarmIndex {
    LowPressure = 0,
    HighPressure = 1,
    LowTidalVolume = 2,
    HighTidalVolume = 3,
    /// Fast calibration accepted; runs at the end of the next expiration.
    CalibrationRequested = 4,
    /// Fast calibration finished and the zero reference was re-latched.
    CalibrationDone = 5,
    /// Breath timing could not be derived from the current parameters.
    InvalidTiming = 6,
}

impl AlarmIndex {
    pub const ALL: [Self; 7] = [
        Self::LowPressure,
        Self::HighPressure,
        Self::LowTidalVolume,
        Self::HighTidalVolume,
        Self::CalibrationRequested,
        Self::CalibrationDone,
        Self::InvalidTiming,
    ];

    /// Bit for this alarm in a latch mask.
    pub const fn mask(self) -> u8 {
        1 << (self as u8)
    }

    /// Patient-safety faults latch; calibration notices do not.
    pub const fn is_fault(self) -> bool {
        !matches!(self, Self::CalibrationRequested | Self::CalibrationDone)
    }

    /// Short display text (fits a 20-column LCD row).
    pub const fn message(self) -> &'static str {
        match self {
            Self::LowPressure => "LOW PRESSURE",
            Self::HighPressure => "HIGH PRESSURE",
            Self::LowTidalVolume => "LOW TIDAL VOLUME",
            Self::HighTidalVolume => "HIGH TIDAL VOLUME",
            Self::CalibrationRequested => "CALIBRATION PENDING",
            Self::CalibrationDone => "CALIBRATION DONE",
            Self::InvalidTiming => "INVALID TIMING",
        }
    }
}

impl fmt::Display for AlarmIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Read-only view of the latch, for the UI and telemetry.
#[derive(Debug, Clone, Default)]
pub struct AlarmStatus {
    latched: Rc<Cell<u8>>,
}

impl AlarmStatus {
    /// Latched fault bitmask.
    pub fn mask(&self) -> u8 {
        self.latched.get()
    }

    pub fn any(&self) -> bool {
        self.latched.get() != 0
    }

    pub fn is_latched(&self, alarm: AlarmIndex) -> bool {
        self.latched.get() & alarm.mask() != 0
    }

    /// Latched alarms in index order.
    pub fn active(&self) -> impl Iterator<Item = AlarmIndex> + '_ {
        AlarmIndex::ALL
            .into_iter()
            .filter(move |a| self.is_latched(*a))
    }
}

/// Bus listener that latches fault alarms until acknowledged.
#[derive(Debug, Default)]
pub struct AlarmLatch {
    latched: Rc<Cell<u8>>,
}

impl AlarmLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle sharing this latch's state.  Take it before boxing the
    /// latch into the bus.
    pub fn status(&self) -> AlarmStatus {
        AlarmStatus {
            latched: self.latched.clone(),
        }
    }

    fn latch(&mut self, alarm: AlarmIndex, queue: &mut EventQueue) {
        let mask = self.latched.get();
        if mask & alarm.mask() != 0 {
            return;
        }
        error!("ALARM latched: {alarm}");
        self.latched.set(mask | alarm.mask());
        queue.post(Event::display_text(alarm.message()));
    }

    fn acknowledge(&mut self, queue: &mut EventQueue) {
        if self.latched.get() == 0 {
            return;
        }
        info!("ALARM acknowledged (mask=0b{:08b})", self.latched.get());
        self.latched.set(0);
        queue.post(Event::AlarmDisplayOff);
    }
}

impl Listener for AlarmLatch {
    fn on_event(&mut self, event: &Event, queue: &mut EventQueue) -> Propagation {
        match event {
            Event::Alarm(alarm) if alarm.is_fault() => self.latch(*alarm, queue),
            Event::KeyPress(Key::Set) => self.acknowledge(queue),
            _ => {}
        }
        Propagation::Continue
    }
}
