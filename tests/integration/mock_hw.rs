//! Mock hardware for integration tests.
//!
//! Records every valve command so tests can assert on the full command
//! history without touching real GPIO registers, and drives the whole
//! [`Ventilator`] from a manual clock.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ventcore::alarms::{AlarmIndex, AlarmLatch, AlarmStatus};
use ventcore::app::ports::{Actuator, Clock, SensorSource};
use ventcore::app::service::Ventilator;
use ventcore::config::{VentConfig, VentSettings};
use ventcore::cycle::Phase;
use ventcore::error::SensorError;
use ventcore::events::{Event, EventQueue, Listener, Propagation};

// ── Valve call record ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveCall {
    OpenInlet,
    CloseInlet,
    OpenOutlet,
    CloseOutlet,
    OpenBleed,
    CloseBleed,
}

// ── MockActuator ──────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockActuator {
    pub calls: Vec<ValveCall>,
    pub inlet: bool,
    pub outlet: bool,
    pub bleed: bool,
}

#[allow(dead_code)]
impl MockActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all_closed(&self) -> bool {
        !self.inlet && !self.outlet && !self.bleed
    }

    pub fn count(&self, call: ValveCall) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }
}

impl Actuator for MockActuator {
    fn open_inlet(&mut self) {
        self.calls.push(ValveCall::OpenInlet);
        self.inlet = true;
    }

    fn close_inlet(&mut self) {
        self.calls.push(ValveCall::CloseInlet);
        self.inlet = false;
    }

    fn open_outlet(&mut self) {
        self.calls.push(ValveCall::OpenOutlet);
        self.outlet = true;
    }

    fn close_outlet(&mut self) {
        self.calls.push(ValveCall::CloseOutlet);
        self.outlet = false;
    }

    fn open_bleed(&mut self) {
        self.calls.push(ValveCall::OpenBleed);
        self.bleed = true;
    }

    fn close_bleed(&mut self) {
        self.calls.push(ValveCall::CloseBleed);
        self.bleed = false;
    }
}

// ── ScriptedSensor ────────────────────────────────────────────

/// Raw readings set by the test.  With the default `Direct` calibrations
/// raw values are already cmH2O and L/min.
#[derive(Debug, Default)]
pub struct ScriptedSensor {
    pub pressure: f32,
    pub flow: f32,
    pub fail: bool,
}

impl SensorSource for ScriptedSensor {
    fn read_raw_pressure(&mut self) -> Result<f32, SensorError> {
        if self.fail {
            return Err(SensorError::AdcReadFailed);
        }
        Ok(self.pressure)
    }

    fn read_raw_flow(&mut self) -> Result<f32, SensorError> {
        if self.fail {
            return Err(SensorError::AdcReadFailed);
        }
        Ok(self.flow)
    }
}

// ── ManualClock ───────────────────────────────────────────────

/// Shared millisecond counter; clones see the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Rc<Cell<u64>>);

#[allow(dead_code)]
impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u64 {
        self.0.get()
    }

    pub fn set(&self, ms: u64) {
        self.0.set(ms);
    }

    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&mut self) -> u64 {
        self.0.get()
    }
}

// ── RecordingListener ─────────────────────────────────────────

/// Appends every event it sees to a shared log.
pub struct RecordingListener {
    pub log: Rc<RefCell<Vec<Event>>>,
    pub stop_on: Option<Event>,
}

#[allow(dead_code)]
impl RecordingListener {
    pub fn new() -> (Self, Rc<RefCell<Vec<Event>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                log: log.clone(),
                stop_on: None,
            },
            log,
        )
    }
}

impl Listener for RecordingListener {
    fn on_event(&mut self, event: &Event, _queue: &mut EventQueue) -> Propagation {
        self.log.borrow_mut().push(event.clone());
        if self.stop_on.as_ref() == Some(event) {
            Propagation::Stop
        } else {
            Propagation::Continue
        }
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// Control-loop step used by [`Rig::step`].
pub const STEP_MS: u64 = 10;

pub struct Rig<A: Actuator = MockActuator> {
    pub vent: Ventilator<A, ScriptedSensor, VentSettings, ManualClock>,
    pub clock: ManualClock,
    pub events: Rc<RefCell<Vec<Event>>>,
    pub alarms: AlarmStatus,
}

#[allow(dead_code)]
impl Rig<MockActuator> {
    /// Default config and settings, ventilation off, flow 30 L/min.
    pub fn new() -> Self {
        Self::with(&VentConfig::default(), MockActuator::new(), ManualClock::new())
    }
}

#[allow(dead_code)]
impl<A: Actuator> Rig<A> {
    pub fn with(config: &VentConfig, actuator: A, clock: ManualClock) -> Self {
        let sensor = ScriptedSensor {
            pressure: 0.0,
            flow: 30.0,
            fail: false,
        };
        let mut vent = Ventilator::new(
            config,
            actuator,
            sensor,
            VentSettings::default(),
            clock.clone(),
        );
        let (recorder, events) = RecordingListener::new();
        let latch = AlarmLatch::new();
        let alarms = latch.status();
        vent.register_listener(Box::new(recorder)).unwrap();
        vent.register_listener(Box::new(latch)).unwrap();
        Self {
            vent,
            clock,
            events,
            alarms,
        }
    }

    /// Advance the clock one step and run one loop iteration.
    pub fn step(&mut self) {
        self.clock.advance(STEP_MS);
        self.vent.run_once();
    }

    pub fn run_for(&mut self, ms: u64) {
        for _ in 0..ms / STEP_MS {
            self.step();
        }
    }

    /// Step until `phase` is current.  Returns `false` after `limit_ms`.
    pub fn run_until(&mut self, phase: Phase, limit_ms: u64) -> bool {
        let deadline = self.clock.get() + limit_ms;
        while self.vent.current_phase() != phase {
            if self.clock.get() >= deadline {
                return false;
            }
            self.step();
        }
        true
    }

    /// Enable, calibrate at zero pressure, then raise pressure to a
    /// healthy inspiratory level.  Returns in `Pause`.
    pub fn calibrated(mut self) -> Self {
        self.vent.params_mut().enabled = true;
        assert!(self.run_until(Phase::Pause, 5_000), "calibration never finished");
        self.vent.sensor_mut().pressure = 20.0;
        self
    }

    pub fn set_pressure(&mut self, cmh2o: f32) {
        self.vent.sensor_mut().pressure = cmh2o;
    }

    pub fn set_flow(&mut self, lpm: f32) {
        self.vent.sensor_mut().flow = lpm;
    }

    pub fn alarm_count(&self, alarm: AlarmIndex) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| **e == Event::Alarm(alarm))
            .count()
    }

    pub fn saw(&self, event: &Event) -> bool {
        self.events.borrow().contains(event)
    }

    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }
}
