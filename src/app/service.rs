//! Application service, the hexagonal core.
//!
//! [`Ventilator`] owns the cycle controller, the estimator, the event bus
//! and every adapter.  One owned value holds all state, so the control
//! loop needs no locks.
//!
//! ```text
//!  SensorSource ──▶ ┌───────────────────────────────┐ ──▶ Listeners
//!  ParameterSource ▶│          Ventilator            │
//!  Clock ─────────▶ │ Estimator · Controller · Bus   │
//!  Actuator ◀────── └───────────────────────────────┘
//! ```
//!
//! One [`run_once`](Ventilator::run_once) is one scheduler tick:
//!
//! 1. Sample sensors if the sample period has elapsed.
//! 2. Tick the controller (forced-stop check, phase update, actuators).
//! 3. Drain the event bus once.

use log::info;

use crate::alarms::AlarmIndex;
use crate::config::VentConfig;
use crate::cycle::context::{CyclePorts, CycleTiming};
use crate::cycle::{CycleController, Phase};
use crate::error::{EventError, TimingError};
use crate::events::{Event, EventBus, Listener};
use crate::sensors::PressureFlowEstimator;

use super::ports::{Actuator, Clock, ParameterSource, SensorSource};
use super::telemetry::TelemetrySnapshot;

// ───────────────────────────────────────────────────────────────
// Ventilator
// ───────────────────────────────────────────────────────────────

pub struct Ventilator<A, S, P, C> {
    controller: CycleController,
    estimator: PressureFlowEstimator,
    bus: EventBus,
    actuator: A,
    sensor: S,
    params: P,
    clock: C,
    sample_period_ms: u64,
    telemetry_interval_ms: u64,
    last_sample_ms: Option<u64>,
    last_telemetry_ms: Option<u64>,
    now_ms: u64,
}

impl<A, S, P, C> Ventilator<A, S, P, C>
where
    A: Actuator,
    S: SensorSource,
    P: ParameterSource,
    C: Clock,
{
    /// Assemble the core.  The controller starts in `Stopped`.
    pub fn new(config: &VentConfig, actuator: A, sensor: S, params: P, clock: C) -> Self {
        info!(
            "Ventilator up: actuator={:?} sample={}ms wait_to_out={}ms",
            config.actuator, config.sample_period_ms, config.wait_to_out_ms
        );
        Self {
            controller: CycleController::new(config),
            estimator: PressureFlowEstimator::from_config(config),
            bus: EventBus::new(),
            actuator,
            sensor,
            params,
            clock,
            sample_period_ms: u64::from(config.sample_period_ms),
            telemetry_interval_ms: u64::from(config.telemetry_interval_ms),
            last_sample_ms: None,
            last_telemetry_ms: None,
            now_ms: 0,
        }
    }

    /// Add a bus listener.  Startup only.
    pub fn register_listener(&mut self, listener: Box<dyn Listener>) -> Result<(), EventError> {
        self.bus.register(listener)
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// One scheduler tick: sample, control, dispatch.  Returns the number
    /// of events dispatched.
    pub fn run_once(&mut self) -> usize {
        self.now_ms = self.clock.now_ms();
        self.poll_sensors();
        self.step_controller();
        self.bus.drain_and_dispatch()
    }

    /// Sample unconditionally.
    pub fn sample(&mut self) {
        self.now_ms = self.clock.now_ms();
        self.sample_at(self.now_ms);
    }

    /// Sample if the sample period has elapsed.  Returns whether it did.
    pub fn poll_sensors(&mut self) -> bool {
        let due = self
            .last_sample_ms
            .is_none_or(|last| self.now_ms.saturating_sub(last) >= self.sample_period_ms);
        if due {
            self.sample_at(self.now_ms);
        }
        due
    }

    /// Controller tick only, at the current clock time.
    pub fn tick(&mut self) {
        self.now_ms = self.clock.now_ms();
        self.step_controller();
    }

    /// Deliver every queued event.
    pub fn drain_events(&mut self) -> usize {
        self.bus.drain_and_dispatch()
    }

    /// Start a breath now, from whatever phase.
    pub fn start_cycle(&mut self) -> Result<(), TimingError> {
        self.now_ms = self.clock.now_ms();
        let result = self.controller.start_cycle(CyclePorts {
            now_ms: self.now_ms,
            params: &self.params,
            actuator: &mut self.actuator,
            estimator: &mut self.estimator,
            bus: &mut self.bus,
        });
        if result.is_err() {
            self.bus.post(Event::Alarm(AlarmIndex::InvalidTiming));
        }
        result
    }

    /// Schedule a fast calibration.  Ignored while ventilation is off.
    pub fn request_fast_calibration(&mut self) -> bool {
        let enabled = self.params.ventilation_enabled();
        self.controller.request_fast_calibration(enabled, &mut self.bus)
    }

    /// Post an event from outside the core (UI keys).
    pub fn post(&mut self, event: Event) -> bool {
        self.bus.post(event)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn current_phase(&self) -> Phase {
        self.controller.current_phase()
    }

    pub fn current_progress(&self) -> u8 {
        self.controller.current_progress()
    }

    pub fn current_pressure(&self) -> f32 {
        self.estimator.current_pressure()
    }

    pub fn current_flow(&self) -> f32 {
        self.estimator.current_flow()
    }

    pub fn last_tidal_volume(&self) -> f32 {
        self.controller.last_tidal_volume()
    }

    pub fn timing(&self) -> CycleTiming {
        self.controller.timing()
    }

    pub fn controller(&self) -> &CycleController {
        &self.controller
    }

    pub fn estimator(&self) -> &PressureFlowEstimator {
        &self.estimator
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Snapshot for the UI / log sink.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            timestamp_ms: self.now_ms,
            phase: self.controller.current_phase(),
            progress: self.controller.current_progress(),
            pressure_cmh2o: self.estimator.current_pressure(),
            flow_lpm: self.estimator.current_flow(),
            tidal_ml: self.controller.last_tidal_volume(),
            peak_pressure_raw: self.estimator.peak_raw_pressure(),
            peak_flow_raw: self.estimator.peak_raw_flow(),
            breaths: self.controller.breaths(),
            fast_calibration_pending: self.controller.fast_calibration_pending(),
            dropped_events: self.bus.dropped(),
            sensor_failures: self.estimator.read_failures(),
        }
    }

    /// Snapshot, at most once per telemetry interval.
    pub fn telemetry_if_due(&mut self) -> Option<TelemetrySnapshot> {
        let due = self
            .last_telemetry_ms
            .is_none_or(|last| self.now_ms.saturating_sub(last) >= self.telemetry_interval_ms);
        if !due {
            return None;
        }
        self.last_telemetry_ms = Some(self.now_ms);
        Some(self.telemetry())
    }

    // ── Adapter access ────────────────────────────────────────

    pub fn params(&self) -> &P {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut P {
        &mut self.params
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    // ── Internal ──────────────────────────────────────────────

    fn sample_at(&mut self, now_ms: u64) {
        self.estimator.sample(&mut self.sensor, now_ms);
        self.last_sample_ms = Some(now_ms);
    }

    fn step_controller(&mut self) {
        self.controller.tick(CyclePorts {
            now_ms: self.now_ms,
            params: &self.params,
            actuator: &mut self.actuator,
            estimator: &mut self.estimator,
            bus: &mut self.bus,
        });
    }
}
