//! Port traits: the hexagonal boundary between the ventilation core and
//! the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Ventilator (domain)
//! ```
//!
//! Driven adapters (valves, squeezer motor, ADC front end, parameter store,
//! clock) implement these traits.  The [`Ventilator`](super::service::Ventilator)
//! consumes them via generics, so the domain core never touches hardware
//! directly and the whole loop runs on the host under test.

use crate::cycle::context::CycleParameters;
use crate::error::SensorError;

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond time source.
pub trait Clock {
    /// Milliseconds since an arbitrary epoch.  Never goes backwards.
    fn now_ms(&mut self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Raw readings from the pressure and flow front ends.  Conversion to
/// physical units happens in the estimator.
pub trait SensorSource {
    fn read_raw_pressure(&mut self) -> Result<f32, SensorError>;
    fn read_raw_flow(&mut self) -> Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Parameter port (driven adapter: UI / storage → domain)
// ───────────────────────────────────────────────────────────────

/// Clinician settings as seen by the controller.
pub trait ParameterSource {
    /// Master enable.  Dropping this forces a stop within one tick.
    fn ventilation_enabled(&self) -> bool;

    /// Current breathing parameters.  Snapshotted at every breath start.
    fn cycle_parameters(&self) -> CycleParameters;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Valve commands.  Every call is idempotent.
pub trait Actuator {
    fn open_inlet(&mut self);
    fn close_inlet(&mut self);

    fn open_outlet(&mut self);
    fn close_outlet(&mut self);

    /// Auxiliary pressure-line valve, open for the duration of a breath.
    fn open_bleed(&mut self);
    fn close_bleed(&mut self);

    /// Close inlet, outlet and bleed.
    fn close_all(&mut self) {
        self.close_inlet();
        self.close_outlet();
        self.close_bleed();
    }

    /// Stroke-driven actuators expose their drive here.  Timed valves
    /// return `None` and the controller times the phases itself.
    fn motion(&mut self) -> Option<&mut dyn MotionDrive> {
        None
    }
}

/// A mechanical drive that runs timed strokes and reports progress.
pub trait MotionDrive {
    /// Start the compression stroke, to complete in `duration_ms`.
    fn begin_inspiration(&mut self, duration_ms: u32);

    /// Start the return stroke, to complete in `duration_ms`.
    fn begin_expiration(&mut self, duration_ms: u32);

    /// Progress of the current stroke, 0..=100.
    fn progress(&mut self) -> u8;
}
