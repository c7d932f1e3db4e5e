//! Pressure/flow estimator.
//!
//! Owns one [`RollingChannel`] per physical quantity and the tidal-volume
//! integrator.  The cycle controller reads the smoothed values every tick
//! to decide transitions and alarms.
//!
//! ```text
//!  SensorSource ──raw──▶ calibration ──cmH2O / L/min──▶ RollingChannel ──▶ mean
//!                                                            │
//!                                          tidal integrator ◀┘ (flow × dt)
//! ```
//!
//! Individual read failures are logged and the channel keeps its previous
//! mean.  A single flaky conversion must not stall the control loop.

pub mod calibration;
pub mod channel;

use log::{debug, warn};

use crate::app::ports::SensorSource;
use crate::config::VentConfig;
use crate::error::SensorError;
use calibration::{FlowCalibration, PressureCalibration};
use channel::RollingChannel;

/// mL per (L/min · ms).
const ML_PER_LPM_MS: f32 = 1000.0 / 60_000.0;

#[derive(Debug, Clone, Copy, Default)]
struct TidalIntegrator {
    active: bool,
    /// Accumulated flow × time, in L/min·ms.
    accum: f32,
    last_ms: u64,
}

/// Smoothed pressure and flow plus per-breath tidal volume.
#[derive(Debug, Clone)]
pub struct PressureFlowEstimator {
    pressure_cal: PressureCalibration,
    flow_cal: FlowCalibration,
    pressure: RollingChannel,
    flow: RollingChannel,
    /// Latched pressure zero reference (cmH2O).
    zero_offset: f32,
    tidal: TidalIntegrator,
    read_failures: u32,
}

impl PressureFlowEstimator {
    pub fn new(pressure_cal: PressureCalibration, flow_cal: FlowCalibration) -> Self {
        Self {
            pressure_cal,
            flow_cal,
            pressure: RollingChannel::new(),
            flow: RollingChannel::new(),
            zero_offset: 0.0,
            tidal: TidalIntegrator::default(),
            read_failures: 0,
        }
    }

    pub fn from_config(config: &VentConfig) -> Self {
        Self::new(config.pressure_calibration, config.flow_calibration)
    }

    /// Read one value per channel, convert and fold it into the rolling
    /// means.  Accumulates tidal volume while integration is active.
    pub fn sample(&mut self, source: &mut dyn SensorSource, now_ms: u64) {
        match source.read_raw_pressure().and_then(finite) {
            Ok(raw) => self.pressure.push(raw, self.pressure_cal.to_cmh2o(raw)),
            Err(e) => self.note_failure("pressure", e),
        }
        match source.read_raw_flow().and_then(finite) {
            Ok(raw) => self.flow.push(raw, self.flow_cal.to_lpm(raw)),
            Err(e) => self.note_failure("flow", e),
        }

        if self.tidal.active {
            let dt_ms = now_ms.saturating_sub(self.tidal.last_ms);
            self.tidal.accum += self.flow.mean() * dt_ms as f32;
            self.tidal.last_ms = now_ms;
        }
    }

    /// Smoothed gauge pressure (cmH2O) relative to the latched zero.
    pub fn current_pressure(&self) -> f32 {
        self.pressure.mean() - self.zero_offset
    }

    /// Smoothed flow (L/min).
    pub fn current_flow(&self) -> f32 {
        self.flow.mean()
    }

    pub fn peak_raw_pressure(&self) -> f32 {
        self.pressure.peak_raw()
    }

    pub fn peak_raw_flow(&self) -> f32 {
        self.flow.peak_raw()
    }

    /// Reset the accumulator and begin integrating flow from `now_ms`.
    pub fn start_tidal_integration(&mut self, now_ms: u64) {
        self.tidal = TidalIntegrator {
            active: true,
            accum: 0.0,
            last_ms: now_ms,
        };
    }

    /// Stop integrating and return the breath's volume in mL.
    ///
    /// Negative net flow (leak or sensor offset) reports as zero.
    pub fn end_tidal_integration(&mut self) -> f32 {
        if !self.tidal.active {
            warn!("SENSOR tidal integration ended while inactive");
        }
        let ml = (self.tidal.accum * ML_PER_LPM_MS).max(0.0);
        self.tidal = TidalIntegrator::default();
        debug!("SENSOR tidal volume {:.0} mL", ml);
        ml
    }

    pub fn tidal_integration_active(&self) -> bool {
        self.tidal.active
    }

    /// Take the current raw pressure mean as the new zero reference.
    pub fn latch_zero_reference(&mut self) {
        self.zero_offset = self.pressure.mean();
        debug!("SENSOR zero reference latched at {:.2} cmH2O", self.zero_offset);
    }

    pub fn zero_reference(&self) -> f32 {
        self.zero_offset
    }

    /// Channel reads that failed since startup.
    pub fn read_failures(&self) -> u32 {
        self.read_failures
    }

    /// Clear the rolling windows and integrator.  The zero reference is
    /// kept; only calibration replaces it.
    pub fn reset(&mut self) {
        self.pressure.reset();
        self.flow.reset();
        self.tidal = TidalIntegrator::default();
    }

    fn note_failure(&mut self, channel: &str, e: SensorError) {
        self.read_failures = self.read_failures.saturating_add(1);
        warn!("SENSOR {channel} read failed: {e}");
    }
}

fn finite(raw: f32) -> Result<f32, SensorError> {
    if raw.is_finite() {
        Ok(raw)
    } else {
        Err(SensorError::OutOfRange)
    }
}
