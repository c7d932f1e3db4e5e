//! System configuration parameters
//!
//! Two layers:
//!
//! - [`VentConfig`]: device configuration fixed at startup: phase timer
//!   constants, loop cadences, actuator variant and sensor calibration.
//! - [`VentSettings`]: clinician-adjustable breathing parameters.  The
//!   controller snapshots them at the start of every breath.
//!
//! Both can be loaded from JSON and must pass `validate()` before use.

use serde::{Deserialize, Serialize};

use crate::app::ports::ParameterSource;
use crate::cycle::context::CycleParameters;
use crate::error::ConfigError;
use crate::sensors::calibration::{FlowCalibration, PressureCalibration};

/// Which actuator family drives the breath.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActuatorKind {
    /// Solenoid valves timed by the controller.
    TimedValves,
    /// Mechanical squeezer that reports stroke progress.
    Motion,
}

/// Device configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VentConfig {
    // --- Phase timers ---
    /// Valve-switch settling window between inspiration and expiration (ms)
    pub wait_to_out_ms: u32,
    /// Duration of the Stopping phase (ms)
    pub stopping_ms: u32,
    /// Duration of initial and fast calibration (ms)
    pub calibration_ms: u32,

    // --- Cadence ---
    /// Estimator sample period (ms)
    pub sample_period_ms: u32,
    /// Controller tick interval (ms)
    pub control_interval_ms: u32,
    /// Telemetry log interval (ms)
    pub telemetry_interval_ms: u32,

    // --- Hardware ---
    pub actuator: ActuatorKind,
    /// Drive valve pins low to energise
    pub valves_active_low: bool,
    pub pressure_calibration: PressureCalibration,
    pub flow_calibration: FlowCalibration,
}

impl Default for VentConfig {
    fn default() -> Self {
        Self {
            wait_to_out_ms: 200,
            stopping_ms: 4000,
            calibration_ms: 4000,

            sample_period_ms: 20,       // 50 Hz
            control_interval_ms: 10,    // 100 Hz
            telemetry_interval_ms: 1000,

            actuator: ActuatorKind::TimedValves,
            valves_active_low: false,
            pressure_calibration: PressureCalibration::default(),
            flow_calibration: FlowCalibration::default(),
        }
    }
}

impl VentConfig {
    /// Analog sensor board read through ADC1: MPXV7010 gauge and the
    /// standard orifice flow sensor.
    pub fn analog_board() -> Self {
        Self {
            pressure_calibration: PressureCalibration::STANDARD_GAUGE,
            flow_calibration: FlowCalibration::STANDARD_ORIFICE,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|_| ConfigError::Corrupted)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wait_to_out_ms == 0 {
            return Err(ConfigError::ValidationFailed("wait_to_out_ms must be > 0"));
        }
        if self.stopping_ms == 0 {
            return Err(ConfigError::ValidationFailed("stopping_ms must be > 0"));
        }
        if self.calibration_ms == 0 {
            return Err(ConfigError::ValidationFailed("calibration_ms must be > 0"));
        }
        if self.sample_period_ms == 0 || self.control_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("loop periods must be > 0"));
        }
        self.pressure_calibration.validate()?;
        self.flow_calibration.validate()?;
        Ok(())
    }

    /// `validate()` plus the front-end check for a source that delivers
    /// ADC counts: both channels need a converting calibration, or every
    /// threshold would be compared against raw counts.
    pub fn validate_for_adc(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if self.pressure_calibration.is_direct() || self.flow_calibration.is_direct() {
            return Err(ConfigError::ValidationFailed(
                "ADC front end needs converting pressure and flow calibrations",
            ));
        }
        Ok(())
    }
}

/// Clinician-adjustable breathing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VentSettings {
    /// Ventilation switched on
    pub enabled: bool,
    /// Breaths per minute (10-30)
    pub bpm: u8,
    /// Index into the I:E rate table (0-3)
    pub duty_index: u8,
    /// Pause after expiration (0-2000 ms)
    pub pause_ms: u32,
    /// Low inspiratory pressure alarm (cmH2O, 1-15)
    pub low_pressure_cmh2o: f32,
    /// High inspiratory pressure alarm (cmH2O, 10-40)
    pub high_pressure_cmh2o: f32,
    /// Low tidal volume alarm (mL, 0-1400)
    pub low_tidal_ml: f32,
    /// High tidal volume alarm (mL, 0-1400)
    pub high_tidal_ml: f32,
    /// PEEP target (cmH2O, 1-25)
    pub peep_cmh2o: f32,
}

impl Default for VentSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            bpm: 15,
            duty_index: 1,
            pause_ms: 100,
            low_pressure_cmh2o: 5.0,
            high_pressure_cmh2o: 35.0,
            low_tidal_ml: 200.0,
            high_tidal_ml: 800.0,
            peep_cmh2o: 5.0,
        }
    }
}

/// Number of entries in the I:E rate table.
pub const DUTY_CYCLE_COUNT: u8 = 4;

impl VentSettings {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(json).map_err(|_| ConfigError::Corrupted)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Range checks.  Out-of-range values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(10..=30).contains(&self.bpm) {
            return Err(ConfigError::ValidationFailed("bpm must be 10-30"));
        }
        if self.duty_index >= DUTY_CYCLE_COUNT {
            return Err(ConfigError::ValidationFailed("duty_index must be 0-3"));
        }
        if self.pause_ms > 2000 {
            return Err(ConfigError::ValidationFailed("pause_ms must be 0-2000"));
        }
        if !(1.0..=15.0).contains(&self.low_pressure_cmh2o) {
            return Err(ConfigError::ValidationFailed("low_pressure_cmh2o must be 1-15"));
        }
        if !(10.0..=40.0).contains(&self.high_pressure_cmh2o) {
            return Err(ConfigError::ValidationFailed("high_pressure_cmh2o must be 10-40"));
        }
        if self.low_pressure_cmh2o >= self.high_pressure_cmh2o {
            return Err(ConfigError::ValidationFailed(
                "low pressure alarm must be below high pressure alarm",
            ));
        }
        if !(0.0..=1400.0).contains(&self.low_tidal_ml)
            || !(0.0..=1400.0).contains(&self.high_tidal_ml)
        {
            return Err(ConfigError::ValidationFailed("tidal alarms must be 0-1400 mL"));
        }
        if self.low_tidal_ml > self.high_tidal_ml {
            return Err(ConfigError::ValidationFailed(
                "low tidal alarm must not exceed high tidal alarm",
            ));
        }
        if !(1.0..=25.0).contains(&self.peep_cmh2o) {
            return Err(ConfigError::ValidationFailed("peep_cmh2o must be 1-25"));
        }
        Ok(())
    }
}

impl ParameterSource for VentSettings {
    fn ventilation_enabled(&self) -> bool {
        self.enabled
    }

    fn cycle_parameters(&self) -> CycleParameters {
        CycleParameters {
            bpm: self.bpm,
            duty_index: self.duty_index,
            pause_ms: self.pause_ms,
            low_pressure_cmh2o: self.low_pressure_cmh2o,
            high_pressure_cmh2o: self.high_pressure_cmh2o,
            low_tidal_ml: self.low_tidal_ml,
            high_tidal_ml: self.high_tidal_ml,
            peep_cmh2o: self.peep_cmh2o,
        }
    }
}
