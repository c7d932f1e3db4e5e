//! Point-in-time telemetry snapshot.
//!
//! Built by [`Ventilator::telemetry`](super::service::Ventilator::telemetry)
//! for the UI and the log sink.  Serializable so an outer layer can ship
//! it however it likes.

use serde::Serialize;

use crate::cycle::Phase;

#[derive(Debug, Clone, Serialize)]
pub struct TelemetrySnapshot {
    pub timestamp_ms: u64,
    pub phase: Phase,
    pub progress: u8,
    /// Smoothed gauge pressure (cmH2O)
    pub pressure_cmh2o: f32,
    /// Smoothed flow (L/min)
    pub flow_lpm: f32,
    /// Last finalized tidal volume (mL)
    pub tidal_ml: f32,
    /// Largest raw pressure reading since the last stop
    pub peak_pressure_raw: f32,
    /// Largest raw flow reading since the last stop
    pub peak_flow_raw: f32,
    pub breaths: u32,
    pub fast_calibration_pending: bool,
    /// Events dropped on a full queue since startup
    pub dropped_events: u32,
    pub sensor_failures: u32,
}

impl TelemetrySnapshot {
    /// Compact JSON form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
