//! Raw-reading to physical-unit conversions.
//!
//! The front end is picked by configuration, so one estimator covers every
//! sensor board.  All results are in the units the controller compares
//! against: cmH2O for pressure and L/min for flow.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Volts per count of a 10-bit converter on a 5 V reference.
const VOLTS_PER_COUNT: f32 = 5.0 / 1023.0;

/// cmH2O per inH2O.
const CMH2O_PER_INH2O: f32 = 2.54;

/// inH2O per kPa.
const INH2O_PER_KPA: f32 = 4.01463;

/// Pressure front end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum PressureCalibration {
    /// Reading is already gauge cmH2O (digital barometric front end).
    #[default]
    Direct,
    /// Ratiometric analog gauge sensor (MPXV7010 family): output is
    /// `Vs * (0.09 * kPa + 0.08)`.
    AnalogGauge {
        /// ADC counts corresponding to the supply voltage.
        counts_at_supply: f32,
    },
    /// `cmH2O = raw * scale + offset`.
    Linear { scale: f32, offset: f32 },
}

impl PressureCalibration {
    /// MPXV7010 on a 3 V supply read by a 10-bit, 5 V converter.
    pub const STANDARD_GAUGE: Self = Self::AnalogGauge {
        counts_at_supply: 614.0,
    };

    /// Convert one raw reading to cmH2O.
    pub fn to_cmh2o(&self, raw: f32) -> f32 {
        match *self {
            Self::Direct => raw,
            Self::AnalogGauge { counts_at_supply } => {
                let kpa = (raw / counts_at_supply - 0.08) / 0.09;
                kpa * INH2O_PER_KPA * CMH2O_PER_INH2O
            }
            Self::Linear { scale, offset } => raw * scale + offset,
        }
    }

    /// Whether raw readings pass through unconverted.
    pub fn is_direct(&self) -> bool {
        matches!(self, Self::Direct)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Direct => Ok(()),
            Self::AnalogGauge { counts_at_supply } => {
                if counts_at_supply.is_finite() && counts_at_supply > 0.0 {
                    Ok(())
                } else {
                    Err(ConfigError::ValidationFailed("counts_at_supply must be > 0"))
                }
            }
            Self::Linear { scale, offset } => {
                if scale.is_finite() && offset.is_finite() && scale != 0.0 {
                    Ok(())
                } else {
                    Err(ConfigError::ValidationFailed("linear scale must be finite and non-zero"))
                }
            }
        }
    }
}

/// Flow front end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum FlowCalibration {
    /// Reading is already L/min.
    #[default]
    Direct,
    /// Differential pressure sensor (0.2-4.7 V over 0-700 kPa) across an
    /// orifice.  Velocity from Bernoulli, flow from the pipe cross-section.
    Orifice { pipe_radius_m: f32, air_density: f32 },
    /// Automotive mass-airflow sensor with a linear mV/flow relation:
    /// `flow = (intercept - mV) / slope`.
    MassAirflow { intercept_mv: f32, slope_mv_per_lpm: f32 },
}

impl FlowCalibration {
    /// Quarter-inch pipe, sea-level air.
    pub const STANDARD_ORIFICE: Self = Self::Orifice {
        pipe_radius_m: 0.00635,
        air_density: 1.225,
    };

    /// Convert one raw reading to L/min.
    pub fn to_lpm(&self, raw: f32) -> f32 {
        match *self {
            Self::Direct => raw,
            Self::Orifice {
                pipe_radius_m,
                air_density,
            } => {
                let volts = raw * VOLTS_PER_COUNT;
                let kpa = (volts - 0.2) / 4.5 * 700.0;
                let pa = (kpa * 1000.0).abs();
                let velocity = (2.0 * pa / air_density).sqrt();
                let m3_per_s = velocity * core::f32::consts::PI * pipe_radius_m * pipe_radius_m;
                m3_per_s * 60_000.0
            }
            Self::MassAirflow {
                intercept_mv,
                slope_mv_per_lpm,
            } => {
                let mv = raw * VOLTS_PER_COUNT * 1000.0;
                (intercept_mv - mv) / slope_mv_per_lpm
            }
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, Self::Direct)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Direct => Ok(()),
            Self::Orifice {
                pipe_radius_m,
                air_density,
            } => {
                if pipe_radius_m > 0.0 && air_density > 0.0 {
                    Ok(())
                } else {
                    Err(ConfigError::ValidationFailed("orifice geometry must be positive"))
                }
            }
            Self::MassAirflow {
                intercept_mv,
                slope_mv_per_lpm,
            } => {
                if intercept_mv.is_finite() && slope_mv_per_lpm.is_finite() && slope_mv_per_lpm != 0.0
                {
                    Ok(())
                } else {
                    Err(ConfigError::ValidationFailed("MAF slope must be finite and non-zero"))
                }
            }
        }
    }
}
