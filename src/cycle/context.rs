//! Breath parameters, derived timing, and the context threaded through
//! every phase handler.
//!
//! `CycleContext` is the "blackboard" the handlers read from and write to:
//! the current time, the ports for this tick, the controller's own
//! [`CycleState`], and the fixed phase timers.

use crate::app::ports::{Actuator, ParameterSource};
use crate::config::{DUTY_CYCLE_COUNT, VentConfig};
use crate::error::TimingError;
use crate::events::{Event, EventBus};
use crate::sensors::PressureFlowEstimator;

/// I:E rate table, indexed by duty-cycle index.
pub const RATE_TABLE: [i32; DUTY_CYCLE_COUNT as usize] = [1, 2, 3, 4];

const MINUTE_MS: i32 = 60_000;

// ---------------------------------------------------------------------------
// Parameters (snapshotted per breath)
// ---------------------------------------------------------------------------

/// Clinician parameters, copied at the start of every breath so a live
/// change only takes effect on the next one.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CycleParameters {
    pub bpm: u8,
    pub duty_index: u8,
    pub pause_ms: u32,
    pub low_pressure_cmh2o: f32,
    pub high_pressure_cmh2o: f32,
    pub low_tidal_ml: f32,
    pub high_tidal_ml: f32,
    pub peep_cmh2o: f32,
}

// ---------------------------------------------------------------------------
// Derived timing
// ---------------------------------------------------------------------------

/// Phase durations for one breath.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleTiming {
    pub total_ms: u32,
    pub wait_to_out_ms: u32,
    pub inspiration_ms: u32,
    pub expiration_ms: u32,
}

impl CycleTiming {
    /// Split one breath period into inspiration and expiration.
    ///
    /// ```text
    /// total      = 60000 / bpm
    /// budget     = total - (duty_index + wait_to_out)
    /// inspiration = (budget / 2) / rate[duty_index]
    /// expiration  = budget - inspiration
    /// ```
    ///
    /// Arithmetic is signed so an oversized wait window shows up as a
    /// negative phase instead of wrapping.
    pub fn compute(params: &CycleParameters, wait_to_out_ms: u32) -> Result<Self, TimingError> {
        if params.bpm == 0 {
            return Err(TimingError::ZeroBpm);
        }
        let rate = *RATE_TABLE
            .get(params.duty_index as usize)
            .ok_or(TimingError::InvalidDutyIndex(params.duty_index))?;

        let total = MINUTE_MS / i32::from(params.bpm);
        let wait = i32::try_from(wait_to_out_ms).unwrap_or(i32::MAX);
        let budget = total
            .saturating_sub(i32::from(params.duty_index))
            .saturating_sub(wait);
        let inspiration = (budget / 2) / rate;
        let expiration = budget - inspiration;

        if inspiration <= 0 || expiration <= 0 {
            return Err(TimingError::NonPositivePhase {
                inspiration_ms: inspiration,
                expiration_ms: expiration,
            });
        }

        Ok(Self {
            total_ms: total as u32,
            wait_to_out_ms,
            inspiration_ms: inspiration as u32,
            expiration_ms: expiration as u32,
        })
    }
}

// ---------------------------------------------------------------------------
// Fixed phase timers (from device config)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimers {
    pub wait_to_out_ms: u32,
    pub stopping_ms: u32,
    pub calibration_ms: u32,
}

impl PhaseTimers {
    pub fn from_config(config: &VentConfig) -> Self {
        Self {
            wait_to_out_ms: config.wait_to_out_ms,
            stopping_ms: config.stopping_ms,
            calibration_ms: config.calibration_ms,
        }
    }
}

impl Default for PhaseTimers {
    fn default() -> Self {
        Self::from_config(&VentConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Controller state
// ---------------------------------------------------------------------------

/// Everything the phase handlers remember between ticks.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleState {
    /// Timestamp the current phase was entered.
    pub phase_started_ms: u64,
    /// Percent progress of the current phase (0..=100).
    pub progress: u8,
    /// Tidal volume of the last completed inspiration (mL).
    pub last_tidal_ml: f32,
    pub params: CycleParameters,
    pub timing: CycleTiming,
    /// Fast calibration runs at the end of the next expiration.
    pub fast_calibration_pending: bool,
    /// PEEP regulator's view of the outlet valve.
    pub peep_outlet_open: bool,
    /// Breaths started since the last stop.
    pub breaths: u32,
    /// Pause refused to start a breath; retries are spaced out.
    pub timing_refused: bool,
}

// ---------------------------------------------------------------------------
// Ports and context
// ---------------------------------------------------------------------------

/// Collaborators lent to the controller for one tick.
pub struct CyclePorts<'a> {
    pub now_ms: u64,
    pub params: &'a dyn ParameterSource,
    pub actuator: &'a mut dyn Actuator,
    pub estimator: &'a mut PressureFlowEstimator,
    pub bus: &'a mut EventBus,
}

/// The context passed to every phase handler.
pub struct CycleContext<'a> {
    pub now_ms: u64,
    pub params: &'a dyn ParameterSource,
    pub actuator: &'a mut dyn Actuator,
    pub estimator: &'a mut PressureFlowEstimator,
    pub bus: &'a mut EventBus,
    pub state: &'a mut CycleState,
    pub timers: PhaseTimers,
}

impl CycleContext<'_> {
    /// Milliseconds since the current phase was entered.
    pub fn elapsed_ms(&self) -> u64 {
        self.now_ms.saturating_sub(self.state.phase_started_ms)
    }

    pub fn post(&mut self, event: Event) -> bool {
        self.bus.post(event)
    }
}

/// `min(100, elapsed * 100 / duration)`.  A zero duration counts as done.
pub fn percent_elapsed(elapsed_ms: u64, duration_ms: u32) -> u8 {
    if duration_ms == 0 {
        return 100;
    }
    (elapsed_ms.saturating_mul(100) / u64::from(duration_ms)).min(100) as u8
}
