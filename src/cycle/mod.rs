//! Ventilation cycle controller.
//!
//! Function-pointer state machine over the breath phases:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │  PhaseTable                                                    │
//! │  ┌─────────────────────┬──────────┬─────────┬────────────────┐ │
//! │  │ Phase               │ on_enter │ on_exit │ on_update      │ │
//! │  ├─────────────────────┼──────────┼─────────┼────────────────┤ │
//! │  │ Stopped             │ fn(ctx)  │ fn(ctx) │ fn(ctx)->Opt<> │ │
//! │  │ InitialCalibration  │ fn(ctx)  │    -    │ fn(ctx)->Opt<> │ │
//! │  │ Inspiration         │ fn(ctx)  │ fn(ctx) │ fn(ctx)->Opt<> │ │
//! │  │ ...                 │          │         │                │ │
//! │  └─────────────────────┴──────────┴─────────┴────────────────┘ │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the controller first checks the enable flag: a disabled
//! ventilator in any active phase is forced into `Stopping` and nothing
//! else runs that tick.  Otherwise `on_update` runs for the current phase;
//! `Some(next)` triggers `on_exit(current)`, a timestamp reset, then
//! `on_enter(next)`.

pub mod context;
pub mod phases;

use log::{error, info, warn};
use serde::Serialize;

use crate::alarms::AlarmIndex;
use crate::config::VentConfig;
use crate::error::TimingError;
use crate::events::{Event, EventBus};
use context::{CycleContext, CyclePorts, CycleState, CycleTiming, PhaseTimers};

// ---------------------------------------------------------------------------
// Phase identity
// ---------------------------------------------------------------------------

/// Breath phases.  Must stay in sync with [`phases::build_phase_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum Phase {
    Stopped = 0,
    InitialCalibration = 1,
    Inspiration = 2,
    WaitBeforeExpiration = 3,
    Expiration = 4,
    FastCalibration = 5,
    Pause = 6,
    Stopping = 7,
}

impl Phase {
    /// Total number of phases; sizes the table array.
    pub const COUNT: usize = 8;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Stopped,
        Self::InitialCalibration,
        Self::Inspiration,
        Self::WaitBeforeExpiration,
        Self::Expiration,
        Self::FastCalibration,
        Self::Pause,
        Self::Stopping,
    ];

    /// Every phase a forced stop can preempt.
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Stopped | Self::Stopping)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::InitialCalibration => "InitialCalibration",
            Self::Inspiration => "Inspiration",
            Self::WaitBeforeExpiration => "WaitBeforeExpiration",
            Self::Expiration => "Expiration",
            Self::FastCalibration => "FastCalibration",
            Self::Pause => "Pause",
            Self::Stopping => "Stopping",
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// `on_enter` / `on_exit` action, run once per transition.
pub type PhaseActionFn = fn(&mut CycleContext<'_>);

/// Per-tick handler.  `Some(next)` requests a transition.
pub type PhaseUpdateFn = fn(&mut CycleContext<'_>) -> Option<Phase>;

/// One row of the phase table.
pub struct PhaseDescriptor {
    pub id: Phase,
    pub on_enter: Option<PhaseActionFn>,
    pub on_exit: Option<PhaseActionFn>,
    pub on_update: PhaseUpdateFn,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// The breath sequencer.  Only this type mutates [`CycleState`].
pub struct CycleController {
    /// Indexed by `Phase as usize`.
    table: [PhaseDescriptor; Phase::COUNT],
    current: Phase,
    state: CycleState,
    timers: PhaseTimers,
}

impl CycleController {
    /// Controller in `Stopped`.  Valves are closed on the first transition
    /// back into `Stopped`; at power-up the actuator starts closed.
    pub fn new(config: &VentConfig) -> Self {
        Self::with_table(phases::build_phase_table(), PhaseTimers::from_config(config))
    }

    pub(crate) fn with_table(table: [PhaseDescriptor; Phase::COUNT], timers: PhaseTimers) -> Self {
        Self {
            table,
            current: Phase::Stopped,
            state: CycleState::default(),
            timers,
        }
    }

    /// Advance by one tick.
    pub fn tick(&mut self, ports: CyclePorts<'_>) {
        let CyclePorts {
            now_ms,
            params,
            actuator,
            estimator,
            bus,
        } = ports;
        let mut ctx = CycleContext {
            now_ms,
            params,
            actuator,
            estimator,
            bus,
            state: &mut self.state,
            timers: self.timers,
        };

        // Forced stop preempts everything else.
        if !ctx.params.ventilation_enabled() && self.current.is_active() {
            warn!("CYCLE ventilation disabled in {}, forcing stop", self.current.name());
            transition(&self.table, &mut self.current, Phase::Stopping, &mut ctx);
            return;
        }

        let desc = &self.table[self.current as usize];
        if desc.id != self.current {
            error!(
                "CYCLE phase table mismatch: slot {} holds {}",
                self.current.name(),
                desc.id.name()
            );
            return;
        }

        if let Some(next) = (desc.on_update)(&mut ctx) {
            transition(&self.table, &mut self.current, next, &mut ctx);
        }
    }

    /// Snapshot parameters, derive timing and enter `Inspiration` now.
    ///
    /// On a timing error nothing changes and the caller decides what to do;
    /// the `Pause` handler raises [`AlarmIndex::InvalidTiming`] and retries.
    pub fn start_cycle(&mut self, ports: CyclePorts<'_>) -> Result<(), TimingError> {
        let CyclePorts {
            now_ms,
            params,
            actuator,
            estimator,
            bus,
        } = ports;
        let mut ctx = CycleContext {
            now_ms,
            params,
            actuator,
            estimator,
            bus,
            state: &mut self.state,
            timers: self.timers,
        };
        phases::begin_cycle(&mut ctx)?;
        transition(&self.table, &mut self.current, Phase::Inspiration, &mut ctx);
        Ok(())
    }

    /// Ask for a fast calibration at the end of the next expiration.
    ///
    /// Ignored (returns `false`) while ventilation is disabled.
    pub fn request_fast_calibration(&mut self, enabled: bool, bus: &mut EventBus) -> bool {
        if !enabled {
            info!("CYCLE fast calibration ignored: ventilation off");
            return false;
        }
        self.state.fast_calibration_pending = true;
        bus.post(Event::Alarm(AlarmIndex::CalibrationRequested));
        info!("CYCLE fast calibration scheduled");
        true
    }

    pub fn current_phase(&self) -> Phase {
        self.current
    }

    /// Percent progress of the current phase (0..=100).
    pub fn current_progress(&self) -> u8 {
        self.state.progress
    }

    /// Tidal volume of the last completed inspiration (mL).
    pub fn last_tidal_volume(&self) -> f32 {
        self.state.last_tidal_ml
    }

    /// Timing of the breath in progress (or the last one).
    pub fn timing(&self) -> CycleTiming {
        self.state.timing
    }

    pub fn fast_calibration_pending(&self) -> bool {
        self.state.fast_calibration_pending
    }

    pub fn breaths(&self) -> u32 {
        self.state.breaths
    }
}

// ---------------------------------------------------------------------------
// Internal
// ---------------------------------------------------------------------------

/// Exit, re-stamp, enter.  Free function so the table, the current phase
/// and the state borrowed inside `ctx` stay disjoint.
fn transition(
    table: &[PhaseDescriptor; Phase::COUNT],
    current: &mut Phase,
    next: Phase,
    ctx: &mut CycleContext<'_>,
) {
    info!("CYCLE transition: {} -> {}", current.name(), next.name());

    if let Some(exit) = table[*current as usize].on_exit {
        exit(ctx);
    }

    *current = next;
    ctx.state.phase_started_ms = ctx.now_ms;

    if let Some(enter) = table[next as usize].on_enter {
        enter(ctx);
    }
}
