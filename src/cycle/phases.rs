//! Phase handler functions and table builder.
//!
//! ```text
//!  STOPPED ──[enabled]──▶ INITIAL_CALIBRATION ──[cal done]──▶ PAUSE
//!                                                               │
//!       ┌─────────────────────[pause done, start_cycle]─────────┘
//!       ▼                                                       ▲
//!  INSPIRATION ──[time / stroke done]──▶ WAIT_BEFORE_EXPIRATION  │
//!                                              │                │
//!                                       [wait done]             │
//!                                              ▼                │
//!                                         EXPIRATION ───────────┤
//!                                              │                │
//!                                   [cal requested]             │
//!                                              ▼                │
//!                                       FAST_CALIBRATION ───────┘
//!
//!  Any active phase ──[disabled]──▶ STOPPING ──[timer]──▶ STOPPED
//! ```

use log::{debug, error, info};

use super::context::{CycleContext, CycleState, CycleTiming, percent_elapsed};
use super::{Phase, PhaseDescriptor};
use crate::alarms::AlarmIndex;
use crate::error::TimingError;
use crate::events::Event;

/// Minimum spacing between breath attempts while the timing is refused.
pub const TIMING_RETRY_MS: u32 = 1000;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the phase table.  Called once at startup.
pub fn build_phase_table() -> [PhaseDescriptor; Phase::COUNT] {
    [
        PhaseDescriptor {
            id: Phase::Stopped,
            on_enter: Some(stopped_enter),
            on_exit: Some(stopped_exit),
            on_update: stopped_update,
        },
        PhaseDescriptor {
            id: Phase::InitialCalibration,
            on_enter: Some(calibration_enter),
            on_exit: None,
            on_update: initial_calibration_update,
        },
        PhaseDescriptor {
            id: Phase::Inspiration,
            on_enter: Some(inspiration_enter),
            on_exit: Some(inspiration_exit),
            on_update: inspiration_update,
        },
        PhaseDescriptor {
            id: Phase::WaitBeforeExpiration,
            on_enter: None,
            on_exit: None,
            on_update: wait_before_expiration_update,
        },
        PhaseDescriptor {
            id: Phase::Expiration,
            on_enter: Some(expiration_enter),
            on_exit: None,
            on_update: expiration_update,
        },
        PhaseDescriptor {
            id: Phase::FastCalibration,
            on_enter: Some(fast_calibration_enter),
            on_exit: None,
            on_update: fast_calibration_update,
        },
        PhaseDescriptor {
            id: Phase::Pause,
            on_enter: Some(pause_enter),
            on_exit: None,
            on_update: pause_update,
        },
        PhaseDescriptor {
            id: Phase::Stopping,
            on_enter: Some(stopping_enter),
            on_exit: None,
            on_update: stopping_update,
        },
    ]
}

/// Snapshot parameters and derive this breath's timing.
///
/// Leaves the previous timing in place when the new parameters are
/// unusable.
pub(crate) fn begin_cycle(ctx: &mut CycleContext<'_>) -> Result<(), TimingError> {
    let params = ctx.params.cycle_parameters();
    let timing = CycleTiming::compute(&params, ctx.timers.wait_to_out_ms)?;
    ctx.state.params = params;
    ctx.state.timing = timing;
    Ok(())
}

fn raise(ctx: &mut CycleContext<'_>, alarm: AlarmIndex) {
    debug!("CYCLE alarm {alarm}");
    ctx.post(Event::Alarm(alarm));
}

// ═══════════════════════════════════════════════════════════════════════════
//  STOPPED
// ═══════════════════════════════════════════════════════════════════════════

fn stopped_enter(ctx: &mut CycleContext<'_>) {
    ctx.actuator.close_all();
    // Drops any half-integrated breath and restarts the peak diagnostics.
    ctx.estimator.reset();
    *ctx.state = CycleState {
        phase_started_ms: ctx.state.phase_started_ms,
        ..CycleState::default()
    };
    info!("STOPPED: valves closed");
}

fn stopped_update(ctx: &mut CycleContext<'_>) -> Option<Phase> {
    ctx.params
        .ventilation_enabled()
        .then_some(Phase::InitialCalibration)
}

fn stopped_exit(ctx: &mut CycleContext<'_>) {
    ctx.state.params = ctx.params.cycle_parameters();
}

// ═══════════════════════════════════════════════════════════════════════════
//  INITIAL / FAST CALIBRATION: outlet open, sensor settles to ambient
// ═══════════════════════════════════════════════════════════════════════════

fn calibration_enter(ctx: &mut CycleContext<'_>) {
    ctx.state.progress = 0;
    ctx.actuator.open_outlet();
    info!("CALIBRATION: venting for {} ms", ctx.timers.calibration_ms);
}

fn calibration_progress(ctx: &mut CycleContext<'_>) -> bool {
    let elapsed = ctx.elapsed_ms();
    ctx.state.progress = percent_elapsed(elapsed, ctx.timers.calibration_ms);
    elapsed >= u64::from(ctx.timers.calibration_ms)
}

fn initial_calibration_update(ctx: &mut CycleContext<'_>) -> Option<Phase> {
    if !calibration_progress(ctx) {
        return None;
    }
    ctx.estimator.latch_zero_reference();
    Some(Phase::Pause)
}

fn fast_calibration_enter(ctx: &mut CycleContext<'_>) {
    ctx.state.fast_calibration_pending = false;
    calibration_enter(ctx);
}

fn fast_calibration_update(ctx: &mut CycleContext<'_>) -> Option<Phase> {
    if !calibration_progress(ctx) {
        return None;
    }
    ctx.estimator.latch_zero_reference();
    raise(ctx, AlarmIndex::CalibrationDone);
    Some(Phase::Pause)
}

// ═══════════════════════════════════════════════════════════════════════════
//  INSPIRATION
// ═══════════════════════════════════════════════════════════════════════════

fn inspiration_enter(ctx: &mut CycleContext<'_>) {
    let now = ctx.now_ms;
    let timing = ctx.state.timing;

    ctx.state.progress = 0;
    ctx.state.peep_outlet_open = false;
    ctx.state.breaths = ctx.state.breaths.saturating_add(1);

    ctx.actuator.close_outlet();
    ctx.actuator.open_inlet();
    ctx.actuator.open_bleed();
    if let Some(drive) = ctx.actuator.motion() {
        drive.begin_inspiration(timing.inspiration_ms);
    }

    ctx.estimator.start_tidal_integration(now);
    ctx.post(Event::CycleStarted(now));

    info!(
        "INSPIRATION: breath {} total={}ms in={}ms out={}ms pause={}ms",
        ctx.state.breaths,
        timing.total_ms,
        timing.inspiration_ms,
        timing.expiration_ms,
        ctx.state.params.pause_ms
    );
}

fn inspiration_update(ctx: &mut CycleContext<'_>) -> Option<Phase> {
    let done = if let Some(drive) = ctx.actuator.motion() {
        let p = drive.progress().min(100);
        ctx.state.progress = p;
        p >= 100
    } else {
        let elapsed = ctx.elapsed_ms();
        ctx.state.progress = percent_elapsed(elapsed, ctx.state.timing.inspiration_ms);
        elapsed >= u64::from(ctx.state.timing.inspiration_ms)
    };

    let pressure = ctx.estimator.current_pressure();
    let params = ctx.state.params;
    if ctx.state.progress >= 50 && pressure < params.low_pressure_cmh2o {
        raise(ctx, AlarmIndex::LowPressure);
    }
    if pressure > params.high_pressure_cmh2o {
        raise(ctx, AlarmIndex::HighPressure);
    }

    done.then_some(Phase::WaitBeforeExpiration)
}

fn inspiration_exit(ctx: &mut CycleContext<'_>) {
    ctx.actuator.close_inlet();
    ctx.state.last_tidal_ml = ctx.estimator.end_tidal_integration();
}

// ═══════════════════════════════════════════════════════════════════════════
//  WAIT BEFORE EXPIRATION: valve switch settling
// ═══════════════════════════════════════════════════════════════════════════

fn wait_before_expiration_update(ctx: &mut CycleContext<'_>) -> Option<Phase> {
    (ctx.elapsed_ms() >= u64::from(ctx.timers.wait_to_out_ms)).then_some(Phase::Expiration)
}

// ═══════════════════════════════════════════════════════════════════════════
//  EXPIRATION
// ═══════════════════════════════════════════════════════════════════════════

fn expiration_enter(ctx: &mut CycleContext<'_>) {
    let expiration_ms = ctx.state.timing.expiration_ms;
    ctx.state.progress = 100;
    ctx.actuator.open_outlet();
    ctx.state.peep_outlet_open = true;
    if let Some(drive) = ctx.actuator.motion() {
        drive.begin_expiration(expiration_ms);
    }
}

fn expiration_update(ctx: &mut CycleContext<'_>) -> Option<Phase> {
    let done = if let Some(drive) = ctx.actuator.motion() {
        let p = drive.progress().min(100);
        ctx.state.progress = 100 - p;
        p >= 100
    } else {
        let elapsed = ctx.elapsed_ms();
        let expiration_ms = ctx.state.timing.expiration_ms;
        ctx.state.progress = 100 - percent_elapsed(elapsed, expiration_ms);
        regulate_peep(ctx);
        elapsed >= u64::from(expiration_ms)
    };

    if !done {
        return None;
    }

    check_tidal_volume(ctx);
    if ctx.state.fast_calibration_pending {
        Some(Phase::FastCalibration)
    } else {
        Some(Phase::Pause)
    }
}

/// Bang-bang PEEP: vent while above target, hold once at or below.
fn regulate_peep(ctx: &mut CycleContext<'_>) {
    let want_open = ctx.estimator.current_pressure() > ctx.state.params.peep_cmh2o;
    if want_open == ctx.state.peep_outlet_open {
        return;
    }
    if want_open {
        ctx.actuator.open_outlet();
    } else {
        ctx.actuator.close_outlet();
    }
    ctx.state.peep_outlet_open = want_open;
}

fn check_tidal_volume(ctx: &mut CycleContext<'_>) {
    let ml = ctx.state.last_tidal_ml;
    let params = ctx.state.params;
    if ml < params.low_tidal_ml {
        raise(ctx, AlarmIndex::LowTidalVolume);
    }
    if ml > params.high_tidal_ml {
        raise(ctx, AlarmIndex::HighTidalVolume);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  PAUSE
// ═══════════════════════════════════════════════════════════════════════════

fn pause_enter(ctx: &mut CycleContext<'_>) {
    ctx.state.progress = 0;
    ctx.state.timing_refused = false;
    ctx.actuator.close_outlet();
    ctx.state.peep_outlet_open = false;
}

fn pause_update(ctx: &mut CycleContext<'_>) -> Option<Phase> {
    let mut wait_ms = ctx.state.params.pause_ms;
    if ctx.state.timing_refused {
        wait_ms = wait_ms.max(TIMING_RETRY_MS);
    }
    if ctx.elapsed_ms() < u64::from(wait_ms) {
        return None;
    }
    match begin_cycle(ctx) {
        Ok(()) => {
            ctx.state.timing_refused = false;
            Some(Phase::Inspiration)
        }
        Err(e) => {
            error!("PAUSE: breath refused, {e}; retry in {} ms", wait_ms.max(TIMING_RETRY_MS));
            raise(ctx, AlarmIndex::InvalidTiming);
            ctx.state.timing_refused = true;
            ctx.state.phase_started_ms = ctx.now_ms;
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  STOPPING: vent the circuit before closing everything
// ═══════════════════════════════════════════════════════════════════════════

fn stopping_enter(ctx: &mut CycleContext<'_>) {
    ctx.state.progress = 0;
    ctx.actuator.close_inlet();
    ctx.actuator.open_outlet();
    info!("STOPPING: venting for {} ms", ctx.timers.stopping_ms);
}

fn stopping_update(ctx: &mut CycleContext<'_>) -> Option<Phase> {
    (ctx.elapsed_ms() >= u64::from(ctx.timers.stopping_ms)).then_some(Phase::Stopped)
}
