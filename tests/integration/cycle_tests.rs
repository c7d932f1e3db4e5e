//! Breath sequencing through the full `Ventilator` loop: phase order,
//! valve commands, timing, forced stop, calibration and PEEP.

use ventcore::alarms::AlarmIndex;
use ventcore::config::{ActuatorKind, VentConfig};
use ventcore::cycle::Phase;
use ventcore::drivers::motion::{MotionActuator, Stroke, StrokeTimer};
use ventcore::events::Event;

use super::mock_hw::{ManualClock, MockActuator, Rig, ValveCall};

// ── Sequencing ────────────────────────────────────────────────

#[test]
fn one_breath_visits_phases_in_order() {
    let mut rig = Rig::new();
    rig.vent.params_mut().enabled = true;
    let mut seen = vec![rig.vent.current_phase()];
    while rig.clock.get() < 9_000 {
        rig.step();
        let p = rig.vent.current_phase();
        if seen.last() != Some(&p) {
            seen.push(p);
        }
    }
    assert_eq!(
        seen,
        vec![
            Phase::Stopped,
            Phase::InitialCalibration,
            Phase::Pause,
            Phase::Inspiration,
            Phase::WaitBeforeExpiration,
            Phase::Expiration,
            Phase::Pause,
            Phase::Inspiration,
        ]
    );
}

#[test]
fn breath_period_is_total_plus_pause() {
    let mut rig = Rig::new().calibrated();
    assert!(rig.run_until(Phase::Inspiration, 200));
    let first = rig.clock.get();
    rig.step();
    assert!(rig.run_until(Phase::Inspiration, 5_000));
    // 60000/15 + 100 ms pause.
    assert_eq!(rig.clock.get() - first, 4_100);
    assert_eq!(rig.vent.controller().breaths(), 2);
}

#[test]
fn initial_calibration_lasts_its_timer() {
    let mut rig = Rig::new();
    rig.vent.params_mut().enabled = true;
    rig.step();
    assert_eq!(rig.vent.current_phase(), Phase::InitialCalibration);
    let entered = rig.clock.get();
    assert!(rig.vent.actuator().outlet, "calibration vents to ambient");
    assert!(rig.run_until(Phase::Pause, 5_000));
    assert_eq!(rig.clock.get() - entered, 4_000);
}

// ── Valves ────────────────────────────────────────────────────

#[test]
fn valves_follow_the_breath() {
    let mut rig = Rig::new().calibrated();
    assert!(!rig.vent.actuator().outlet, "pause holds the outlet closed");

    assert!(rig.run_until(Phase::Inspiration, 200));
    let a = rig.vent.actuator();
    assert!(a.inlet && a.bleed && !a.outlet);

    assert!(rig.run_until(Phase::WaitBeforeExpiration, 1_000));
    let a = rig.vent.actuator();
    assert!(!a.inlet && !a.outlet);

    assert!(rig.run_until(Phase::Expiration, 300));
    let a = rig.vent.actuator();
    assert!(a.outlet && !a.inlet);

    assert!(rig.run_until(Phase::Pause, 3_000));
    assert!(!rig.vent.actuator().outlet);
}

#[test]
fn inlet_and_outlet_never_open_together() {
    let mut rig = Rig::new().calibrated();
    for _ in 0..2_000 {
        rig.step();
        let a = rig.vent.actuator();
        assert!(!(a.inlet && a.outlet), "both open at {} ms", rig.clock.get());
    }
}

// ── Tidal volume ──────────────────────────────────────────────

#[test]
fn tidal_volume_integrates_inspiratory_flow() {
    let mut rig = Rig::new().calibrated();
    assert!(rig.run_until(Phase::WaitBeforeExpiration, 1_200));
    // 30 L/min over 940 ms of samples.
    let vt = rig.vent.last_tidal_volume();
    assert!((vt - 470.0).abs() < 1.0, "tidal volume {vt}");

    assert!(rig.run_until(Phase::Pause, 3_500));
    assert_eq!(rig.alarm_count(AlarmIndex::LowTidalVolume), 0);
    assert_eq!(rig.alarm_count(AlarmIndex::HighTidalVolume), 0);
}

#[test]
fn no_flow_raises_low_tidal_volume_at_expiration_end() {
    let mut rig = Rig::new();
    rig.set_flow(0.0);
    let mut rig = rig.calibrated();
    assert!(rig.run_until(Phase::Expiration, 1_500));
    assert_eq!(rig.alarm_count(AlarmIndex::LowTidalVolume), 0);
    assert!(rig.run_until(Phase::Pause, 3_000));
    assert_eq!(rig.alarm_count(AlarmIndex::LowTidalVolume), 1);
    assert!(rig.alarms.is_latched(AlarmIndex::LowTidalVolume));
}

#[test]
fn excessive_flow_raises_high_tidal_volume() {
    let mut rig = Rig::new();
    rig.set_flow(120.0);
    let mut rig = rig.calibrated();
    assert!(rig.run_until(Phase::Pause, 5_000));
    rig.step();
    assert!(rig.run_until(Phase::Pause, 5_000));
    assert_eq!(rig.alarm_count(AlarmIndex::HighTidalVolume), 1);
    assert!(rig.vent.last_tidal_volume() > 800.0);
}

// ── Pressure alarms ───────────────────────────────────────────

#[test]
fn low_pressure_only_checked_after_half_inspiration() {
    let mut rig = Rig::new().calibrated();
    rig.set_pressure(0.0);
    assert!(rig.run_until(Phase::Inspiration, 200));
    while rig.vent.current_phase() == Phase::Inspiration {
        if rig.vent.current_progress() < 50 {
            assert_eq!(rig.alarm_count(AlarmIndex::LowPressure), 0);
        }
        rig.step();
    }
    assert!(rig.alarm_count(AlarmIndex::LowPressure) > 0);
}

#[test]
fn low_pressure_posts_once_per_tick_until_recovered() {
    let mut rig = Rig::new().calibrated();
    rig.set_pressure(0.0);
    assert!(rig.run_until(Phase::Inspiration, 200));
    rig.run_for(600);
    let before = rig.alarm_count(AlarmIndex::LowPressure);
    rig.step();
    assert_eq!(rig.alarm_count(AlarmIndex::LowPressure), before + 1);

    rig.set_pressure(20.0);
    rig.run_for(200);
    rig.clear_events();
    assert!(rig.run_until(Phase::WaitBeforeExpiration, 300));
    assert_eq!(rig.alarm_count(AlarmIndex::LowPressure), 0);
}

#[test]
fn high_pressure_checked_during_inspiration_only() {
    let mut rig = Rig::new().calibrated();
    rig.set_pressure(40.0);
    assert!(rig.run_until(Phase::WaitBeforeExpiration, 1_200));
    assert!(rig.alarm_count(AlarmIndex::HighPressure) > 0);

    rig.clear_events();
    assert!(rig.run_until(Phase::Pause, 3_500));
    assert_eq!(rig.alarm_count(AlarmIndex::HighPressure), 0);
}

// ── PEEP ──────────────────────────────────────────────────────

#[test]
fn peep_holds_outlet_closed_below_target() {
    let mut rig = Rig::new().calibrated();
    assert!(rig.run_until(Phase::Expiration, 1_500));
    assert!(rig.vent.actuator().outlet);

    let closes = rig.vent.actuator().count(ValveCall::CloseOutlet);
    rig.set_pressure(2.0);
    rig.run_for(300);
    assert_eq!(rig.vent.current_phase(), Phase::Expiration);
    assert!(!rig.vent.actuator().outlet);
    assert_eq!(rig.vent.actuator().count(ValveCall::CloseOutlet), closes + 1);

    rig.set_pressure(10.0);
    rig.run_for(300);
    assert!(rig.vent.actuator().outlet);
}

// ── Forced stop ───────────────────────────────────────────────

#[test]
fn disabling_mid_expiration_vents_then_closes() {
    let mut rig = Rig::new().calibrated();
    assert!(rig.run_until(Phase::Expiration, 1_500));
    rig.vent.params_mut().enabled = false;
    rig.step();
    assert_eq!(rig.vent.current_phase(), Phase::Stopping);
    let entered = rig.clock.get();
    let a = rig.vent.actuator();
    assert!(a.outlet && !a.inlet);

    assert!(rig.run_until(Phase::Stopped, 4_100));
    assert_eq!(rig.clock.get() - entered, 4_000);
    assert!(rig.vent.actuator().all_closed());
}

#[test]
fn disabling_during_calibration_stops() {
    let mut rig = Rig::new();
    rig.vent.params_mut().enabled = true;
    rig.run_for(1_000);
    assert_eq!(rig.vent.current_phase(), Phase::InitialCalibration);
    rig.vent.params_mut().enabled = false;
    rig.step();
    assert_eq!(rig.vent.current_phase(), Phase::Stopping);
}

#[test]
fn disabling_mid_inspiration_closes_inlet_and_ends_integration() {
    let mut rig = Rig::new().calibrated();
    assert!(rig.run_until(Phase::Inspiration, 200));
    rig.run_for(200);
    rig.vent.params_mut().enabled = false;
    rig.step();
    assert_eq!(rig.vent.current_phase(), Phase::Stopping);
    assert!(!rig.vent.actuator().inlet);
    assert!(!rig.vent.estimator().tidal_integration_active());
}

#[test]
fn restart_after_stop_recalibrates_and_resets_breaths() {
    let mut rig = Rig::new().calibrated();
    assert!(rig.run_until(Phase::Expiration, 1_500));
    assert_eq!(rig.vent.controller().breaths(), 1);
    rig.vent.params_mut().enabled = false;
    assert!(rig.run_until(Phase::Stopped, 4_100));
    assert_eq!(rig.vent.controller().breaths(), 0);

    rig.vent.params_mut().enabled = true;
    rig.step();
    assert_eq!(rig.vent.current_phase(), Phase::InitialCalibration);
}

// ── Fast calibration ──────────────────────────────────────────

#[test]
fn fast_calibration_runs_after_expiration() {
    let mut rig = Rig::new().calibrated();
    assert!(rig.run_until(Phase::Inspiration, 200));
    assert!(rig.vent.request_fast_calibration());
    rig.step();
    assert!(rig.saw(&Event::Alarm(AlarmIndex::CalibrationRequested)));

    assert!(rig.run_until(Phase::Expiration, 1_500));
    assert!(rig.vent.controller().fast_calibration_pending());

    assert!(rig.run_until(Phase::FastCalibration, 3_000));
    assert!(!rig.vent.controller().fast_calibration_pending());
    assert!(rig.vent.actuator().outlet);

    rig.set_pressure(3.0);
    assert!(rig.run_until(Phase::Pause, 4_100));
    assert!(rig.saw(&Event::Alarm(AlarmIndex::CalibrationDone)));
    assert!((rig.vent.estimator().zero_reference() - 3.0).abs() < 1e-3);
    assert!(!rig.alarms.any(), "calibration notices are not faults");
}

#[test]
fn fast_calibration_ignored_while_disabled() {
    let mut rig = Rig::new();
    assert!(!rig.vent.request_fast_calibration());
    assert!(!rig.vent.controller().fast_calibration_pending());
    rig.step();
    assert!(!rig.saw(&Event::Alarm(AlarmIndex::CalibrationRequested)));
}

// ── Parameters and timing ─────────────────────────────────────

#[test]
fn parameter_change_applies_from_next_breath() {
    let mut rig = Rig::new().calibrated();
    assert!(rig.run_until(Phase::Inspiration, 200));
    assert_eq!(rig.vent.timing().inspiration_ms, 949);

    rig.vent.params_mut().bpm = 20;
    rig.step();
    assert_eq!(rig.vent.timing().inspiration_ms, 949);

    assert!(rig.run_until(Phase::Pause, 4_000));
    assert!(rig.run_until(Phase::Inspiration, 200));
    let t = rig.vent.timing();
    assert_eq!(t.total_ms, 3_000);
    assert_eq!(t.inspiration_ms, 699);
    assert_eq!(t.expiration_ms, 2_100);
}

#[test]
fn invalid_timing_holds_pause_and_alarms() {
    let mut rig = Rig::new().calibrated();
    rig.vent.params_mut().bpm = 0;
    rig.run_for(2_500);
    assert_eq!(rig.vent.current_phase(), Phase::Pause);
    assert!(rig.alarm_count(AlarmIndex::InvalidTiming) >= 2);
    assert!(rig.vent.actuator().all_closed());

    rig.vent.params_mut().bpm = 15;
    assert!(rig.run_until(Phase::Inspiration, 1_100));
}

#[test]
fn refused_timing_retries_once_a_second_with_zero_pause() {
    let mut rig = Rig::new();
    rig.vent.params_mut().pause_ms = 0;
    let mut rig = rig.calibrated();
    rig.vent.params_mut().bpm = 0;

    // Attempts 10 ms after entering Pause, then every second.
    rig.run_for(3_000);
    assert_eq!(rig.vent.current_phase(), Phase::Pause);
    assert_eq!(rig.alarm_count(AlarmIndex::InvalidTiming), 3);
}

#[test]
fn stop_restarts_peak_readings() {
    let mut rig = Rig::new().calibrated();
    assert!(rig.run_until(Phase::Inspiration, 200));
    rig.set_pressure(30.0);
    rig.run_for(200);
    rig.set_pressure(20.0);
    rig.run_for(200);
    assert_eq!(rig.vent.telemetry().peak_pressure_raw, 30.0);
    assert_eq!(rig.vent.telemetry().peak_flow_raw, 30.0);

    rig.vent.params_mut().enabled = false;
    assert!(rig.run_until(Phase::Stopped, 4_100));
    rig.set_flow(10.0);
    rig.run_for(40);
    let t = rig.vent.telemetry();
    assert_eq!(t.peak_pressure_raw, 20.0);
    assert_eq!(t.peak_flow_raw, 10.0);
}

#[test]
fn start_cycle_enters_inspiration_immediately() {
    let mut rig = Rig::new().calibrated();
    assert_eq!(rig.vent.current_phase(), Phase::Pause);
    assert_eq!(rig.vent.start_cycle(), Ok(()));
    assert_eq!(rig.vent.current_phase(), Phase::Inspiration);
    assert!(rig.vent.actuator().inlet);
    assert_eq!(rig.vent.controller().breaths(), 1);
}

// ── Sensors ───────────────────────────────────────────────────

#[test]
fn sensor_dropout_keeps_last_reading_and_cycle_running() {
    let mut rig = Rig::new().calibrated();
    assert!(rig.run_until(Phase::Inspiration, 200));
    rig.run_for(300);
    let before = rig.vent.current_pressure();

    rig.vent.sensor_mut().fail = true;
    rig.run_for(200);
    assert_eq!(rig.vent.current_pressure(), before);
    assert!(rig.vent.telemetry().sensor_failures > 0);

    assert!(rig.run_until(Phase::Expiration, 1_000));
}

// ── Motion actuator ───────────────────────────────────────────

#[test]
fn motion_drive_sets_phase_progress() {
    let config = VentConfig {
        actuator: ActuatorKind::Motion,
        ..VentConfig::default()
    };
    let clock = ManualClock::new();
    let actuator = MotionActuator::new(MockActuator::new(), StrokeTimer::new(clock.clone()));
    let mut rig = Rig::with(&config, actuator, clock).calibrated();

    assert!(rig.run_until(Phase::Inspiration, 200));
    assert_eq!(rig.vent.actuator().drive().stroke(), Stroke::Compress);
    assert!(rig.vent.actuator().valves().inlet);
    rig.run_for(480);
    assert_eq!(rig.vent.current_progress(), 50);

    assert!(rig.run_until(Phase::Expiration, 1_000));
    assert_eq!(rig.vent.actuator().drive().stroke(), Stroke::Release);
    rig.run_for(1_430);
    assert_eq!(rig.vent.current_progress(), 50);

    assert!(rig.run_until(Phase::Pause, 2_000));
}

#[test]
fn motion_drive_leaves_outlet_to_the_stroke() {
    let config = VentConfig {
        actuator: ActuatorKind::Motion,
        ..VentConfig::default()
    };
    let clock = ManualClock::new();
    let actuator = MotionActuator::new(MockActuator::new(), StrokeTimer::new(clock.clone()));
    let mut motion = Rig::with(&config, actuator, clock).calibrated();
    let mut timed = Rig::new().calibrated();

    assert!(motion.run_until(Phase::Expiration, 1_500));
    assert!(timed.run_until(Phase::Expiration, 1_500));
    let motion_closes = motion.vent.actuator().valves().count(ValveCall::CloseOutlet);
    let timed_closes = timed.vent.actuator().count(ValveCall::CloseOutlet);

    motion.set_pressure(2.0);
    timed.set_pressure(2.0);
    motion.run_for(1_000);
    timed.run_for(1_000);
    assert_eq!(motion.vent.current_phase(), Phase::Expiration);
    assert_eq!(timed.vent.current_phase(), Phase::Expiration);

    assert!(motion.vent.actuator().valves().outlet);
    assert_eq!(
        motion.vent.actuator().valves().count(ValveCall::CloseOutlet),
        motion_closes
    );
    assert!(!timed.vent.actuator().outlet);
    assert_eq!(timed.vent.actuator().count(ValveCall::CloseOutlet), timed_closes + 1);

    // Pause closes the outlet for both.
    assert!(motion.run_until(Phase::Pause, 3_000));
    assert_eq!(
        motion.vent.actuator().valves().count(ValveCall::CloseOutlet),
        motion_closes + 1
    );
}
