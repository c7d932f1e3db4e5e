//! Log-based bus listener.
//!
//! [`LogListener`] writes every bus event to the logger (UART / USB-CDC in
//! production).  A display or serial-telemetry listener would implement
//! the same trait.

use log::{error, info, warn};

use crate::app::telemetry::TelemetrySnapshot;
use crate::events::{Event, EventQueue, Listener, Propagation};

/// Listener that logs every [`Event`].  Never stops propagation.
#[derive(Debug, Default)]
pub struct LogListener;

impl LogListener {
    pub fn new() -> Self {
        Self
    }
}

impl Listener for LogListener {
    fn on_event(&mut self, event: &Event, _queue: &mut EventQueue) -> Propagation {
        match event {
            Event::KeyPress(key) => info!("KEY | press {:?}", key),
            Event::KeyRelease(key) => info!("KEY | release {:?}", key),
            Event::Alarm(alarm) if alarm.is_fault() => error!("ALARM | {}", alarm),
            Event::Alarm(alarm) => info!("ALARM | {}", alarm),
            Event::AlarmDisplayOn(text) => warn!("DISPLAY | {}", text),
            Event::AlarmDisplayOff => info!("DISPLAY | cleared"),
            Event::CycleStarted(ms) => info!("CYCLE | breath at {} ms", ms),
        }
        Propagation::Continue
    }
}

/// One `TELEM` line per snapshot.
pub fn log_telemetry(t: &TelemetrySnapshot) {
    info!(
        "TELEM | phase={:?} {}% | P={:.1}cmH2O | F={:.1}L/min | Vt={:.0}mL | \
         peak raw P={:.0} F={:.0} | breaths={} | cal_pending={} | dropped={} | sensor_fail={}",
        t.phase,
        t.progress,
        t.pressure_cmh2o,
        t.flow_lpm,
        t.tidal_ml,
        t.peak_pressure_raw,
        t.peak_flow_raw,
        t.breaths,
        t.fast_calibration_pending,
        t.dropped_events,
        t.sensor_failures,
    );
}
