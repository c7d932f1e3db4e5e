//! Motion-driven actuator (bag squeezer).
//!
//! [`MotionActuator`] pairs a valve bank with a [`MotionDrive`]; the
//! controller then takes phase progress from the drive instead of from its
//! own timers.  [`StrokeTimer`] is an open-loop drive: it assumes the
//! mechanism tracks the commanded stroke and reports progress from
//! elapsed time.  A closed-loop drive (encoder, end stops) would implement
//! the same trait.

use log::debug;

use crate::app::ports::{Actuator, Clock, MotionDrive};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stroke {
    Idle,
    Compress,
    Release,
}

/// Open-loop stroke generator.
pub struct StrokeTimer<C> {
    clock: C,
    stroke: Stroke,
    started_ms: u64,
    duration_ms: u32,
}

impl<C: Clock> StrokeTimer<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            stroke: Stroke::Idle,
            started_ms: 0,
            duration_ms: 0,
        }
    }

    pub fn stroke(&self) -> Stroke {
        self.stroke
    }

    fn begin(&mut self, stroke: Stroke, duration_ms: u32) {
        self.started_ms = self.clock.now_ms();
        self.duration_ms = duration_ms;
        self.stroke = stroke;
        debug!("MOTION: {:?} over {}ms", stroke, duration_ms);
    }
}

impl<C: Clock> MotionDrive for StrokeTimer<C> {
    fn begin_inspiration(&mut self, duration_ms: u32) {
        self.begin(Stroke::Compress, duration_ms);
    }

    fn begin_expiration(&mut self, duration_ms: u32) {
        self.begin(Stroke::Release, duration_ms);
    }

    fn progress(&mut self) -> u8 {
        if self.stroke == Stroke::Idle || self.duration_ms == 0 {
            return 100;
        }
        let elapsed = self.clock.now_ms().saturating_sub(self.started_ms);
        let pct = elapsed.saturating_mul(100) / u64::from(self.duration_ms);
        pct.min(100) as u8
    }
}

/// Valves plus a stroke drive.
pub struct MotionActuator<V, M> {
    valves: V,
    drive: M,
}

impl<V: Actuator, M: MotionDrive> MotionActuator<V, M> {
    pub fn new(valves: V, drive: M) -> Self {
        Self { valves, drive }
    }

    pub fn valves(&self) -> &V {
        &self.valves
    }

    pub fn drive(&self) -> &M {
        &self.drive
    }
}

impl<V: Actuator, M: MotionDrive> Actuator for MotionActuator<V, M> {
    fn open_inlet(&mut self) {
        self.valves.open_inlet();
    }

    fn close_inlet(&mut self) {
        self.valves.close_inlet();
    }

    fn open_outlet(&mut self) {
        self.valves.open_outlet();
    }

    fn close_outlet(&mut self) {
        self.valves.close_outlet();
    }

    fn open_bleed(&mut self) {
        self.valves.open_bleed();
    }

    fn close_bleed(&mut self) {
        self.valves.close_bleed();
    }

    fn motion(&mut self) -> Option<&mut dyn MotionDrive> {
        Some(&mut self.drive)
    }
}
