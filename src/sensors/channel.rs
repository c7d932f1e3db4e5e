//! Rolling-mean channel.
//!
//! A strict ring of the last [`WINDOW`] converted samples.  Once full, the
//! oldest sample is evicted before the newest is admitted, so the mean
//! always covers exactly the most recent readings.

use heapless::Deque;

/// Samples per rolling mean.
pub const WINDOW: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct RollingChannel {
    ring: Deque<f32, WINDOW>,
    sum: f32,
    mean: f32,
    peak_raw: f32,
    total_samples: u32,
}

impl RollingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit one converted sample together with the raw value it came from.
    pub fn push(&mut self, raw: f32, value: f32) {
        if self.ring.is_full() {
            if let Some(oldest) = self.ring.pop_front() {
                self.sum -= oldest;
            }
        }
        // Room was just made, push_back cannot fail.
        let _ = self.ring.push_back(value);
        self.sum += value;

        // Resum from the ring every wrap to stop float drift.
        if self.total_samples % WINDOW as u32 == 0 {
            self.sum = self.ring.iter().sum();
        }

        self.mean = self.sum / self.ring.len() as f32;
        if self.total_samples == 0 || raw > self.peak_raw {
            self.peak_raw = raw;
        }
        self.total_samples = self.total_samples.saturating_add(1);
    }

    /// Mean of the samples currently in the ring, or 0 when empty.
    pub fn mean(&self) -> f32 {
        self.mean
    }

    /// Largest raw reading since the last reset.
    pub fn peak_raw(&self) -> f32 {
        self.peak_raw
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn total_samples(&self) -> u32 {
        self.total_samples
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
