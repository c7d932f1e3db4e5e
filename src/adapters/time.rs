//! Time adapters.
//!
//! Implements the [`Clock`] port.
//!
//! [`SystemClock`] reads a free-running 32-bit millisecond counter:
//! `esp_log_timestamp()` on **`target_os = "espidf"`**, a truncated
//! `std::time::Instant` elsewhere.  [`WideningCounter`] absorbs the wrap
//! every ~49.7 days so the port stays monotonic.

use crate::app::ports::Clock;

// ── Wraparound widening ──────────────────────────────────────

/// Widens successive readings of a wrapping `u32` counter to `u64`.
///
/// Must be fed at least once per wrap period; any reading smaller than the
/// previous one is taken as a single wrap.
#[derive(Debug, Clone, Copy, Default)]
pub struct WideningCounter {
    high: u32,
    last_low: u32,
}

impl WideningCounter {
    pub const fn new() -> Self {
        Self {
            high: 0,
            last_low: 0,
        }
    }

    pub fn extend(&mut self, low: u32) -> u64 {
        if low < self.last_low {
            self.high = self.high.wrapping_add(1);
        }
        self.last_low = low;
        (u64::from(self.high) << 32) | u64::from(low)
    }
}

// ── Platform clock ───────────────────────────────────────────

/// Milliseconds since boot.
pub struct SystemClock {
    counter: WideningCounter,
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            counter: WideningCounter::new(),
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    #[cfg(target_os = "espidf")]
    fn read_low(&self) -> u32 {
        // SAFETY: read-only query of the ESP-IDF millisecond tick.
        unsafe { esp_idf_svc::sys::esp_log_timestamp() }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_low(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }
}

impl Clock for SystemClock {
    fn now_ms(&mut self) -> u64 {
        let low = self.read_low();
        self.counter.extend(low)
    }
}
