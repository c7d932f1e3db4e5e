//! Unified error types for the ventilation core.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! control loop's error handling uniform.  All variants are `Copy` so they
//! can be passed through the controller and the event bus without
//! allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the core funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor could not be read or returned implausible data.
    Sensor(SensorError),
    /// Breath timing could not be derived from the current parameters.
    Timing(TimingError),
    /// The event bus rejected a post or a registration.
    Event(EventError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Timing(e) => write!(f, "timing: {e}"),
            Self::Event(e) => write!(f, "event: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// ADC conversion returned an error or timed out.
    AdcReadFailed,
    /// Reading is NaN, infinite, or outside the converter's range.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Timing errors
// ---------------------------------------------------------------------------

/// Rejected breath timings.  Raised by [`CycleTiming::compute`] instead of
/// letting a zero or negative phase duration reach the state machine.
///
/// [`CycleTiming::compute`]: crate::cycle::context::CycleTiming::compute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingError {
    /// Breaths per minute was zero.
    ZeroBpm,
    /// Duty-cycle index outside the rate table.
    InvalidDutyIndex(u8),
    /// Inspiration or expiration came out at or below zero milliseconds.
    NonPositivePhase { inspiration_ms: i32, expiration_ms: i32 },
}

impl fmt::Display for TimingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroBpm => write!(f, "bpm must be greater than zero"),
            Self::InvalidDutyIndex(i) => write!(f, "duty-cycle index {i} out of range"),
            Self::NonPositivePhase {
                inspiration_ms,
                expiration_ms,
            } => write!(
                f,
                "non-positive phase duration (in={inspiration_ms}ms, out={expiration_ms}ms)"
            ),
        }
    }
}

impl From<TimingError> for Error {
    fn from(e: TimingError) -> Self {
        Self::Timing(e)
    }
}

// ---------------------------------------------------------------------------
// Event bus errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventError {
    /// Queue at capacity; the event was dropped.
    QueueFull,
    /// Listener registry at capacity; the listener was not registered.
    RegistryFull,
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "event queue full"),
            Self::RegistryFull => write!(f, "listener registry full"),
        }
    }
}

impl From<EventError> for Error {
    fn from(e: EventError) -> Self {
        Self::Event(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range validation.  The message names the field.
    ValidationFailed(&'static str),
    /// The serialized form could not be parsed.
    Corrupted,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::Corrupted => write!(f, "config corrupted"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
