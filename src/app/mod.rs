//! Application core: pure domain logic, zero I/O.
//!
//! [`service::Ventilator`] wires the cycle controller, the estimator and
//! the event bus to the outside world.  All interaction with hardware
//! happens through the port traits in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod ports;
pub mod service;
pub mod telemetry;
