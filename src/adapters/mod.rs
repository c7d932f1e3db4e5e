//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to              |
//! |----------------|--------------------|--------------------------|
//! | `hardware`     | SensorSource       | ESP32 ADC1               |
//! |                | (front panel)      | Enable switch, SET key   |
//! | `log_sink`     | Listener           | Serial log output        |
//! | `time`         | Clock              | ESP32 system timer       |
//!
//! The valve and motion actuators live in `drivers`, since they implement
//! `Actuator` directly over `embedded-hal` pins.

pub mod hardware;
pub mod log_sink;
pub mod time;
