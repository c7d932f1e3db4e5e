//! GPIO / peripheral pin assignments for the ventilator controller board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Valves (solenoids through low-side MOSFET drivers)
// ---------------------------------------------------------------------------

/// Inlet valve: supply gas into the patient circuit.
pub const INLET_VALVE_GPIO: i32 = 1;
/// Outlet valve: exhaust to ambient.
pub const OUTLET_VALVE_GPIO: i32 = 2;
/// Auxiliary pressure-line valve, open for the duration of a breath.
pub const BLEED_VALVE_GPIO: i32 = 3;

// ---------------------------------------------------------------------------
// Sensors: analog (ADC1, 12 dB attenuation)
// ---------------------------------------------------------------------------

/// Gauge pressure sensor output.  ADC1 channel 4 (GPIO 5 on ESP32-S3).
pub const PRESSURE_ADC_GPIO: i32 = 5;
pub const PRESSURE_ADC_CHANNEL: u32 = 4;

/// Flow sensor output.  ADC1 channel 5 (GPIO 6 on ESP32-S3).
pub const FLOW_ADC_GPIO: i32 = 6;
pub const FLOW_ADC_CHANNEL: u32 = 5;

// ---------------------------------------------------------------------------
// Front panel (active-low with pull-ups)
// ---------------------------------------------------------------------------

/// Ventilation enable switch.  LOW = ventilate.
pub const ENABLE_SWITCH_GPIO: i32 = 10;
/// SET key, also acknowledges alarms.  LOW = pressed.
pub const SET_KEY_GPIO: i32 = 11;
