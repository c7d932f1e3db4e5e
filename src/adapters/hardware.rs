//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! - [`AdcSensorSource`] implements [`SensorSource`] over the two ADC1
//!   channels.
//! - [`FrontPanel`] polls the enable switch and the SET key and turns
//!   them into settings changes and bus events.
//!
//! On non-espidf targets the underlying `hw_init` calls are simulation
//! stubs, so both adapters run on the host.

use log::{info, warn};

use crate::app::ports::SensorSource;
use crate::drivers::hw_init::{self, ADC_MAX_COUNTS};
use crate::error::SensorError;
use crate::events::{Event, Key};
use crate::pins;

/// Full scale of the 10-bit converter the sensor calibrations assume.
const CALIBRATION_FULL_SCALE: f32 = 1023.0;

// ── SensorSource implementation ───────────────────────────────

/// Pressure and flow from ADC1.  Readings are rescaled to the 10-bit
/// range the calibrations are expressed in.
#[derive(Debug, Clone, Copy)]
pub struct AdcSensorSource {
    pressure_channel: u32,
    flow_channel: u32,
}

impl Default for AdcSensorSource {
    fn default() -> Self {
        Self::new(pins::PRESSURE_ADC_CHANNEL, pins::FLOW_ADC_CHANNEL)
    }
}

impl AdcSensorSource {
    pub fn new(pressure_channel: u32, flow_channel: u32) -> Self {
        Self {
            pressure_channel,
            flow_channel,
        }
    }

    fn read_scaled(channel: u32) -> Result<f32, SensorError> {
        let raw = hw_init::adc1_read(channel)?;
        Ok(f32::from(raw) * CALIBRATION_FULL_SCALE / f32::from(ADC_MAX_COUNTS))
    }
}

impl SensorSource for AdcSensorSource {
    fn read_raw_pressure(&mut self) -> Result<f32, SensorError> {
        Self::read_scaled(self.pressure_channel)
    }

    fn read_raw_flow(&mut self) -> Result<f32, SensorError> {
        Self::read_scaled(self.flow_channel)
    }
}

// ── Front panel ───────────────────────────────────────────────

/// What changed since the last poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelChange {
    /// New enable state, if the switch moved.
    pub enabled: Option<bool>,
    /// Key events to post.
    pub events: heapless::Vec<Event, 2>,
}

/// Active-low switch and key, edge detected per poll.
pub struct FrontPanel<F> {
    read: F,
    enabled: bool,
    set_down: bool,
}

impl FrontPanel<fn(i32) -> bool> {
    /// Panel on the board's GPIOs.
    pub fn on_gpio() -> Self {
        Self::new(hw_init::gpio_read)
    }
}

impl<F: FnMut(i32) -> bool> FrontPanel<F> {
    pub fn new(read: F) -> Self {
        Self {
            read,
            enabled: false,
            set_down: false,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn poll(&mut self) -> PanelChange {
        let mut change = PanelChange::default();

        let enabled = !(self.read)(pins::ENABLE_SWITCH_GPIO);
        if enabled != self.enabled {
            info!("PANEL: ventilation {}", if enabled { "enabled" } else { "disabled" });
            self.enabled = enabled;
            change.enabled = Some(enabled);
        }

        let set_down = !(self.read)(pins::SET_KEY_GPIO);
        if set_down != self.set_down {
            self.set_down = set_down;
            let event = if set_down {
                Event::KeyPress(Key::Set)
            } else {
                Event::KeyRelease(Key::Set)
            };
            if change.events.push(event).is_err() {
                warn!("PANEL: key event dropped");
            }
        }

        change
    }
}
