//! Ventilator firmware entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  ValveActuator     AdcSensorSource   FrontPanel   SystemClock  │
//! │  (Actuator)        (SensorSource)    (settings)   (Clock)      │
//! │  MotionActuator    LogListener       AlarmLatch                │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              Ventilator (pure logic)                   │    │
//! │  │  CycleController · Estimator · EventBus                │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::PinDriver;
use esp_idf_hal::peripherals::Peripherals;
use log::{info, warn};

use ventcore::adapters::hardware::{AdcSensorSource, FrontPanel};
use ventcore::adapters::log_sink::{LogListener, log_telemetry};
use ventcore::adapters::time::SystemClock;
use ventcore::alarms::AlarmLatch;
use ventcore::app::ports::Actuator;
use ventcore::app::service::Ventilator;
use ventcore::config::{ActuatorKind, VentConfig, VentSettings};
use ventcore::drivers::hw_init;
use ventcore::drivers::motion::{MotionActuator, StrokeTimer};
use ventcore::drivers::valve::ValveActuator;
use ventcore::error::Error;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  ventcore v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Peripherals ────────────────────────────────────────
    hw_init::init_peripherals()?;

    let config = VentConfig::analog_board();
    config.validate_for_adc().map_err(Error::from)?;
    let settings = VentSettings::default();
    settings.validate().map_err(Error::from)?;

    // Pin numbers match `pins::{INLET,OUTLET,BLEED}_VALVE_GPIO`.
    let peripherals = Peripherals::take()?;
    let inlet = PinDriver::output(peripherals.pins.gpio1)?;
    let outlet = PinDriver::output(peripherals.pins.gpio2)?;
    let bleed = PinDriver::output(peripherals.pins.gpio3)?;
    let valves = ValveActuator::new(inlet, outlet, bleed, config.valves_active_low);

    // ── 3. Actuator variant ───────────────────────────────────
    match config.actuator {
        ActuatorKind::TimedValves => run(&config, settings, valves),
        ActuatorKind::Motion => {
            let drive = StrokeTimer::new(SystemClock::new());
            run(&config, settings, MotionActuator::new(valves, drive))
        }
    }
}

fn run<A: Actuator>(config: &VentConfig, settings: VentSettings, actuator: A) -> Result<()> {
    let mut vent = Ventilator::new(
        config,
        actuator,
        AdcSensorSource::default(),
        settings,
        SystemClock::new(),
    );

    let latch = AlarmLatch::new();
    let alarms = latch.status();
    vent.register_listener(Box::new(latch)).map_err(Error::from)?;
    vent.register_listener(Box::new(LogListener::new()))
        .map_err(Error::from)?;

    let mut panel = FrontPanel::on_gpio();

    info!("System ready. Entering control loop.");

    // ── 4. Control loop ───────────────────────────────────────
    loop {
        let change = panel.poll();
        if let Some(enabled) = change.enabled {
            vent.params_mut().enabled = enabled;
        }
        for event in change.events {
            vent.post(event);
        }

        vent.run_once();

        if let Some(snapshot) = vent.telemetry_if_due() {
            log_telemetry(&snapshot);
            if alarms.any() {
                warn!("ALARM | latched mask=0x{:02x}", alarms.mask());
            }
        }

        FreeRtos::delay_ms(config.control_interval_ms);
    }
}
